//! Recursive generator for synthetic configuration trees.
//!
//! Each node at `(path, id, depth)` is shaped by row `depth` of a
//! [`ConfigurationTable`] and written as:
//! ```text
//! <path>/
//! ├── kustomization.yaml      (written last)
//! ├── res0.yaml … res<F-1>.yaml
//! ├── res0/ … res<I-1>/      (subtrees at depth + 1)
//! └── patch0.yaml, patch1.json, …
//! ```
//!
//! Nothing is deleted: generating over a populated sink leaves any files a
//! previous, larger run wrote and this run did not overwrite.

use tracing::{debug, info, instrument, trace};

use kustbench_shared::{ConfigurationTable, Result, SyntheticId};
use kustbench_storage::FileSystem;

use crate::document::{
    KUSTOMIZATION_FILE, KustomizationDocument, plan_patches, resource_document,
    resource_file_name, subtree_dir_name,
};

/// Writes nodes into a sink according to a configuration table.
#[derive(Debug, Clone, Copy)]
pub struct TreeBuilder<'a> {
    table: &'a ConfigurationTable,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(table: &'a ConfigurationTable) -> Self {
        Self { table }
    }

    /// Generate the node at `path` and, depth-first, every subtree below it.
    ///
    /// The first error from the sink or a table lookup aborts the whole pass;
    /// whatever was written before it stays in the sink.
    pub fn generate(
        &self,
        fs: &dyn FileSystem,
        path: &str,
        id: &SyntheticId,
        depth: usize,
    ) -> Result<()> {
        let profile = self.table.profile(depth)?;
        fs.mkdir_all(path)?;

        trace!(path, %id, depth, "generating node");

        let mut doc = KustomizationDocument::new();
        if profile.namespaced {
            doc.namespace(id.as_str());
        }
        if let Some(prefix) = profile.prefix() {
            doc.name_prefix(prefix);
        }
        if let Some(suffix) = profile.suffix() {
            doc.name_suffix(suffix);
        }
        doc.common_labels(&profile.common_labels);
        doc.common_annotations(&profile.common_annotations);

        for index in 0..profile.file_resource_count {
            let file_name = resource_file_name(index);
            doc.resource(&file_name);
            let body = resource_document(&id.resource_name(index));
            fs.write_file(&fs.join(path, &file_name), body.as_bytes())?;
        }

        for index in 0..profile.inline_resource_count {
            let dir_name = subtree_dir_name(index);
            doc.resource(&dir_name);
            self.generate(fs, &fs.join(path, &dir_name), &id.child(index), depth + 1)?;
        }

        for patch in plan_patches(id, profile.patch_count) {
            doc.patch(&patch);
            fs.write_file(&fs.join(path, &patch.file_name()), patch.contents().as_bytes())?;
        }

        fs.write_file(&fs.join(path, KUSTOMIZATION_FILE), &doc.finish())
    }
}

/// Generate a whole tree from depth 0 at `root_path`.
#[instrument(skip_all, fields(root = root_path, id = %root_id, depth = table.max_depth()))]
pub fn generate_tree(
    fs: &dyn FileSystem,
    table: &ConfigurationTable,
    root_path: &str,
    root_id: &SyntheticId,
) -> Result<()> {
    let footprint = table.footprint();
    debug!(
        nodes = footprint.nodes,
        files = footprint.total_files(),
        "generating tree"
    );

    TreeBuilder::new(table).generate(fs, root_path, root_id, 0)?;

    info!(nodes = footprint.nodes, "tree generated");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
