//! Text documents written into a generated tree.
//!
//! Three kinds of document are produced per node:
//! - the `kustomization.yaml` root document, assembled by [`KustomizationDocument`]
//! - `res<i>.yaml` resource documents ([`resource_document`])
//! - patch documents, one [`PatchDocument`] per patch slot

use std::collections::BTreeMap;

use kustbench_shared::SyntheticId;

/// File name of the root document at every node.
pub const KUSTOMIZATION_FILE: &str = "kustomization.yaml";

/// Body of every operation-list patch.
pub const OPERATION_PATCH_BODY: &str = r#"[{"op": "add", "path": "/data/k2", "value": "3"} ]"#;

// ---------------------------------------------------------------------------
// Root document
// ---------------------------------------------------------------------------

/// Sections of a root document, in the only order they may appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Section {
    Namespace,
    NamePrefix,
    NameSuffix,
    CommonLabels,
    CommonAnnotations,
    Resources,
    Patches,
}

/// Owned, section-ordered builder for one node's `kustomization.yaml`.
///
/// Sections are appended in [`Section`] order; a list section's header is
/// written on its first entry, so absent sections leave no trace.
#[derive(Debug, Default)]
pub struct KustomizationDocument {
    buf: String,
    current: Option<Section>,
}

impl KustomizationDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// `namespace: <ns>`
    pub fn namespace(&mut self, namespace: &str) {
        self.enter(Section::Namespace);
        self.buf.push_str(&format!("namespace: {namespace}\n"));
    }

    /// `namePrefix: <prefix>`
    pub fn name_prefix(&mut self, prefix: &str) {
        self.enter(Section::NamePrefix);
        self.buf.push_str(&format!("namePrefix: {prefix}\n"));
    }

    /// `nameSuffix: <suffix>`
    pub fn name_suffix(&mut self, suffix: &str) {
        self.enter(Section::NameSuffix);
        self.buf.push_str(&format!("nameSuffix: {suffix}\n"));
    }

    /// `commonLabels:` map. No-op when empty.
    pub fn common_labels(&mut self, labels: &BTreeMap<String, String>) {
        self.map_section(Section::CommonLabels, labels);
    }

    /// `commonAnnotations:` map. No-op when empty.
    pub fn common_annotations(&mut self, annotations: &BTreeMap<String, String>) {
        self.map_section(Section::CommonAnnotations, annotations);
    }

    /// Append one entry to `resources:` (a file name or a subtree directory).
    pub fn resource(&mut self, reference: &str) {
        self.enter(Section::Resources);
        self.buf.push_str(&format!(" - {reference}\n"));
    }

    /// Append one entry to `patches:`.
    pub fn patch(&mut self, patch: &PatchDocument) {
        self.enter(Section::Patches);
        self.buf.push_str(&format!(" - path: {}\n", patch.file_name()));
        if let Some(target) = patch.target() {
            self.buf.push_str("   target:\n");
            self.buf.push_str(&format!("    version: {}\n", target.version));
            self.buf.push_str(&format!("    kind: {}\n", target.kind));
            self.buf.push_str(&format!("    name: {}\n", target.name));
        }
    }

    #[cfg(test)]
    fn as_str(&self) -> &str {
        &self.buf
    }

    /// Consume the builder and return the document bytes.
    pub fn finish(self) -> Vec<u8> {
        self.buf.into_bytes()
    }

    fn map_section(&mut self, section: Section, entries: &BTreeMap<String, String>) {
        if entries.is_empty() {
            return;
        }
        self.enter(section);
        for (key, value) in entries {
            self.buf.push_str(&format!("  {key}: {value}\n"));
        }
    }

    /// Move the cursor to `section`, writing its header when it opens.
    fn enter(&mut self, section: Section) {
        debug_assert!(
            self.current.is_none_or(|current| current <= section),
            "section {section:?} written after {:?}",
            self.current
        );
        if self.current == Some(section) {
            return;
        }
        self.current = Some(section);

        let header = match section {
            Section::CommonLabels => "commonLabels:\n",
            Section::CommonAnnotations => "commonAnnotations:\n",
            Section::Resources => "resources:\n",
            Section::Patches => "patches:\n",
            Section::Namespace | Section::NamePrefix | Section::NameSuffix => return,
        };
        self.buf.push_str(header);
    }
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// A minimal labelled, annotated `ConfigMap` named `name`.
pub fn resource_document(name: &str) -> String {
    format!(
        "kind: ConfigMap
apiVersion: v1
metadata:
  name: {name}
  labels:
    foo: bar
  annotations:
    baz: blatti
data:
  k: v
"
    )
}

/// File name of the file-backed resource at `index`.
pub fn resource_file_name(index: usize) -> String {
    format!("res{index}.yaml")
}

/// Directory name of the child subtree at `index`.
pub fn subtree_dir_name(index: usize) -> String {
    format!("res{index}")
}

// ---------------------------------------------------------------------------
// Patches
// ---------------------------------------------------------------------------

/// Explicit selector carried by an operation-list patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchTarget {
    pub version: String,
    pub kind: String,
    pub name: String,
}

impl PatchTarget {
    /// Select the `v1` `ConfigMap` called `name`.
    pub fn config_map(name: impl Into<String>) -> Self {
        Self {
            version: "v1".into(),
            kind: "ConfigMap".into(),
            name: name.into(),
        }
    }
}

/// One patch slot of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchDocument {
    /// A resource fragment; targets the resource with the same name.
    FullResource { index: usize, name: String },
    /// A JSON operation list aimed at `target`.
    Operations { index: usize, target: PatchTarget },
}

impl PatchDocument {
    /// Slot index within the node.
    pub fn index(&self) -> usize {
        match self {
            Self::FullResource { index, .. } | Self::Operations { index, .. } => *index,
        }
    }

    /// `patch<i>.yaml` or `patch<i>.json`.
    pub fn file_name(&self) -> String {
        let ext = match self {
            Self::FullResource { .. } => "yaml",
            Self::Operations { .. } => "json",
        };
        format!("patch{}.{ext}", self.index())
    }

    /// Selector written next to the reference in the root document.
    pub fn target(&self) -> Option<&PatchTarget> {
        match self {
            Self::FullResource { .. } => None,
            Self::Operations { target, .. } => Some(target),
        }
    }

    /// The patch file's contents.
    pub fn contents(&self) -> String {
        match self {
            Self::FullResource { name, .. } => format!(
                "kind: ConfigMap
apiVersion: v1
metadata:
  name: {name}
data:
  k: v2
"
            ),
            Self::Operations { .. } => OPERATION_PATCH_BODY.to_string(),
        }
    }
}

/// Plan the `count` patch slots of node `id`.
///
/// Slots come in pairs: each full-resource patch is followed by an
/// operation-list patch whose target is the name the full-resource patch
/// touched. A trailing unpaired slot is a full-resource patch.
pub fn plan_patches(id: &SyntheticId, count: usize) -> Vec<PatchDocument> {
    let mut slots = Vec::with_capacity(count);
    let mut pending: Option<String> = None;

    for index in 0..count {
        match pending.take() {
            None => {
                let name = id.resource_name(index);
                pending = Some(name.clone());
                slots.push(PatchDocument::FullResource { index, name });
            }
            Some(name) => slots.push(PatchDocument::Operations {
                index,
                target: PatchTarget::config_map(name),
            }),
        }
    }

    slots
}
