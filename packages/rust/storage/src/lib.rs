//! Filesystem sinks for generated configuration trees.
//!
//! The [`FileSystem`] trait is the only surface the tree builder writes
//! through. Two implementations are provided:
//! - [`InMemoryFs`]: the benchmark sink, reset by constructing a new one per run
//! - [`DiskFs`]: maps the same operations onto a directory on disk
//!
//! **Access rules:**
//! - The tree builder only calls [`FileSystem::mkdir_all`], [`FileSystem::write_file`]
//!   and [`FileSystem::join`]; it never reads back what it wrote.
//! - The read side (`read_file`, `is_dir`, `list_dir`) exists for build engines
//!   and inspection.
//!
//! Paths are `/`-separated strings relative to the sink's root.

mod disk;
mod memory;

use kustbench_shared::Result;

pub use disk::DiskFs;
pub use memory::InMemoryFs;

/// Write/read surface of a configuration-tree sink.
pub trait FileSystem {
    /// Create `path` and any missing ancestors. Idempotent.
    fn mkdir_all(&self, path: &str) -> Result<()>;

    /// Create or replace the whole contents of the file at `path`.
    /// The parent directory must already exist.
    fn write_file(&self, path: &str, contents: &[u8]) -> Result<()>;

    /// Read the whole contents of the file at `path`.
    fn read_file(&self, path: &str) -> Result<Vec<u8>>;

    /// Whether `path` names an existing directory.
    fn is_dir(&self, path: &str) -> bool;

    /// Whether `path` names an existing file.
    fn is_file(&self, path: &str) -> bool;

    /// Names of the immediate children of directory `path`, sorted.
    fn list_dir(&self, path: &str) -> Result<Vec<String>>;

    /// Pure path composition, no I/O.
    fn join(&self, base: &str, name: &str) -> String {
        join_path(base, name)
    }
}

/// Join two `/`-separated path fragments.
pub fn join_path(base: &str, name: &str) -> String {
    let base = normalize(base);
    let name = name.trim_matches('/');
    match (base.is_empty(), name.is_empty()) {
        (true, _) => normalize(name),
        (false, true) => base,
        (false, false) => format!("{base}/{name}"),
    }
}

/// Strip `./` segments, empty segments and trailing slashes.
///
/// The sink root normalizes to the empty string.
pub fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Parent of a normalized path (`""` for top-level entries).
pub(crate) fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_handles_relative_roots() {
        assert_eq!(join_path("testdata", "res0.yaml"), "testdata/res0.yaml");
        assert_eq!(join_path("./testdata/", "res0"), "testdata/res0");
        assert_eq!(join_path("", "kustomization.yaml"), "kustomization.yaml");
        assert_eq!(join_path("a/b", ""), "a/b");
    }

    #[test]
    fn normalize_collapses_noise() {
        assert_eq!(normalize("./a//b/./c/"), "a/b/c");
        assert_eq!(normalize("."), "");
        assert_eq!(normalize("/"), "");
    }

    #[test]
    fn parent_of_top_level_is_root() {
        assert_eq!(parent_of("a/b/c"), "a/b");
        assert_eq!(parent_of("a"), "");
    }
}
