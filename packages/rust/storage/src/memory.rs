//! In-memory filesystem sink used for benchmark runs.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use sha2::{Digest, Sha256};
use tracing::trace;

use kustbench_shared::{KustbenchError, Result};

use crate::{FileSystem, normalize, parent_of};

/// A single-writer, in-memory directory tree.
///
/// Interior mutability lets the sink be shared by reference down the whole
/// recursion. It is deliberately `!Sync`: generation is strictly sequential.
/// A fresh instance is the per-run reset; nothing is ever deleted.
#[derive(Debug, Default)]
pub struct InMemoryFs {
    inner: RefCell<Tree>,
}

#[derive(Debug, Default)]
struct Tree {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
}

impl Tree {
    fn dir_exists(&self, path: &str) -> bool {
        path.is_empty() || self.dirs.contains(path)
    }
}

impl InMemoryFs {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files in the whole sink.
    pub fn file_count(&self) -> usize {
        self.inner.borrow().files.len()
    }

    /// Number of directories in the whole sink (the root is not counted).
    pub fn dir_count(&self) -> usize {
        self.inner.borrow().dirs.len()
    }

    /// Total bytes held across all files.
    pub fn total_bytes(&self) -> usize {
        self.inner.borrow().files.values().map(Vec::len).sum()
    }

    /// All file paths, in sorted order.
    pub fn file_paths(&self) -> Vec<String> {
        self.inner.borrow().files.keys().cloned().collect()
    }

    /// SHA-256 over every directory name and every file path + contents.
    ///
    /// Two sinks populated by the same generation pass have equal fingerprints.
    pub fn fingerprint(&self) -> String {
        let tree = self.inner.borrow();
        let mut hasher = Sha256::new();

        for dir in &tree.dirs {
            hasher.update(b"d:");
            hasher.update(dir.as_bytes());
            hasher.update([0]);
        }
        for (path, contents) in &tree.files {
            hasher.update(b"f:");
            hasher.update(path.as_bytes());
            hasher.update([0]);
            hasher.update((contents.len() as u64).to_le_bytes());
            hasher.update(contents);
        }

        format!("{:x}", hasher.finalize())
    }
}

impl FileSystem for InMemoryFs {
    fn mkdir_all(&self, path: &str) -> Result<()> {
        let path = normalize(path);
        let mut tree = self.inner.borrow_mut();

        let mut current = String::with_capacity(path.len());
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(segment);

            if tree.files.contains_key(&current) {
                return Err(KustbenchError::sink(&current, "a file exists at this path"));
            }
            if !tree.dirs.contains(&current) {
                tree.dirs.insert(current.clone());
            }
        }

        trace!(path = %path, "mkdir_all");
        Ok(())
    }

    fn write_file(&self, path: &str, contents: &[u8]) -> Result<()> {
        let path = normalize(path);
        if path.is_empty() {
            return Err(KustbenchError::sink(path, "cannot write to the sink root"));
        }

        let mut tree = self.inner.borrow_mut();
        if tree.dirs.contains(&path) {
            return Err(KustbenchError::sink(&path, "path is a directory"));
        }
        if !tree.dir_exists(parent_of(&path)) {
            return Err(KustbenchError::sink(&path, "parent directory does not exist"));
        }

        trace!(path = %path, bytes = contents.len(), "write_file");
        tree.files.insert(path, contents.to_vec());
        Ok(())
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let path = normalize(path);
        self.inner
            .borrow()
            .files
            .get(&path)
            .cloned()
            .ok_or_else(|| KustbenchError::sink(&path, "no such file"))
    }

    fn is_dir(&self, path: &str) -> bool {
        self.inner.borrow().dir_exists(&normalize(path))
    }

    fn is_file(&self, path: &str) -> bool {
        self.inner.borrow().files.contains_key(&normalize(path))
    }

    fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        let path = normalize(path);
        let tree = self.inner.borrow();
        if !tree.dir_exists(&path) {
            return Err(KustbenchError::sink(&path, "no such directory"));
        }

        let children = tree
            .dirs
            .iter()
            .map(String::as_str)
            .chain(tree.files.keys().map(String::as_str))
            .filter(|entry| parent_of(entry) == path)
            .map(|entry| entry.rsplit('/').next().unwrap_or(entry).to_string())
            .collect::<BTreeSet<_>>();

        Ok(children.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mkdir_all_creates_ancestors() {
        let fs = InMemoryFs::new();
        fs.mkdir_all("testdata/res0/res1").unwrap();
        assert!(fs.is_dir("testdata"));
        assert!(fs.is_dir("testdata/res0"));
        assert!(fs.is_dir("./testdata/res0/res1/"));
        assert_eq!(fs.dir_count(), 3);

        // Idempotent
        fs.mkdir_all("testdata/res0").unwrap();
        assert_eq!(fs.dir_count(), 3);
    }

    #[test]
    fn write_requires_parent_directory() {
        let fs = InMemoryFs::new();
        let err = fs.write_file("missing/kustomization.yaml", b"x").unwrap_err();
        assert!(err.to_string().contains("parent directory does not exist"));

        fs.write_file("top.yaml", b"ok").unwrap();
        assert!(fs.is_file("top.yaml"));
    }

    #[test]
    fn write_overwrites_whole_file() {
        let fs = InMemoryFs::new();
        fs.mkdir_all("a").unwrap();
        fs.write_file("a/f.yaml", b"first version").unwrap();
        fs.write_file("a/f.yaml", b"second").unwrap();
        assert_eq!(fs.read_file("a/f.yaml").unwrap(), b"second");
        assert_eq!(fs.file_count(), 1);
    }

    #[test]
    fn file_and_directory_cannot_share_a_path() {
        let fs = InMemoryFs::new();
        fs.mkdir_all("a/b").unwrap();
        assert!(fs.write_file("a/b", b"x").is_err());

        fs.write_file("a/f", b"x").unwrap();
        assert!(fs.mkdir_all("a/f/g").is_err());
    }

    #[test]
    fn list_dir_returns_immediate_children() {
        let fs = InMemoryFs::new();
        fs.mkdir_all("root/res0/deep").unwrap();
        fs.write_file("root/kustomization.yaml", b"").unwrap();
        fs.write_file("root/res1.yaml", b"").unwrap();

        let entries = fs.list_dir("root").unwrap();
        assert_eq!(entries, vec!["kustomization.yaml", "res0", "res1.yaml"]);
        assert_eq!(fs.list_dir("").unwrap(), vec!["root"]);
        assert!(fs.list_dir("nope").is_err());
    }

    #[test]
    fn fingerprint_tracks_contents() {
        let a = InMemoryFs::new();
        let b = InMemoryFs::new();
        for fs in [&a, &b] {
            fs.mkdir_all("t").unwrap();
            fs.write_file("t/x.yaml", b"kind: ConfigMap\n").unwrap();
        }
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);

        b.write_file("t/x.yaml", b"kind: Secret\n").unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
