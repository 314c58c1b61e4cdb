//! Disk-backed filesystem sink rooted at a directory.

use std::path::{Path, PathBuf};

use tracing::trace;

use kustbench_shared::{KustbenchError, Result};

use crate::{FileSystem, normalize};

/// Maps sink paths onto `std::fs` under a root directory.
///
/// Nothing is ever removed. Generating a smaller tree over a larger one
/// leaves the larger run's extra files in place.
#[derive(Debug, Clone)]
pub struct DiskFs {
    root: PathBuf,
}

impl DiskFs {
    /// Create a sink rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The on-disk root of this sink.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a sink path under the root. `..` segments are refused so nothing
    /// lands outside it.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let path = normalize(path);
        if path.split('/').any(|segment| segment == "..") {
            return Err(KustbenchError::sink(path, "path escapes the sink root"));
        }
        if path.is_empty() {
            Ok(self.root.clone())
        } else {
            Ok(self.root.join(path))
        }
    }
}

impl FileSystem for DiskFs {
    fn mkdir_all(&self, path: &str) -> Result<()> {
        let target = self.resolve(path)?;
        std::fs::create_dir_all(&target).map_err(|e| KustbenchError::io(&target, e))?;
        trace!(path = %target.display(), "mkdir_all");
        Ok(())
    }

    fn write_file(&self, path: &str, contents: &[u8]) -> Result<()> {
        let target = self.resolve(path)?;
        match target.parent() {
            Some(parent) if parent.is_dir() => {}
            _ => {
                return Err(KustbenchError::sink(
                    normalize(path),
                    "parent directory does not exist",
                ));
            }
        }

        std::fs::write(&target, contents).map_err(|e| KustbenchError::io(&target, e))?;
        trace!(path = %target.display(), bytes = contents.len(), "write_file");
        Ok(())
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let target = self.resolve(path)?;
        std::fs::read(&target).map_err(|e| KustbenchError::io(&target, e))
    }

    fn is_dir(&self, path: &str) -> bool {
        self.resolve(path).is_ok_and(|target| target.is_dir())
    }

    fn is_file(&self, path: &str) -> bool {
        self.resolve(path).is_ok_and(|target| target.is_file())
    }

    fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        let target = self.resolve(path)?;
        let entries = std::fs::read_dir(&target).map_err(|e| KustbenchError::io(&target, e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| KustbenchError::io(&target, e))?;
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names.sort();
        Ok(names)
    }
}
