//! Error types for kustbench.
//!
//! Library crates use [`KustbenchError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all kustbench operations.
#[derive(Debug, thiserror::Error)]
pub enum KustbenchError {
    /// Configuration loading or parsing error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A generation table or input failed a precondition check.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Recursion asked for a profile past the end of the configuration table.
    #[error("depth {depth} is out of range for a configuration table of {len} profiles")]
    DepthOutOfRange { depth: usize, len: usize },

    /// Filesystem I/O error from a disk-backed sink.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Sink rejected an operation (missing parent, path is a directory, ...).
    #[error("sink error at {path}: {message}")]
    Sink { path: String, message: String },

    /// A generated document could not be parsed or is missing required fields.
    #[error("document error in {path}: {message}")]
    Document { path: String, message: String },

    /// The build engine failed to render a tree.
    #[error("build engine error: {0}")]
    Engine(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, KustbenchError>;

impl KustbenchError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a sink error for the given path.
    pub fn sink(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Sink {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a document error for the given path.
    pub fn document(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Document {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a build engine error from any displayable message.
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }
}
