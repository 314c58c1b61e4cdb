//! Synthetic configuration-tree generation and the build benchmark harness.
//!
//! This crate ties together the generation table, the filesystem sink and a
//! build engine:
//! - [`generator`]: recursive tree writer driven by a `ConfigurationTable`
//! - [`document`]: root, resource and patch document assembly
//! - [`engine`]: the `BuildEngine` seam and a reference renderer
//! - [`harness`]: generate-then-time runs and their summaries

pub mod document;
pub mod engine;
pub mod generator;
pub mod harness;

pub use engine::{BuildEngine, ResourceRenderer};
pub use generator::{TreeBuilder, generate_tree};
pub use harness::{BenchSummary, BuildHarness, RunReport};
