//! Shared types, error model, and configuration for kustbench.
//!
//! This crate is the foundation depended on by all other kustbench crates.
//! It provides:
//! - [`KustbenchError`], the unified error type
//! - Generation types ([`GenerationProfile`], [`ConfigurationTable`], [`SyntheticId`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{KustbenchError, Result};
pub use types::{
    BENCHMARK_ROOT_ID, BENCHMARK_ROOT_PATH, ConfigurationTable, GenerationProfile, SyntheticId,
    TreeFootprint,
};
