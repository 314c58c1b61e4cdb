//! Application configuration for kustbench.
//!
//! User config lives at `~/.kustbench/kustbench.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{KustbenchError, Result};
use crate::types::{
    BENCHMARK_ROOT_ID, BENCHMARK_ROOT_PATH, ConfigurationTable, GenerationProfile, SyntheticId,
};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "kustbench.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".kustbench";

// ---------------------------------------------------------------------------
// Config structs (matching kustbench.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Generation table, one entry per depth. Empty selects the built-in scenario.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<GenerationProfile>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Path of the generated tree's root, relative to the sink.
    #[serde(default = "default_root_path")]
    pub root_path: String,

    /// Synthetic id of the root node.
    #[serde(default = "default_root_id")]
    pub root_id: String,

    /// Number of harness runs for `bench`.
    #[serde(default = "default_iterations")]
    pub iterations: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            root_path: default_root_path(),
            root_id: default_root_id(),
            iterations: default_iterations(),
        }
    }
}

fn default_root_path() -> String {
    BENCHMARK_ROOT_PATH.into()
}
fn default_root_id() -> String {
    BENCHMARK_ROOT_ID.into()
}
fn default_iterations() -> u32 {
    1
}

impl AppConfig {
    /// Resolve the configured table, falling back to the benchmark scenario.
    pub fn table(&self) -> Result<ConfigurationTable> {
        if self.profiles.is_empty() {
            return Ok(ConfigurationTable::benchmark());
        }
        ConfigurationTable::new(self.profiles.clone())
    }

    /// Check the profile table and root id without generating anything.
    pub fn validate(&self) -> Result<()> {
        self.table()?;
        SyntheticId::root(self.defaults.root_id.clone())?;
        Ok(())
    }

    /// Config with the built-in table written out explicitly (for `config init`).
    pub fn with_benchmark_profiles() -> Self {
        Self {
            defaults: DefaultsConfig::default(),
            profiles: ConfigurationTable::benchmark().iter().cloned().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// `~/.kustbench/kustbench.toml`.
pub fn config_file_path() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
        .ok_or_else(|| KustbenchError::config("could not determine home directory"))
}

/// Load the user config, or the built-in scenario when no file exists.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;
    if path.is_file() {
        return load_config_from(&path);
    }
    tracing::debug!(path = %path.display(), "no user config, using benchmark scenario");
    Ok(AppConfig::default())
}

/// Load and check a config file. A table that cannot terminate or an empty
/// root id is reported against the file rather than at generation time.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let text = std::fs::read_to_string(path).map_err(|e| KustbenchError::io(path, e))?;
    let config: AppConfig = toml::from_str(&text)
        .map_err(|e| KustbenchError::config(format!("{}: {e}", path.display())))?;

    config
        .validate()
        .map_err(|e| KustbenchError::config(format!("{}: {e}", path.display())))?;
    Ok(config)
}

/// Write the benchmark scenario to the user config file. An existing file is
/// left untouched.
pub fn init_config() -> Result<PathBuf> {
    let path = config_file_path()?;
    if path.exists() {
        return Err(KustbenchError::config(format!(
            "{} already exists",
            path.display()
        )));
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| KustbenchError::io(dir, e))?;
    }

    let text = toml::to_string_pretty(&AppConfig::with_benchmark_profiles())
        .map_err(|e| KustbenchError::config(e.to_string()))?;
    std::fs::write(&path, text).map_err(|e| KustbenchError::io(&path, e))?;
    tracing::info!(path = %path.display(), "wrote config");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_benchmark_table() {
        let config = AppConfig::default();
        assert_eq!(config.defaults.root_path, "testdata");
        assert_eq!(config.defaults.root_id, "res");
        assert_eq!(config.table().expect("table"), ConfigurationTable::benchmark());
    }

    #[test]
    fn init_config_roundtrip() {
        let config = AppConfig::with_benchmark_profiles();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        assert!(toml_str.contains("[[profiles]]"));
        assert!(toml_str.contains("name_prefix"));

        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.profiles.len(), 5);
        assert_eq!(parsed.table().expect("table"), ConfigurationTable::benchmark());
    }

    #[test]
    fn config_with_custom_profiles() {
        let toml_str = r#"
[defaults]
root_id = "bench"
iterations = 5

[[profiles]]
inline_resources = 2
namespaced = true

[profiles.common_labels]
app = "demo"

[[profiles]]
file_resources = 3
patches = 2
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.root_id, "bench");
        assert_eq!(config.defaults.root_path, "testdata");
        assert_eq!(config.defaults.iterations, 5);

        let table = config.table().expect("table");
        assert_eq!(table.len(), 2);
        let root = table.profile(0).expect("row 0");
        assert_eq!(root.common_labels.get("app").map(String::as_str), Some("demo"));
        assert_eq!(table.profile(1).expect("row 1").patch_count, 2);
    }

    #[test]
    fn unterminated_custom_table_is_rejected() {
        let toml_str = r#"
[[profiles]]
inline_resources = 2
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert!(config.table().is_err());
    }

    #[test]
    fn load_config_from_reports_invalid_table_against_file() {
        let dir = std::env::temp_dir().join(format!("kb-config-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("kustbench.toml");
        std::fs::write(&path, "[[profiles]]\ninline_resources = 2\n").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, KustbenchError::Config { .. }));
        assert!(err.to_string().contains("kustbench.toml"));

        std::fs::write(&path, "[defaults]\nroot_id = \"\"\n").unwrap();
        assert!(load_config_from(&path).is_err());

        std::fs::write(&path, "[[profiles]]\nfile_resources = 1\n\n[[profiles]]\ninline_resources = 1\n")
            .unwrap();
        let config = load_config_from(&path).expect("first row terminates");
        assert_eq!(config.table().unwrap().max_depth(), 0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_config_from_missing_file_is_io_error() {
        let err = load_config_from(Path::new("/nonexistent/kustbench.toml")).unwrap_err();
        assert!(matches!(err, KustbenchError::Io { .. }));
    }
}
