//! Engine configuration loader.
//!
//! Reads `config.toml` from the data directory and falls back to
//! [`EngineConfig::default()`] when the file is missing or malformed.

use std::path::Path;

use procflow_types::config::EngineConfig;

pub const CONFIG_FILE: &str = "config.toml";

/// Load `{data_dir}/config.toml`.
///
/// A missing file is silent; an unreadable or unparsable one logs a warning.
/// Either way the defaults are returned.
pub async fn load_engine_config(data_dir: &Path) -> EngineConfig {
    let config_path = data_dir.join(CONFIG_FILE);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No {CONFIG_FILE} at {}, using defaults", config_path.display());
            return EngineConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return EngineConfig::default();
        }
    };

    match toml::from_str::<EngineConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", config_path.display());
            EngineConfig::default()
        }
    }
}
