//! Engine configuration types.
//!
//! `EngineConfig` represents the top-level `config.toml` in the data
//! directory. Every field has a default so a partial file is valid.

use serde::{Deserialize, Serialize};

/// Top-level configuration for procflow.
///
/// Loaded from `~/.procflow/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Request timeout applied to HTTP nodes.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// User-Agent header sent by HTTP nodes.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Upper bound on concurrently executing nodes within one run.
    /// `None` lets every node of a level run at once.
    #[serde(default)]
    pub max_concurrent_nodes: Option<usize>,

    /// How long `run` waits for a terminal state before reporting a timeout.
    #[serde(default = "default_wait_timeout_secs")]
    pub default_wait_timeout_secs: u64,

    /// SQLite file name, relative to the data directory.
    #[serde(default = "default_database_file")]
    pub database_file: String,
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("procflow/{}", env!("CARGO_PKG_VERSION"))
}

fn default_wait_timeout_secs() -> u64 {
    30
}

fn default_database_file() -> String {
    "procflow.db".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout_secs(),
            user_agent: default_user_agent(),
            max_concurrent_nodes: None,
            default_wait_timeout_secs: default_wait_timeout_secs(),
            database_file: default_database_file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.http_timeout_secs, 30);
        assert_eq!(config.default_wait_timeout_secs, 30);
        assert!(config.max_concurrent_nodes.is_none());
        assert!(config.user_agent.starts_with("procflow/"));
        assert_eq!(config.database_file, "procflow.db");
    }

    #[test]
    fn test_engine_config_partial_toml() {
        let config: EngineConfig = toml::from_str("max_concurrent_nodes = 4\n").unwrap();
        assert_eq!(config.max_concurrent_nodes, Some(4));
        assert_eq!(config.http_timeout_secs, 30);
    }

    #[test]
    fn test_engine_config_empty_toml_is_default() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }
}
