//! Data directory layout.

use std::path::PathBuf;

pub const DATA_DIR_ENV: &str = "PROCFLOW_DATA_DIR";

/// Resolve the data directory.
///
/// Priority:
/// 1. `PROCFLOW_DATA_DIR` environment variable
/// 2. `~/.procflow`
/// 3. `./.procflow`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".procflow");
    }

    PathBuf::from(".procflow")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_data_dir_from_env() {
        // SAFETY: no other test in this crate reads or writes this variable.
        unsafe {
            std::env::set_var(DATA_DIR_ENV, "/tmp/test-procflow");
        }
        let dir = resolve_data_dir();
        unsafe {
            std::env::remove_var(DATA_DIR_ENV);
        }
        assert_eq!(dir, PathBuf::from("/tmp/test-procflow"));
    }
}
