//! Well-known locations for Conductor.
//!
//! # Storage Structure
//!
//! ```text
//! ~/.conductor/
//! ├── config/
//! │   ├── conductor.toml   # Settings (agents, intervals)
//! │   └── .env.local       # Environment overrides
//! ├── reports/             # Rendered phase reports
//! └── coordination.md      # Default coordination document
//! ```
//!
//! # Environment Variables
//!
//! - `CONDUCTOR_STATE_DIR`: Override the base state directory
//! - `CONDUCTOR_CONFIG`: Override the settings file path
//! - `CONDUCTOR_REPORTS_DIR`: Override the report output directory

use std::path::PathBuf;

/// Environment variable for custom state directory.
pub const STATE_DIR_ENV: &str = "CONDUCTOR_STATE_DIR";

/// Environment variable for a custom settings file.
pub const CONFIG_FILE_ENV: &str = "CONDUCTOR_CONFIG";

/// Environment variable for custom report directory.
pub const REPORTS_DIR_ENV: &str = "CONDUCTOR_REPORTS_DIR";

/// Default state directory name under home.
const DEFAULT_STATE_DIR: &str = ".conductor";

const CONFIG_SUBDIR: &str = "config";
const REPORTS_SUBDIR: &str = "reports";

/// File name of the checklist inside an agent state directory.
pub const DEFAULT_CHECKLIST_FILE: &str = "task.md";

/// File name of the completion narrative inside an agent state directory.
pub const DEFAULT_NARRATIVE_FILE: &str = "walkthrough.md";

/// File name of the continuation request inside an agent state directory.
pub const CONTINUATION_FILE: &str = "continuation_request.json";

/// Get the Conductor state directory.
///
/// 1. `CONDUCTOR_STATE_DIR` environment variable if set
/// 2. `~/.conductor` if home directory is available
/// 3. `.conductor` in current directory as fallback
pub fn state_dir() -> PathBuf {
    std::env::var(STATE_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(DEFAULT_STATE_DIR))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
        })
}

/// Get the config directory.
pub fn config_dir() -> PathBuf {
    state_dir().join(CONFIG_SUBDIR)
}

/// Get the settings file path (`CONDUCTOR_CONFIG` or `config/conductor.toml`).
pub fn config_file() -> PathBuf {
    std::env::var(CONFIG_FILE_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| config_dir().join("conductor.toml"))
}

/// Get the `.env.local` file path.
pub fn env_file() -> PathBuf {
    config_dir().join(".env.local")
}

/// Get the report output directory.
pub fn reports_dir() -> PathBuf {
    std::env::var(REPORTS_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| state_dir().join(REPORTS_SUBDIR))
}

/// Default coordination document path.
pub fn coordination_file() -> PathBuf {
    state_dir().join("coordination.md")
}

/// Ensure the state directory and its subdirectories exist.
///
/// # Errors
/// Returns an error if any directory cannot be created.
pub fn ensure_all_dirs() -> std::io::Result<()> {
    std::fs::create_dir_all(config_dir())?;
    std::fs::create_dir_all(reports_dir())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment variables cannot be isolated between parallel tests, so
    // these only check path construction.

    #[test]
    fn test_state_dir_smoke() {
        let dir = state_dir();
        assert!(dir.is_absolute() || dir.ends_with(".conductor"));
    }

    #[test]
    fn test_config_dir_name() {
        assert!(config_dir().ends_with("config"));
    }

    #[test]
    fn test_env_file_name() {
        assert!(env_file().ends_with(".env.local"));
    }

    #[test]
    fn test_coordination_file_name() {
        assert!(coordination_file().ends_with("coordination.md"));
    }
}
