//! # Scheduler Configuration
//!
//! ## Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 Later layers win                                        │
//! │                                                                         │
//! │  3. KEEL_* environment                                                 │
//! │     KEEL_CHECK_INTERVAL_MS=3000                                        │
//! │     KEEL_DATABASE_PATH=/var/lib/keel/keel.db                           │
//! │     KEEL_WAKE_ON_NETWORK_CHANGE=false                                  │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/keel/keel.toml (Linux)                                   │
//! │     ~/Library/Application Support/com.keel.keel/keel.toml (macOS)      │
//! │                                                                         │
//! │  1. Built-in defaults                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [scheduler]
//! check_interval_ms = 3000
//! wake_on_network_change = true
//!
//! [storage]
//! database_path = "/var/lib/keel/keel.db"
//! max_connections = 5
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};

/// File name of the config file inside the project config dir.
const CONFIG_FILE_NAME: &str = "keel.toml";

/// File name of the database inside the project data dir.
const DATABASE_FILE_NAME: &str = "keel.db";

// =============================================================================
// Scheduler Settings
// =============================================================================

/// Scheduler loop behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Interval between resubmission passes (milliseconds).
    #[serde(default = "default_check_interval")]
    pub check_interval_ms: u64,

    /// Run a pass as soon as connectivity comes back instead of waiting for
    /// the next tick.
    #[serde(default = "default_true")]
    pub wake_on_network_change: bool,
}

fn default_check_interval() -> u64 {
    3000
}

fn default_true() -> bool {
    true
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        SchedulerSettings {
            check_interval_ms: default_check_interval(),
            wake_on_network_change: true,
        }
    }
}

// =============================================================================
// Storage Settings
// =============================================================================

/// Durable store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// SQLite database file. Defaults to the platform data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Connection pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            database_path: None,
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Scheduler loop settings.
    #[serde(default)]
    pub scheduler: SchedulerSettings,

    /// Durable store settings.
    #[serde(default)]
    pub storage: StorageSettings,
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the effective config: defaults, then `keel.toml` (the given
    /// path or the platform config dir), then `KEEL_*` variables. The
    /// result is validated before it is returned.
    ///
    /// A missing file is not an error.
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let path = config_path.or_else(|| Self::config_dir_file(CONFIG_FILE_NAME));

        let mut config = match path {
            Some(path) if path.is_file() => {
                let contents = std::fs::read_to_string(&path)
                    .map_err(|source| SyncError::ConfigRead { path: path.clone(), source })?;
                info!(path = %path.display(), "Read scheduler config");
                Self::from_toml_str(&contents)?
            }
            Some(path) => {
                debug!(path = %path.display(), "No config file, starting from defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Like [`load`](Self::load), but logs and falls back to defaults.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        match Self::load(config_path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Unusable scheduler config, falling back to defaults");
                Self::default()
            }
        }
    }

    /// Parses TOML only. Environment overrides are not applied.
    pub fn from_toml_str(contents: &str) -> SyncResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Writes the config as TOML, creating parent directories.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(|| Self::config_dir_file(CONFIG_FILE_NAME))
            .ok_or_else(|| SyncError::ConfigWrite {
                path: PathBuf::from(CONFIG_FILE_NAME),
                reason: "no config directory on this platform".into(),
            })?;
        let write_failed = |reason: String| SyncError::ConfigWrite {
            path: path.clone(),
            reason,
        };

        let contents = toml::to_string_pretty(self).map_err(|e| write_failed(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| write_failed(e.to_string()))?;
        }
        std::fs::write(&path, contents).map_err(|e| write_failed(e.to_string()))?;

        info!(path = %path.display(), "Wrote scheduler config");
        Ok(())
    }

    /// Rejects settings the engine cannot run with.
    pub fn validate(&self) -> SyncResult<()> {
        if self.scheduler.check_interval_ms == 0 {
            return Err(SyncError::InvalidConfig(
                "scheduler.check_interval_ms must be at least 1".into(),
            ));
        }
        if self.storage.max_connections == 0 {
            return Err(SyncError::InvalidConfig(
                "storage.max_connections must be at least 1".into(),
            ));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(raw) = std::env::var("KEEL_CHECK_INTERVAL_MS") {
            match raw.parse::<u64>() {
                Ok(ms) => self.scheduler.check_interval_ms = ms,
                Err(_) => warn!(value = %raw, "KEEL_CHECK_INTERVAL_MS is not a number, ignored"),
            }
        }

        if let Ok(raw) = std::env::var("KEEL_DATABASE_PATH") {
            self.storage.database_path = Some(PathBuf::from(raw));
        }

        if let Ok(raw) = std::env::var("KEEL_WAKE_ON_NETWORK_CHANGE") {
            match parse_flag(&raw) {
                Some(wake) => self.scheduler.wake_on_network_change = wake,
                None => warn!(value = %raw, "KEEL_WAKE_ON_NETWORK_CHANGE is not a boolean, ignored"),
            }
        }
    }

    fn config_dir_file(name: &str) -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(name))
    }

    // =========================================================================
    // Derived values
    // =========================================================================

    /// Time between two scheduler passes.
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.scheduler.check_interval_ms)
    }

    /// Configured database file, else `keel.db` in the platform data dir.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.storage
            .database_path
            .clone()
            .or_else(|| project_dirs().map(|dirs| dirs.data_dir().join(DATABASE_FILE_NAME)))
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "keel", "keel")
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.scheduler.check_interval_ms, 3000);
        assert_eq!(config.check_interval(), Duration::from_millis(3000));
        assert!(config.scheduler.wake_on_network_change);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = SchedulerConfig::from_toml_str(
            r#"
            [scheduler]
            check_interval_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.scheduler.check_interval_ms, 250);
        assert!(config.scheduler.wake_on_network_change);
        assert!(config.storage.database_path.is_none());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SchedulerConfig::default();
        config.scheduler.check_interval_ms = 0;
        assert!(config.validate().is_err());

        config.scheduler.check_interval_ms = 10;
        config.storage.max_connections = 0;
        let err = config.validate().unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("keel.toml");

        let mut config = SchedulerConfig::default();
        config.storage.database_path = Some(dir.path().join("keel.db"));
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[scheduler]"));
        assert!(contents.contains("[storage]"));

        let parsed = SchedulerConfig::from_toml_str(&contents).unwrap();
        assert_eq!(parsed.storage.database_path, config.storage.database_path);
    }

    #[test]
    fn test_explicit_database_path_wins() {
        let mut config = SchedulerConfig::default();
        config.storage.database_path = Some(PathBuf::from("/tmp/keel.db"));
        assert_eq!(config.database_path(), Some(PathBuf::from("/tmp/keel.db")));
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let err = SchedulerConfig::from_toml_str("[scheduler\n").unwrap_err();
        assert!(matches!(err, SyncError::ConfigParse(_)));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SchedulerConfig::load_or_default(Some(dir.path().join("absent.toml")));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_onto_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = SchedulerConfig::default()
            .save(Some(dir.path().to_path_buf()))
            .unwrap_err();
        assert!(matches!(err, SyncError::ConfigWrite { .. }));
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag(" Yes "), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
