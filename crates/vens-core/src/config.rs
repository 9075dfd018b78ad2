use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, VensError};

/// Top-level configuration for the Vens reminder service.
///
/// Loaded from `~/.vens/config.toml` by default. Every section is optional
/// in the file and falls back to its defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VensConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl VensConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: VensConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| VensError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the reminder database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.vens/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Scheduler core tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How long to wait for the notifier to accept or reject a registration.
    pub notifier_timeout_ms: u64,
    /// Approximate reminders later than this are flagged as past due.
    pub past_due_tolerance_secs: i64,
    /// Fixed zone for exact triggers, in minutes east of UTC. Unset means
    /// the system's local zone.
    pub utc_offset_minutes: Option<i32>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            notifier_timeout_ms: 5_000,
            past_due_tolerance_secs: 5,
            utc_offset_minutes: None,
        }
    }
}

/// Background sweep settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub enabled: bool,
    /// Earliest start of the next sweep, relative to the current one.
    pub interval_secs: u64,
    /// Time budget per sweep before the expiration signal is raised.
    pub budget_secs: u64,
    /// Active reminders this far past their fire time are reconciled as fired.
    pub overdue_grace_secs: i64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 15 * 60,
            budget_secs: 30,
            overdue_grace_secs: 60,
        }
    }
}

/// Local notifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Whether the user granted notification permission.
    pub authorized: bool,
    /// Maximum number of pending triggers the notifier accepts.
    pub max_pending: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            authorized: true,
            max_pending: 64,
        }
    }
}

/// Reminder store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Database file name inside `general.data_dir`.
    pub db_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            db_file: "reminders.db".to_string(),
        }
    }
}

/// HTTP method-channel server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 3030,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = VensConfig::default();

        assert_eq!(config.general.data_dir, "~/.vens/data");
        assert_eq!(config.general.log_level, "info");

        assert_eq!(config.scheduler.notifier_timeout_ms, 5_000);
        assert_eq!(config.scheduler.past_due_tolerance_secs, 5);
        assert!(config.scheduler.utc_offset_minutes.is_none());

        assert!(config.sweep.enabled);
        assert_eq!(config.sweep.interval_secs, 900);
        assert_eq!(config.sweep.budget_secs, 30);
        assert_eq!(config.sweep.overdue_grace_secs, 60);

        assert!(config.notifier.authorized);
        assert_eq!(config.notifier.max_pending, 64);

        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.storage.db_file, "reminders.db");

        assert!(config.api.enabled);
        assert_eq!(config.api.port, 3030);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_str = r#"
            [scheduler]
            utc_offset_minutes = 120

            [storage]
            backend = "memory"
        "#;
        let config: VensConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.scheduler.utc_offset_minutes, Some(120));
        assert_eq!(config.scheduler.notifier_timeout_ms, 5_000);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.db_file, "reminders.db");
        assert_eq!(config.api.port, 3030);
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config: VensConfig = toml::from_str("").unwrap();
        assert_eq!(config.sweep.interval_secs, 900);
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = VensConfig::default();
        config.api.port = 4040;
        config.sweep.budget_secs = 10;
        config.scheduler.utc_offset_minutes = Some(-300);
        config.save(&path).unwrap();

        let loaded = VensConfig::load(&path).unwrap();
        assert_eq!(loaded.api.port, 4040);
        assert_eq!(loaded.sweep.budget_secs, 10);
        assert_eq!(loaded.scheduler.utc_offset_minutes, Some(-300));
    }

    #[test]
    fn test_load_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let result = VensConfig::load(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(VensError::Io(_))));
    }

    #[test]
    fn test_load_or_default_on_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api\nport = ").unwrap();
        let config = VensConfig::load_or_default(&path);
        assert_eq!(config.api.port, 3030);
    }
}
