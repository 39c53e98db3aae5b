//! # Sync Configuration
//!
//! Configuration management for the sync core.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TALLY_ENDPOINT_URL=https://api.example.com/transactions            │
//! │     TALLY_DEVICE_ID=till-01                                            │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/tally-pos/sync.toml (Linux)                              │
//! │     ~/Library/Application Support/com.tally.pos/sync.toml (macOS)      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     auto-generated device id, no endpoint (sync stays local)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [device]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Till 1"
//!
//! [store]
//! database_path = "/var/lib/tally/tally.db"
//!
//! [sync]
//! auto_sync = true
//! endpoint_url = "https://api.example.com/transactions"
//! submit_timeout_ms = 10000
//! poll_interval_secs = 30
//! background_tag = "sync-transactions"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tally_db::DbConfig;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Device Configuration
// =============================================================================

/// Configuration for this device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device identifier.
    /// Auto-generated on first run if not provided.
    pub id: String,

    /// Human-readable device name (e.g., "Till 1").
    #[serde(default = "default_device_name")]
    pub name: String,
}

fn default_device_name() -> String {
    "POS Terminal".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            id: Uuid::new_v4().to_string(),
            name: default_device_name(),
        }
    }
}

// =============================================================================
// Store Configuration
// =============================================================================

/// Where the local store lives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite file. Defaults to `tally.db` in the platform data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Sync behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Sync on reconnect and on the poll interval. When false, only
    /// `manual_sync` and the record-time fast path submit anything.
    #[serde(default = "default_true")]
    pub auto_sync: bool,

    /// URL the transaction JSON is POSTed to. No URL, no remote.
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Per-submission timeout in milliseconds.
    #[serde(default = "default_submit_timeout")]
    pub submit_timeout_ms: u64,

    /// Seconds between passes while online.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Tag the deferred background task is registered under.
    #[serde(default = "default_background_tag")]
    pub background_tag: String,
}

fn default_true() -> bool {
    true
}
fn default_submit_timeout() -> u64 {
    10_000
}
fn default_poll_interval() -> u64 {
    30
}
fn default_background_tag() -> String {
    "sync-transactions".to_string()
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            auto_sync: true,
            endpoint_url: None,
            submit_timeout_ms: default_submit_timeout(),
            poll_interval_secs: default_poll_interval(),
            background_tag: default_background_tag(),
        }
    }
}

// =============================================================================
// Main Sync Config
// =============================================================================

/// Complete configuration for the sync core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Device-specific configuration.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Local store configuration.
    #[serde(default)]
    pub store: StoreConfig,

    /// Sync behavior settings.
    #[serde(default)]
    pub sync: SyncSettings,
}

impl SyncConfig {
    /// Creates a new config with defaults and a generated device ID.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.device.id.trim().is_empty() {
            return Err(SyncError::MissingDeviceId);
        }

        if let Some(ref raw) = self.sync.endpoint_url {
            let url = Url::parse(raw)?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(SyncError::InvalidUrl(format!(
                    "Endpoint URL must use http:// or https://, got: {}",
                    raw
                )));
            }
        }

        if self.sync.submit_timeout_ms == 0 {
            return Err(SyncError::InvalidConfig(
                "submit_timeout_ms must be greater than 0".into(),
            ));
        }

        if self.sync.poll_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "poll_interval_secs must be greater than 0".into(),
            ));
        }

        if self.sync.background_tag.trim().is_empty() {
            return Err(SyncError::InvalidConfig("background_tag must not be empty".into()));
        }

        Ok(())
    }

    /// Applies `TALLY_*` overrides read through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup("TALLY_DEVICE_ID") {
            debug!(device_id = %id, "Overriding device ID from environment");
            self.device.id = id;
        }

        if let Some(name) = lookup("TALLY_DEVICE_NAME") {
            self.device.name = name;
        }

        if let Some(path) = lookup("TALLY_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.store.database_path = Some(PathBuf::from(path));
        }

        if let Some(url) = lookup("TALLY_ENDPOINT_URL") {
            debug!(url = %url, "Overriding endpoint URL from environment");
            self.sync.endpoint_url = Some(url);
        }

        if let Some(auto) = lookup("TALLY_AUTO_SYNC") {
            match auto.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.sync.auto_sync = true,
                "0" | "false" | "no" => self.sync.auto_sync = false,
                _ => warn!(value = %auto, "Unknown TALLY_AUTO_SYNC value in environment"),
            }
        }

        if let Some(ms) = lookup("TALLY_SUBMIT_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse::<u64>() {
                self.sync.submit_timeout_ms = ms;
            }
        }

        if let Some(secs) = lookup("TALLY_POLL_INTERVAL_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                self.sync.poll_interval_secs = secs;
            }
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "tally", "pos")
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the device ID.
    pub fn device_id(&self) -> &str {
        &self.device.id
    }

    /// Returns the endpoint URL if configured.
    pub fn endpoint_url(&self) -> Option<&str> {
        self.sync.endpoint_url.as_deref()
    }

    /// Per-submission timeout.
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.sync.submit_timeout_ms)
    }

    /// Interval between passes while online.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.sync.poll_interval_secs)
    }

    /// Resolved database file: configured path, else the platform data
    /// directory, else the working directory.
    pub fn database_path(&self) -> PathBuf {
        self.store
            .database_path
            .clone()
            .or_else(|| Self::project_dirs().map(|dirs| dirs.data_dir().join("tally.db")))
            .unwrap_or_else(|| PathBuf::from("tally.db"))
    }

    /// Store configuration for `Database::open`.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert!(!config.device.id.is_empty()); // Auto-generated
        assert!(config.sync.auto_sync);
        assert_eq!(config.submit_timeout(), Duration::from_secs(10));
        assert_eq!(config.sync.background_tag, "sync-transactions");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SyncConfig::default();

        config.device.id = String::new();
        assert!(matches!(config.validate(), Err(SyncError::MissingDeviceId)));

        config.device.id = "till-01".to_string();
        config.sync.endpoint_url = Some("ws://localhost:8080".to_string());
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));

        config.sync.endpoint_url = Some("not a url".to_string());
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));

        config.sync.endpoint_url = Some("https://api.example.com/transactions".to_string());
        assert!(config.validate().is_ok());

        config.sync.submit_timeout_ms = 0;
        assert!(matches!(config.validate(), Err(SyncError::InvalidConfig(_))));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("TALLY_DEVICE_ID", "till-07"),
            ("TALLY_ENDPOINT_URL", "http://localhost:9000/tx"),
            ("TALLY_AUTO_SYNC", "false"),
            ("TALLY_SUBMIT_TIMEOUT_MS", "2500"),
            ("TALLY_POLL_INTERVAL_SECS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = SyncConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.device_id(), "till-07");
        assert_eq!(config.endpoint_url(), Some("http://localhost:9000/tx"));
        assert!(!config.sync.auto_sync);
        assert_eq!(config.submit_timeout(), Duration::from_millis(2_500));
        assert_eq!(config.sync.poll_interval_secs, 30);
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.toml");

        let mut config = SyncConfig::default();
        config.store.database_path = Some(dir.path().join("tally.db"));
        config.sync.endpoint_url = Some("https://api.example.com/transactions".into());
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[device]"));
        assert!(contents.contains("[sync]"));

        let loaded: SyncConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded.device.id, config.device.id);
        assert_eq!(loaded.database_path(), dir.path().join("tally.db"));
        assert_eq!(loaded.endpoint_url(), config.endpoint_url());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: SyncConfig = toml::from_str(
            r#"
            [device]
            id = "till-02"
            "#,
        )
        .unwrap();

        assert_eq!(config.device.name, "POS Terminal");
        assert_eq!(config.sync.poll_interval_secs, 30);
        assert!(config.endpoint_url().is_none());
    }
}
