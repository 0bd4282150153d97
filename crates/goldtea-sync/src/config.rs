//! # GoldTea Configuration
//!
//! Configuration for the cache and sync layer.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     GOLDTEA_CACHE_TTL_MS=60000                                         │
//! │     GOLDTEA_DB_PATH=/data/goldtea.db                                   │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/goldtea-sales/goldtea.toml (Linux)                       │
//! │     ~/Library/Application Support/com.goldtea.sales/goldtea.toml       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     4 minute TTL, 5 cached notes, outbox on                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # goldtea.toml
//! [cache]
//! ttl_ms = 240000
//! note_cache_capacity = 5
//! sales_page_size = 50
//! notes_page_size = 30
//!
//! [outbox]
//! enabled = true
//! poll_interval_secs = 5
//! batch_size = 50
//! max_attempts = 10
//!
//! [store]
//! database_path = "/var/lib/goldtea/goldtea.db"
//!
//! [connectivity]
//! probe_addr = "firestore.googleapis.com:443"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use goldtea_core::{DEFAULT_CACHE_TTL_MS, DEFAULT_NOTE_CACHE_CAPACITY, MAX_PAGE_SIZE};

use crate::error::{SyncError, SyncResult};

const CONFIG_FILE_NAME: &str = "goldtea.toml";
const DATABASE_FILE_NAME: &str = "goldtea.db";

// =============================================================================
// Cache Settings
// =============================================================================

/// Cache sizing and freshness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// How long a fetched result stays valid (milliseconds).
    /// Applies uniformly to every cache.
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,

    /// Number of notes kept by the single-note LRU cache.
    #[serde(default = "default_note_cache_capacity")]
    pub note_cache_capacity: usize,

    /// Page size used by the sales list.
    #[serde(default = "default_sales_page_size")]
    pub sales_page_size: usize,

    /// Page size used by the notes list.
    #[serde(default = "default_notes_page_size")]
    pub notes_page_size: usize,
}

fn default_ttl_ms() -> u64 {
    DEFAULT_CACHE_TTL_MS
}

fn default_note_cache_capacity() -> usize {
    DEFAULT_NOTE_CACHE_CAPACITY
}

fn default_sales_page_size() -> usize {
    50
}

fn default_notes_page_size() -> usize {
    30
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            ttl_ms: default_ttl_ms(),
            note_cache_capacity: default_note_cache_capacity(),
            sales_page_size: default_sales_page_size(),
            notes_page_size: default_notes_page_size(),
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

// =============================================================================
// Outbox Settings
// =============================================================================

/// Retry queue for background writes that failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxSettings {
    /// Persist failed writes and replay them. When off, failures are only logged.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Interval between outbox poll cycles (seconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Number of pending writes replayed per cycle.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Attempts before a pending write is given up on.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First backoff step after a failing cycle (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Longest wait between cycles while failures persist (seconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_poll_interval() -> u64 {
    5
}
fn default_batch_size() -> usize {
    50
}
fn default_max_attempts() -> u32 {
    10
}
fn default_initial_backoff() -> u64 {
    500
}
fn default_max_backoff() -> u64 {
    60
}

impl Default for OutboxSettings {
    fn default() -> Self {
        OutboxSettings {
            enabled: default_true(),
            poll_interval_secs: default_poll_interval(),
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

impl OutboxSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

// =============================================================================
// Store Settings
// =============================================================================

/// Where the SQLite document store lives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Database file. Defaults to `<data dir>/goldtea.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

// =============================================================================
// Connectivity Settings
// =============================================================================

/// Reachability probing of the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivitySettings {
    /// `host:port` opened by the TCP probe.
    #[serde(default = "default_probe_addr")]
    pub probe_addr: String,

    /// Interval between probes (seconds).
    #[serde(default = "default_probe_interval")]
    pub poll_interval_secs: u64,

    /// Probe connect timeout (milliseconds).
    #[serde(default = "default_probe_timeout")]
    pub timeout_ms: u64,
}

fn default_probe_addr() -> String {
    "firestore.googleapis.com:443".to_string()
}

fn default_probe_interval() -> u64 {
    10
}

fn default_probe_timeout() -> u64 {
    3000
}

impl Default for ConnectivitySettings {
    fn default() -> Self {
        ConnectivitySettings {
            probe_addr: default_probe_addr(),
            poll_interval_secs: default_probe_interval(),
            timeout_ms: default_probe_timeout(),
        }
    }
}

impl ConnectivitySettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete configuration of the data layer.
///
/// ## Example Config File
/// ```toml
/// [cache]
/// ttl_ms = 240000
///
/// [outbox]
/// enabled = false
///
/// [store]
/// database_path = "./goldtea_dev.db"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoldteaConfig {
    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub outbox: OutboxSettings,

    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub connectivity: ConnectivitySettings,
}

impl GoldteaConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (goldtea.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                config = Self::from_file(&path)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Parses a config file without applying overrides.
    pub fn from_file(path: &Path) -> SyncResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.cache.ttl_ms == 0 {
            return Err(SyncError::InvalidConfig(
                "cache.ttl_ms must be greater than 0".into(),
            ));
        }

        if self.cache.note_cache_capacity == 0 {
            return Err(SyncError::InvalidConfig(
                "cache.note_cache_capacity must be greater than 0".into(),
            ));
        }

        for (name, size) in [
            ("cache.sales_page_size", self.cache.sales_page_size),
            ("cache.notes_page_size", self.cache.notes_page_size),
        ] {
            if size == 0 || size > MAX_PAGE_SIZE {
                return Err(SyncError::InvalidConfig(format!(
                    "{} must be between 1 and {}, got {}",
                    name, MAX_PAGE_SIZE, size
                )));
            }
        }

        if self.outbox.batch_size == 0 {
            return Err(SyncError::InvalidConfig(
                "outbox.batch_size must be greater than 0".into(),
            ));
        }

        if self.outbox.poll_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "outbox.poll_interval_secs must be greater than 0".into(),
            ));
        }

        if self.connectivity.poll_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "connectivity.poll_interval_secs must be greater than 0".into(),
            ));
        }

        if !self.connectivity.probe_addr.contains(':') {
            return Err(SyncError::InvalidConfig(format!(
                "connectivity.probe_addr must be host:port, got: {}",
                self.connectivity.probe_addr
            )));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup.
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ttl) = lookup("GOLDTEA_CACHE_TTL_MS") {
            match ttl.parse::<u64>() {
                Ok(ms) => {
                    debug!(ttl_ms = ms, "Overriding cache TTL from environment");
                    self.cache.ttl_ms = ms;
                }
                Err(_) => warn!(value = %ttl, "Ignoring invalid GOLDTEA_CACHE_TTL_MS"),
            }
        }

        if let Some(capacity) = lookup("GOLDTEA_NOTE_CACHE_CAPACITY") {
            match capacity.parse::<usize>() {
                Ok(n) => self.cache.note_cache_capacity = n,
                Err(_) => warn!(value = %capacity, "Ignoring invalid GOLDTEA_NOTE_CACHE_CAPACITY"),
            }
        }

        if let Some(path) = lookup("GOLDTEA_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.store.database_path = Some(PathBuf::from(path));
        }

        if let Some(enabled) = lookup("GOLDTEA_OUTBOX_ENABLED") {
            match enabled.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.outbox.enabled = true,
                "0" | "false" | "no" | "off" => self.outbox.enabled = false,
                _ => warn!(value = %enabled, "Ignoring invalid GOLDTEA_OUTBOX_ENABLED"),
            }
        }

        if let Some(addr) = lookup("GOLDTEA_PROBE_ADDR") {
            self.connectivity.probe_addr = addr;
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Returns the default database file path.
    pub fn default_database_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.data_dir().join(DATABASE_FILE_NAME))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// The configured database path, falling back to the platform default
    /// and finally to the working directory.
    pub fn database_path(&self) -> PathBuf {
        self.store
            .database_path
            .clone()
            .or_else(Self::default_database_path)
            .unwrap_or_else(|| PathBuf::from(DATABASE_FILE_NAME))
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache.ttl()
    }

    pub fn is_outbox_enabled(&self) -> bool {
        self.outbox.enabled
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "goldtea", "sales")
}
