//! Kashir configuration types.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::secret::KdfParams;

// ── Identity ────────────────────────────────────────────────────

/// Default config directory name under `$HOME`.
pub const APP_DIR_NAME: &str = ".kashir";

/// Config file name inside [`APP_DIR_NAME`].
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Top-level Kashir configuration (`~/.kashir/config.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub relays: RelaysConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub secret: SecretConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ── Storage ─────────────────────────────────────────────────────

/// Where durable settings live.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StorageConfig {
    /// Data directory; `~` is expanded.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// SQLite file name inside `data_dir`.
    #[serde(default = "default_db_file")]
    pub db_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            db_file: default_db_file(),
        }
    }
}

fn default_data_dir() -> String {
    format!("~/{APP_DIR_NAME}")
}

fn default_db_file() -> String {
    "settings.db".into()
}

// ── Relays ──────────────────────────────────────────────────────

/// Relays seeded into an empty store on first run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RelaysConfig {
    /// Relay URLs (wss://). Defaults to popular public relays if omitted.
    #[serde(default = "default_nostr_relays")]
    pub defaults: Vec<String>,
}

impl Default for RelaysConfig {
    fn default() -> Self {
        Self {
            defaults: default_nostr_relays(),
        }
    }
}

pub fn default_nostr_relays() -> Vec<String> {
    vec![
        "wss://relay.damus.io".to_string(),
        "wss://nos.lol".to_string(),
        "wss://relay.primal.net".to_string(),
    ]
}

// ── Feed ────────────────────────────────────────────────────────

/// Feed fetch tuning.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FeedConfig {
    /// Per-attempt deadline in milliseconds (default: 30000).
    #[serde(default = "default_feed_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum events requested per fetch (default: 50).
    #[serde(default = "default_feed_limit")]
    pub limit: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_feed_timeout_ms(),
            limit: default_feed_limit(),
        }
    }
}

pub fn default_feed_timeout_ms() -> u64 {
    30_000
}

pub fn default_feed_limit() -> usize {
    50
}

// ── Secret ──────────────────────────────────────────────────────

/// Sealed seed phrase file and its key-derivation cost.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SecretConfig {
    /// Sealed seed file name inside `data_dir`.
    #[serde(default = "default_secret_file")]
    pub file: String,
    #[serde(default = "default_kdf_memory_kib")]
    pub kdf_memory_kib: u32,
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,
    #[serde(default = "default_kdf_parallelism")]
    pub kdf_parallelism: u32,
}

impl Default for SecretConfig {
    fn default() -> Self {
        Self {
            file: default_secret_file(),
            kdf_memory_kib: default_kdf_memory_kib(),
            kdf_iterations: default_kdf_iterations(),
            kdf_parallelism: default_kdf_parallelism(),
        }
    }
}

impl SecretConfig {
    pub fn kdf_params(&self) -> KdfParams {
        KdfParams {
            memory_kib: self.kdf_memory_kib,
            iterations: self.kdf_iterations,
            parallelism: self.kdf_parallelism,
        }
    }
}

fn default_secret_file() -> String {
    "seed.enc".into()
}

fn default_kdf_memory_kib() -> u32 {
    KdfParams::default().memory_kib
}

fn default_kdf_iterations() -> u32 {
    KdfParams::default().iterations
}

fn default_kdf_parallelism() -> u32 {
    KdfParams::default().parallelism
}

// ── Logging ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}
