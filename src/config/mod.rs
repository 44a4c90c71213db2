pub mod schema;

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nostr_core::normalize_relay_url;

use crate::feed::FeedSettings;

pub use schema::{
    default_nostr_relays, AppConfig, FeedConfig, LoggingConfig, RelaysConfig, SecretConfig,
    StorageConfig, APP_DIR_NAME, CONFIG_FILE_NAME,
};

impl AppConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let expanded = shellexpand::tilde(&path.to_string_lossy()).to_string();
        let path = Path::new(&expanded);

        let mut config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str::<AppConfig>(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            AppConfig::default()
        };

        config.expand_paths();
        config.validate()?;
        Ok(config)
    }

    /// `~/.kashir/config.toml`, resolved against the user's home directory.
    pub fn default_path() -> Result<PathBuf> {
        let dirs = directories::UserDirs::new().context("Could not determine home directory")?;
        Ok(dirs.home_dir().join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    pub fn expand_paths(&mut self) {
        self.storage.data_dir = shellexpand::tilde(&self.storage.data_dir).to_string();
    }

    pub fn validate(&self) -> Result<()> {
        if self.relays.defaults.is_empty() {
            anyhow::bail!("At least one default relay is required");
        }
        for relay in &self.relays.defaults {
            normalize_relay_url(relay).with_context(|| format!("Invalid default relay: {relay}"))?;
        }

        if self.feed.timeout_ms == 0 {
            anyhow::bail!("feed.timeout_ms must be greater than zero");
        }
        if self.feed.limit == 0 {
            anyhow::bail!("feed.limit must be greater than zero");
        }

        if self.storage.db_file.trim().is_empty() || self.secret.file.trim().is_empty() {
            anyhow::bail!("storage.db_file and secret.file must not be empty");
        }

        Ok(())
    }

    /// Default relays in canonical form.
    pub fn default_relays(&self) -> Vec<String> {
        self.relays
            .defaults
            .iter()
            .filter_map(|r| normalize_relay_url(r).ok())
            .collect()
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.storage.data_dir)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir().join(&self.storage.db_file)
    }

    pub fn secret_path(&self) -> PathBuf {
        self.data_dir().join(&self.secret.file)
    }

    pub fn feed_settings(&self) -> FeedSettings {
        FeedSettings {
            timeout: Duration::from_millis(self.feed.timeout_ms),
            limit: self.feed.limit,
        }
    }
}
