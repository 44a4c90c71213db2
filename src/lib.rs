//! Kashir wallet settings core.
//!
//! Manages the wallet's Nostr relays and Cashu mints, custody of the seed
//! phrase, and a resilient fetch of a user's recent text notes.

pub mod cli;
pub mod config;
pub mod error;
pub mod feed;
pub mod notice;
pub mod secret;
pub mod settings;
pub mod store;

pub use config::AppConfig;
pub use error::{ErrorCategory, FeedError, SecretError, SettingsError};
pub use feed::{FeedFetcher, FeedSettings, FetchOutcome, FetchState};
pub use notice::{Notice, NoticeLevel, Notifier};
pub use secret::{
    Authenticator, EncryptedFileSecretStore, KdfParams, RecoverySecret, SecretStore,
    StaticPassphrase,
};
pub use settings::{ActivationReport, ConfigurationSnapshot, FacetStatus, MintEndpoint, SettingsManager};
pub use store::{ConfigStore, MintRemoval, RelayRemoval, SqliteConfigStore};
