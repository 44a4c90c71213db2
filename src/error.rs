//! Error taxonomy for the settings core.
//!
//! Adapters report `anyhow` errors; the manager and the fetcher convert them
//! into these typed errors at their boundary so the presentation layer can
//! tell a cancelled authentication from a missing seed, or a failed fetch from
//! an empty one.

use nostr_core::InvalidEndpoint;
use thiserror::Error;

/// Coarse category used to pick a user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    StoreWriteFailure,
    StoreReadFailure,
    ConstraintViolation,
    AuthenticationCancelled,
    AuthenticationFailed,
    NotFound,
    NetworkFetchFailure,
    ReconnectFailure,
    ClientUnready,
}

/// Failures of the secure secret store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecretError {
    #[error("Authentication was cancelled")]
    AuthenticationCancelled,
    #[error("Authentication failed")]
    AuthenticationFailed,
    #[error("No seed phrase found in secure storage")]
    NotFound,
    #[error("A seed phrase is already stored")]
    AlreadyExists,
    #[error("Failed to read secure storage: {0}")]
    StorageRead(String),
    #[error("Failed to write secure storage: {0}")]
    StorageWrite(String),
}

/// Failures of configuration manager operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },
    #[error("Failed to save {0}")]
    StoreWrite(String),
    #[error("Failed to load {0}")]
    StoreRead(String),
    #[error("Cannot remove the last relay")]
    LastRelay,
    #[error(transparent)]
    Secret(#[from] SecretError),
    #[error("Relays saved, but reconnecting failed: {0}")]
    Reconnect(String),
}

/// Failures of a feed fetch. An empty result is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("Client not ready. Please wait and try again.")]
    ClientUnready,
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),
    #[error("Failed to fetch posts: {fallback} (first attempt: {primary})")]
    NetworkFetch { primary: String, fallback: String },
}

impl SettingsError {
    pub(crate) fn invalid_endpoint(field: &'static str, err: InvalidEndpoint) -> Self {
        Self::Validation {
            field,
            reason: err.to_string(),
        }
    }

    pub(crate) fn not_configured(field: &'static str) -> Self {
        Self::Validation {
            field,
            reason: "not configured".to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::StoreWrite(_) => ErrorCategory::StoreWriteFailure,
            Self::StoreRead(_) => ErrorCategory::StoreReadFailure,
            Self::LastRelay => ErrorCategory::ConstraintViolation,
            Self::Secret(e) => e.category(),
            Self::Reconnect(_) => ErrorCategory::ReconnectFailure,
        }
    }
}

impl SecretError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::AuthenticationCancelled => ErrorCategory::AuthenticationCancelled,
            Self::AuthenticationFailed => ErrorCategory::AuthenticationFailed,
            Self::NotFound => ErrorCategory::NotFound,
            Self::AlreadyExists => ErrorCategory::ConstraintViolation,
            Self::StorageRead(_) => ErrorCategory::StoreReadFailure,
            Self::StorageWrite(_) => ErrorCategory::StoreWriteFailure,
        }
    }
}

impl FeedError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ClientUnready => ErrorCategory::ClientUnready,
            Self::InvalidIdentity(_) => ErrorCategory::Validation,
            Self::NetworkFetch { .. } => ErrorCategory::NetworkFetchFailure,
        }
    }
}
