//! Custody of the single recovery secret (seed phrase).

pub mod encrypted_file;

use async_trait::async_trait;
use std::fmt;

use crate::error::SecretError;

pub use encrypted_file::{EncryptedFileSecretStore, KdfParams};

/// The wallet's recovery mnemonic.
///
/// `Debug` is redacted so the phrase cannot leak through a log line.
#[derive(Clone, PartialEq, Eq)]
pub struct RecoverySecret(String);

impl RecoverySecret {
    pub fn new(phrase: impl Into<String>) -> Self {
        Self(phrase.into())
    }

    /// The phrase itself, for display or clipboard copy.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn word_count(&self) -> usize {
        self.0.split_whitespace().count()
    }
}

impl fmt::Debug for RecoverySecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecoverySecret({} words, redacted)", self.word_count())
    }
}

/// Capability over secure, authenticated storage for one recovery secret.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn exists(&self) -> Result<bool, SecretError>;

    async fn read(&self) -> Result<RecoverySecret, SecretError>;

    /// True iff a secret was actually removed.
    async fn delete(&self) -> Result<bool, SecretError>;

    /// Store the secret created by wallet bootstrap or import.
    async fn store(&self, secret: &RecoverySecret) -> Result<(), SecretError>;
}

/// The gate in front of the secret store.
///
/// Returns the passphrase, or `None` when the user declines.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn passphrase(&self, purpose: &str) -> Option<String>;
}

/// Authenticator with a fixed passphrase, e.g. from `KASHIR_PASSPHRASE`.
pub struct StaticPassphrase(String);

impl StaticPassphrase {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self(passphrase.into())
    }

    pub fn from_env(var: &str) -> Option<Self> {
        std::env::var(var).ok().filter(|v| !v.is_empty()).map(Self)
    }
}

#[async_trait]
impl Authenticator for StaticPassphrase {
    async fn passphrase(&self, _purpose: &str) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Authenticator that always declines.
pub struct Declined;

#[async_trait]
impl Authenticator for Declined {
    async fn passphrase(&self, _purpose: &str) -> Option<String> {
        None
    }
}
