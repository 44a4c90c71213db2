//! Durable relay and mint configuration.
//!
//! The store is the writer-of-record: the settings manager only ever mirrors
//! what it reads back from here.

pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

pub use sqlite::SqliteConfigStore;

/// Result of a guarded relay removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayRemoval {
    Removed,
    /// Refused: the relay set would become empty.
    LastRelay,
    NotFound,
}

/// Result of a mint removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MintRemoval {
    /// Removed; carries the active mint after the removal.
    Removed { active: Option<String> },
    NotFound,
}

/// Capability over durable key-value storage for relays and mints.
///
/// URLs passed in are already normalized.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Relays in insertion order.
    async fn load_relays(&self) -> Result<Vec<String>>;

    /// Idempotent add.
    async fn add_relay(&self, url: &str) -> Result<()>;

    /// Remove unless it is the last remaining relay.
    async fn remove_relay(&self, url: &str) -> Result<RelayRemoval>;

    /// Mints in insertion order.
    async fn load_mints(&self) -> Result<Vec<String>>;

    async fn load_active_mint(&self) -> Result<Option<String>>;

    /// Idempotent add. The first mint added becomes active.
    async fn add_mint(&self, url: &str) -> Result<()>;

    /// Returns false if the mint is not known.
    async fn set_active_mint(&self, url: &str) -> Result<bool>;

    /// Remove a mint; if it was active, the first remaining mint takes over.
    async fn remove_mint(&self, url: &str) -> Result<MintRemoval>;
}
