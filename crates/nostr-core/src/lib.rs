//! Shared Nostr protocol functionality for Kashir
//!
//! This crate provides the relay pool handle used by the settings core,
//! the feed event type it returns, and endpoint URL validation.

pub mod endpoint;
pub mod event;
pub mod relay;

// Re-export commonly used types
pub use endpoint::{normalize_mint_url, normalize_relay_url, InvalidEndpoint};
pub use event::{short_id, FeedEvent};
pub use relay::{Deadline, DeadlineShape, RelayClient, RelayHandle, WireDeadline};

// Re-export nostr-sdk for convenience
pub use nostr_sdk;
