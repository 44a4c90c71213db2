//! Feed events as the settings core sees them.

use nostr_sdk::Event;
use serde::{Deserialize, Serialize};

/// An immutable, authored, timestamped note pulled from relays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEvent {
    /// Hex event id.
    pub id: String,
    /// Hex public key of the author.
    pub author: String,
    /// Creation time, seconds since the Unix epoch.
    pub created_at: u64,
    pub kind: u16,
    pub content: String,
}

impl From<Event> for FeedEvent {
    fn from(event: Event) -> Self {
        Self::from(&event)
    }
}

impl From<&Event> for FeedEvent {
    fn from(event: &Event) -> Self {
        Self {
            id: event.id.to_hex(),
            author: event.pubkey.to_hex(),
            created_at: event.created_at.as_secs(),
            kind: event.kind.as_u16(),
            content: event.content.clone(),
        }
    }
}

/// Shorten an npub or hex id for one-line display.
///
/// Cuts on a char boundary, so arbitrary user input is safe.
pub fn short_id(id: &str) -> &str {
    let keep = if id.starts_with("npub1") { 16 } else { 12 };
    match id.char_indices().nth(keep) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}
