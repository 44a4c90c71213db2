//! Shared fakes for integration tests.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use nostr_core::nostr_sdk::Filter;
use nostr_core::{Deadline, FeedEvent, RelayHandle};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Relay handle that records reconnects and replays scripted fetch results.
#[derive(Default)]
pub struct FakeRelays {
    pub reconnects: Mutex<Vec<Vec<String>>>,
    pub deadlines: Mutex<Vec<Deadline>>,
    fetches: Mutex<VecDeque<Result<Vec<FeedEvent>>>>,
}

impl FakeRelays {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_fetch(&self, result: Result<Vec<FeedEvent>>) {
        self.fetches.lock().push_back(result);
    }

    pub fn last_reconnect(&self) -> Option<Vec<String>> {
        self.reconnects.lock().last().cloned()
    }
}

#[async_trait]
impl RelayHandle for FakeRelays {
    fn is_ready(&self) -> bool {
        true
    }

    async fn reconnect_with_relays(&self, relay_urls: &[String]) -> Result<()> {
        self.reconnects.lock().push(relay_urls.to_vec());
        Ok(())
    }

    async fn fetch_events(&self, _filter: Filter, deadline: Deadline) -> Result<Vec<FeedEvent>> {
        self.deadlines.lock().push(deadline);
        self.fetches
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

pub fn note(id: &str, author: &str, created_at: u64) -> FeedEvent {
    FeedEvent {
        id: id.to_string(),
        author: author.to_string(),
        created_at,
        kind: 1,
        content: format!("note {id}"),
    }
}
