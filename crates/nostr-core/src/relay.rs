//! Relay pool handle: the live connection the settings core reconnects and
//! the feed fetcher reads from.

use anyhow::{Context, Result};
use async_trait::async_trait;
use nostr_sdk::prelude::*;
use parking_lot::RwLock;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::event::FeedEvent;

/// How a fetch deadline is handed to the underlying client.
///
/// Older client builds took a bare millisecond count, newer ones a
/// `{secs, nanos}` duration. Either may be rejected depending on version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineShape {
    Millis,
    Structured,
}

/// A fetch deadline: one wall-clock length plus the shape to send it in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    duration: Duration,
    shape: DeadlineShape,
}

/// Concrete representation of a [`Deadline`] as the client receives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireDeadline {
    Millis(u64),
    Structured { secs: u64, nanos: u32 },
}

impl Deadline {
    pub fn new(duration: Duration, shape: DeadlineShape) -> Self {
        Self { duration, shape }
    }

    pub fn millis(duration: Duration) -> Self {
        Self::new(duration, DeadlineShape::Millis)
    }

    pub fn structured(duration: Duration) -> Self {
        Self::new(duration, DeadlineShape::Structured)
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn shape(&self) -> DeadlineShape {
        self.shape
    }

    /// Translate into the representation for this deadline's shape.
    pub fn to_wire(&self) -> WireDeadline {
        match self.shape {
            DeadlineShape::Millis => {
                WireDeadline::Millis(u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX))
            }
            DeadlineShape::Structured => WireDeadline::Structured {
                secs: self.duration.as_secs(),
                nanos: self.duration.subsec_nanos(),
            },
        }
    }
}

impl WireDeadline {
    /// Decode back into a wall-clock duration. Zero-length deadlines are rejected.
    pub fn to_duration(self) -> Result<Duration> {
        let duration = match self {
            WireDeadline::Millis(ms) => Duration::from_millis(ms),
            WireDeadline::Structured { secs, nanos } => {
                anyhow::ensure!(nanos < 1_000_000_000, "deadline nanos out of range: {nanos}");
                Duration::new(secs, nanos)
            }
        };
        anyhow::ensure!(!duration.is_zero(), "deadline must be non-zero");
        Ok(duration)
    }
}

/// Capability over the process-wide relay connection pool.
///
/// Injected into the settings manager and the feed fetcher so tests can
/// substitute a fake.
#[async_trait]
pub trait RelayHandle: Send + Sync {
    /// Whether the pool has been initialized and can serve fetches.
    fn is_ready(&self) -> bool;

    /// Replace the full endpoint set. Open subscriptions do not survive.
    async fn reconnect_with_relays(&self, relay_urls: &[String]) -> Result<()>;

    /// Fetch events matching `filter`, giving up after `deadline`.
    async fn fetch_events(&self, filter: Filter, deadline: Deadline) -> Result<Vec<FeedEvent>>;
}

/// [`RelayHandle`] backed by a `nostr-sdk` client.
///
/// Starts unready; [`RelayClient::connect`] or a reconnect installs a client.
#[derive(Default)]
pub struct RelayClient {
    client: RwLock<Option<Client>>,
    relays: RwLock<Vec<String>>,
}

impl RelayClient {
    /// A handle with no live client yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a handle and connect it to the given relays.
    pub async fn connect(relay_urls: Vec<String>) -> Result<Self> {
        let handle = Self::new();
        handle.reconnect_with_relays(&relay_urls).await?;
        Ok(handle)
    }

    /// Relay URLs of the current live client.
    pub fn relays(&self) -> Vec<String> {
        self.relays.read().clone()
    }

    fn current(&self) -> Option<Client> {
        self.client.read().clone()
    }
}

async fn build_client(relay_urls: &[String]) -> Result<Client> {
    let client = Client::default();

    for relay_url in relay_urls {
        client
            .add_relay(relay_url.as_str())
            .await
            .with_context(|| format!("Failed to add relay: {}", relay_url))?;
    }

    client.connect().await;
    Ok(client)
}

#[async_trait]
impl RelayHandle for RelayClient {
    fn is_ready(&self) -> bool {
        self.client.read().is_some()
    }

    async fn reconnect_with_relays(&self, relay_urls: &[String]) -> Result<()> {
        anyhow::ensure!(!relay_urls.is_empty(), "Cannot connect with an empty relay set");

        let fresh = build_client(relay_urls).await?;
        let previous = self.client.write().replace(fresh);
        *self.relays.write() = relay_urls.to_vec();

        if let Some(old) = previous {
            old.disconnect().await;
            debug!("Previous relay pool disconnected");
        }

        info!("Relay client connected to {} relay(s)", relay_urls.len());
        Ok(())
    }

    async fn fetch_events(&self, filter: Filter, deadline: Deadline) -> Result<Vec<FeedEvent>> {
        let client = self
            .current()
            .context("Relay client is not connected")?;

        let wire = deadline.to_wire();
        let timeout = wire
            .to_duration()
            .with_context(|| format!("Rejected deadline {wire:?}"))?;
        debug!("Fetching events with deadline {wire:?}");

        let events = tokio::time::timeout(timeout, client.fetch_events(filter, timeout))
            .await
            .context("Timeout fetching events")?
            .inspect_err(|e| warn!("Relay fetch failed: {e}"))
            .context("Failed to fetch events")?;

        Ok(events.into_iter().map(FeedEvent::from).collect())
    }
}
