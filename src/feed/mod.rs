//! Resilient feed fetcher.
//!
//! Fetches a user's text notes through the injected relay handle. The first
//! attempt uses a millisecond deadline; if it fails for any reason, one more
//! attempt is made with the same duration expressed as a structured
//! `{secs, nanos}` deadline. Results are never merged across attempts.

use nostr_core::nostr_sdk::{Filter, Kind, PublicKey};
use nostr_core::{short_id, Deadline, FeedEvent, RelayHandle};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::FeedError;
use crate::notice::{Notice, Notifier};

const EMPTY_FEED_TITLE: &str = "No posts found";
const EMPTY_FEED_GUIDANCE: &str = "This could be because:\n\
1. You have no posts yet\n\
2. The relays might not have your data\n\
3. The connection might be slow\n\n\
Try refreshing in a few seconds.";

/// Deadline and size of each fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedSettings {
    pub timeout: Duration,
    pub limit: usize,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(30_000),
            limit: 50,
        }
    }
}

/// Where the fetcher is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Idle,
    Fetching,
    Succeeded,
    EmptyResult,
    Failed,
}

/// A completed fetch that was not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Newest first.
    Succeeded(Vec<FeedEvent>),
    EmptyResult,
}

/// Clears the loading flag however the fetch ends.
struct LoadingGuard<'a>(&'a AtomicBool);

impl<'a> LoadingGuard<'a> {
    fn start(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct FeedFetcher {
    handle: Arc<dyn RelayHandle>,
    settings: FeedSettings,
    notifier: Notifier,
    posts: RwLock<Vec<FeedEvent>>,
    loading: AtomicBool,
    state: RwLock<FetchState>,
}

impl FeedFetcher {
    pub fn new(handle: Arc<dyn RelayHandle>, settings: FeedSettings, notifier: Notifier) -> Self {
        Self {
            handle,
            settings,
            notifier,
            posts: RwLock::new(Vec::new()),
            loading: AtomicBool::new(false),
            state: RwLock::new(FetchState::Idle),
        }
    }

    pub fn posts(&self) -> Vec<FeedEvent> {
        self.posts.read().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> FetchState {
        *self.state.read()
    }

    pub fn settings(&self) -> FeedSettings {
        self.settings
    }

    /// Fetch the text notes authored by `identity` (npub or hex).
    pub async fn fetch_posts(&self, identity: &str) -> Result<FetchOutcome, FeedError> {
        let identity = identity.trim();
        if !self.handle.is_ready() {
            let err = FeedError::ClientUnready;
            self.notifier.emit(Notice::from(&err));
            return Err(err);
        }

        let _loading = LoadingGuard::start(&self.loading);
        self.posts.write().clear();
        self.set_state(FetchState::Fetching);

        let author = match PublicKey::parse(identity) {
            Ok(pk) => pk,
            Err(e) => {
                let err = FeedError::InvalidIdentity(e.to_string());
                self.fail(&err);
                return Err(err);
            }
        };

        let author_hex = author.to_hex();
        let filter = Filter::new()
            .author(author)
            .kind(Kind::TextNote)
            .limit(self.settings.limit);

        let mut events = match self.fetch_with_fallback(filter).await {
            Ok(events) => events,
            Err(err) => {
                self.fail(&err);
                return Err(err);
            }
        };

        if events.is_empty() {
            info!("No posts for {}", short_id(&author_hex));
            self.set_state(FetchState::EmptyResult);
            self.notifier
                .emit(Notice::info(EMPTY_FEED_TITLE, EMPTY_FEED_GUIDANCE));
            return Ok(FetchOutcome::EmptyResult);
        }

        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        info!("Fetched {} posts for {}", events.len(), short_id(&author_hex));
        *self.posts.write() = events.clone();
        self.set_state(FetchState::Succeeded);
        Ok(FetchOutcome::Succeeded(events))
    }

    async fn fetch_with_fallback(&self, filter: Filter) -> Result<Vec<FeedEvent>, FeedError> {
        let primary = Deadline::millis(self.settings.timeout);
        let primary_err = match self.handle.fetch_events(filter.clone(), primary).await {
            Ok(events) => return Ok(events),
            Err(e) => e,
        };
        warn!("Primary feed fetch failed, retrying with structured deadline: {primary_err:#}");

        let fallback = Deadline::structured(self.settings.timeout);
        self.handle
            .fetch_events(filter, fallback)
            .await
            .map_err(|e| {
                warn!("Fallback feed fetch failed: {e:#}");
                FeedError::NetworkFetch {
                    primary: format!("{primary_err:#}"),
                    fallback: format!("{e:#}"),
                }
            })
    }

    fn fail(&self, err: &FeedError) {
        self.posts.write().clear();
        self.set_state(FetchState::Failed);
        self.notifier.emit(Notice::from(err));
    }

    fn set_state(&self, state: FetchState) {
        debug!("Feed state: {state:?}");
        *self.state.write() = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::notice::NoticeLevel;
    use anyhow::Result;
    use async_trait::async_trait;
    use nostr_core::DeadlineShape;
    use std::collections::VecDeque;

    const NPUB_HEX: &str = "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

    /// Replays scripted fetch results and records the deadlines it saw.
    #[derive(Default)]
    struct ScriptedHandle {
        unready: bool,
        script: parking_lot::Mutex<VecDeque<Result<Vec<FeedEvent>>>>,
        deadlines: parking_lot::Mutex<Vec<Deadline>>,
    }

    impl ScriptedHandle {
        fn with(script: Vec<Result<Vec<FeedEvent>>>) -> Self {
            Self {
                script: parking_lot::Mutex::new(script.into()),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl RelayHandle for ScriptedHandle {
        fn is_ready(&self) -> bool {
            !self.unready
        }

        async fn reconnect_with_relays(&self, _relay_urls: &[String]) -> Result<()> {
            Ok(())
        }

        async fn fetch_events(&self, _filter: Filter, deadline: Deadline) -> Result<Vec<FeedEvent>> {
            self.deadlines.lock().push(deadline);
            self.script
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted response")))
        }
    }

    fn event(id: &str, created_at: u64) -> FeedEvent {
        FeedEvent {
            id: id.to_string(),
            author: NPUB_HEX.to_string(),
            created_at,
            kind: 1,
            content: format!("note {id}"),
        }
    }

    fn fetcher(handle: Arc<ScriptedHandle>) -> FeedFetcher {
        FeedFetcher::new(handle, FeedSettings::default(), Notifier::new())
    }

    #[tokio::test]
    async fn primary_success_skips_fallback_and_sorts() {
        let handle = Arc::new(ScriptedHandle::with(vec![Ok(vec![
            event("a", 100),
            event("b", 300),
            event("c", 200),
        ])]));
        let fetcher = fetcher(handle.clone());

        let outcome = fetcher.fetch_posts(NPUB_HEX).await.unwrap();
        let FetchOutcome::Succeeded(posts) = outcome else {
            panic!("expected posts");
        };
        let order: Vec<_> = posts.iter().map(|p| p.created_at).collect();
        assert_eq!(order, vec![300, 200, 100]);
        assert_eq!(handle.deadlines.lock().len(), 1);
        assert_eq!(fetcher.state(), FetchState::Succeeded);
        assert!(!fetcher.is_loading());
    }

    #[tokio::test]
    async fn fallback_uses_structured_deadline_of_same_length() {
        let handle = Arc::new(ScriptedHandle::with(vec![
            Err(anyhow::anyhow!("timeout type mismatch")),
            Ok(vec![event("a", 1), event("b", 3), event("c", 2)]),
        ]));
        let fetcher = fetcher(handle.clone());

        let outcome = fetcher.fetch_posts(NPUB_HEX).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Succeeded(ref p) if p.len() == 3));
        assert_eq!(fetcher.posts()[0].created_at, 3);

        let deadlines = handle.deadlines.lock();
        assert_eq!(deadlines.len(), 2);
        assert_eq!(deadlines[0].shape(), DeadlineShape::Millis);
        assert_eq!(deadlines[1].shape(), DeadlineShape::Structured);
        assert_eq!(deadlines[0].duration(), deadlines[1].duration());
        assert_eq!(deadlines[1].duration(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn ties_keep_fetch_order() {
        let handle = Arc::new(ScriptedHandle::with(vec![Ok(vec![
            event("first", 10),
            event("second", 10),
            event("newest", 20),
        ])]));
        let fetcher = fetcher(handle);
        fetcher.fetch_posts(NPUB_HEX).await.unwrap();

        let ids: Vec<_> = fetcher.posts().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["newest", "first", "second"]);
    }

    #[tokio::test]
    async fn both_attempts_failing_leaves_posts_empty() {
        let handle = Arc::new(ScriptedHandle::with(vec![
            Err(anyhow::anyhow!("first")),
            Err(anyhow::anyhow!("second")),
        ]));
        let fetcher = fetcher(handle);
        let mut notices = fetcher.notifier.subscribe();

        let err = fetcher.fetch_posts(NPUB_HEX).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::NetworkFetchFailure);
        assert!(fetcher.posts().is_empty());
        assert!(!fetcher.is_loading());
        assert_eq!(fetcher.state(), FetchState::Failed);

        let notice = notices.recv().await.unwrap();
        assert!(notice.message.contains("second"));
        assert!(notice.message.ends_with("Please try again."));
    }

    #[tokio::test]
    async fn empty_result_is_not_a_failure() {
        let handle = Arc::new(ScriptedHandle::with(vec![Ok(vec![])]));
        let fetcher = fetcher(handle.clone());
        let mut notices = fetcher.notifier.subscribe();

        let outcome = fetcher.fetch_posts(NPUB_HEX).await.unwrap();
        assert_eq!(outcome, FetchOutcome::EmptyResult);
        assert_eq!(fetcher.state(), FetchState::EmptyResult);
        assert_eq!(handle.deadlines.lock().len(), 1);

        let notice = notices.recv().await.unwrap();
        assert_eq!(notice.level, NoticeLevel::Info);
        assert_eq!(notice.title, "No posts found");
        assert!(notice.message.contains("Try refreshing"));
    }

    #[tokio::test]
    async fn unready_client_is_refused_before_loading() {
        let handle = Arc::new(ScriptedHandle {
            unready: true,
            ..Default::default()
        });
        let fetcher = fetcher(handle.clone());

        let err = fetcher.fetch_posts(NPUB_HEX).await.unwrap_err();
        assert_eq!(err, FeedError::ClientUnready);
        assert_eq!(fetcher.state(), FetchState::Idle);
        assert!(handle.deadlines.lock().is_empty());
    }

    #[tokio::test]
    async fn identity_with_unicode_padding_is_accepted() {
        let padded = format!("{}\u{3000}{NPUB_HEX}\u{a0}", "\u{a0}".repeat(5));

        let handle = Arc::new(ScriptedHandle::with(vec![
            Ok(vec![event("a", 1)]),
            Ok(vec![]),
        ]));
        let fetcher = fetcher(handle.clone());

        let outcome = fetcher.fetch_posts(&padded).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Succeeded(ref p) if p.len() == 1));

        let outcome = fetcher.fetch_posts(&padded).await.unwrap();
        assert_eq!(outcome, FetchOutcome::EmptyResult);
        assert_eq!(handle.deadlines.lock().len(), 2);
    }

    #[tokio::test]
    async fn invalid_identity_fails_without_fetching() {
        let handle = Arc::new(ScriptedHandle::default());
        let fetcher = fetcher(handle.clone());

        let err = fetcher.fetch_posts("not-a-key").await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);
        assert_eq!(fetcher.state(), FetchState::Failed);
        assert!(handle.deadlines.lock().is_empty());
    }

    #[tokio::test]
    async fn new_fetch_clears_previous_posts_on_failure() {
        let handle = Arc::new(ScriptedHandle::with(vec![
            Ok(vec![event("a", 1)]),
            Err(anyhow::anyhow!("down")),
            Err(anyhow::anyhow!("still down")),
        ]));
        let fetcher = fetcher(handle);
        fetcher.fetch_posts(NPUB_HEX).await.unwrap();
        assert_eq!(fetcher.posts().len(), 1);

        fetcher.fetch_posts(NPUB_HEX).await.unwrap_err();
        assert!(fetcher.posts().is_empty());
    }
}
