//! Configuration manager: relays, mints and the recovery secret.
//!
//! Holds an in-memory [`ConfigurationSnapshot`] mirroring the config store
//! and the secret store. Every endpoint mutation is written through to the
//! store first, re-read from the store into the mirror, and only then pushed
//! to the relay pool, so a crash in between leaves durable state ahead of the
//! live connection. Mutations of one resource are serialized.

use nostr_core::{normalize_mint_url, normalize_relay_url, RelayHandle};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{SecretError, SettingsError};
use crate::notice::{Notice, Notifier};
use crate::secret::{RecoverySecret, SecretStore};
use crate::store::{ConfigStore, MintRemoval, RelayRemoval};

/// A known mint and whether it is the active one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintEndpoint {
    pub url: String,
    pub active: bool,
}

/// The manager's mirror of durable configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationSnapshot {
    pub relays: Vec<String>,
    pub mints: Vec<MintEndpoint>,
    pub active_mint: Option<String>,
    pub has_secret: bool,
}

/// Outcome of refreshing one facet of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacetStatus {
    Refreshed,
    /// Refresh failed; the facet was reset to empty/absent.
    Failed(String),
}

/// Per-facet result of [`SettingsManager::activate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    pub secret: FacetStatus,
    pub relays: FacetStatus,
    pub mints: FacetStatus,
}

impl ActivationReport {
    pub fn all_refreshed(&self) -> bool {
        [&self.secret, &self.relays, &self.mints]
            .iter()
            .all(|facet| **facet == FacetStatus::Refreshed)
    }
}

fn mint_endpoints(urls: Vec<String>, active: Option<&str>) -> Vec<MintEndpoint> {
    urls.into_iter()
        .map(|url| MintEndpoint {
            active: Some(url.as_str()) == active,
            url,
        })
        .collect()
}

pub struct SettingsManager {
    store: Arc<dyn ConfigStore>,
    secrets: Arc<dyn SecretStore>,
    relay_handle: Arc<dyn RelayHandle>,
    notifier: Notifier,
    snapshot: RwLock<ConfigurationSnapshot>,
    visible: AtomicBool,
    relay_writes: Mutex<()>,
    mint_writes: Mutex<()>,
}

impl SettingsManager {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        secrets: Arc<dyn SecretStore>,
        relay_handle: Arc<dyn RelayHandle>,
        notifier: Notifier,
    ) -> Self {
        Self {
            store,
            secrets,
            relay_handle,
            notifier,
            snapshot: RwLock::new(ConfigurationSnapshot::default()),
            visible: AtomicBool::new(false),
            relay_writes: Mutex::new(()),
            mint_writes: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> ConfigurationSnapshot {
        self.snapshot.read().clone()
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Lifecycle signal from the owning view.
    ///
    /// Becoming visible refreshes every facet; returns `None` when hidden.
    pub async fn activate(&self, visible: bool) -> Option<ActivationReport> {
        self.visible.store(visible, Ordering::SeqCst);
        if !visible {
            debug!("Settings view hidden; background refresh paused");
            return None;
        }
        Some(self.refresh_all().await)
    }

    /// Refresh secret existence, relays and mints independently.
    ///
    /// A failing facet is logged and reset to empty/absent; the others
    /// still refresh.
    pub async fn refresh_all(&self) -> ActivationReport {
        let (secret, relays, mints) = tokio::join!(
            self.secrets.exists(),
            self.store.load_relays(),
            self.load_mint_state(),
        );

        let mut snap = self.snapshot.write();

        let secret = match secret {
            Ok(exists) => {
                snap.has_secret = exists;
                FacetStatus::Refreshed
            }
            Err(e) => {
                warn!("Failed to check seed phrase existence: {e}");
                snap.has_secret = false;
                FacetStatus::Failed(e.to_string())
            }
        };

        let relays = match relays {
            Ok(relays) => {
                snap.relays = relays;
                FacetStatus::Refreshed
            }
            Err(e) => {
                warn!("Failed to load relays from storage: {e:#}");
                snap.relays.clear();
                FacetStatus::Failed(format!("{e:#}"))
            }
        };

        let mints = match mints {
            Ok((mints, active)) => {
                snap.mints = mints;
                snap.active_mint = active;
                FacetStatus::Refreshed
            }
            Err(e) => {
                warn!("Failed to load mint URLs from storage: {e}");
                snap.mints.clear();
                snap.active_mint = None;
                FacetStatus::Failed(e.to_string())
            }
        };

        ActivationReport {
            secret,
            relays,
            mints,
        }
    }

    /// The mint URL modal closed; its submit may have changed the mint set.
    pub async fn on_mint_modal_closed(&self) {
        if !self.is_visible() {
            return;
        }
        if let Err(e) = self.reload_mints().await {
            warn!("Failed to refresh mints after modal closed: {e}");
        }
    }

    // ── Relays ───────────────────────────────────────────────────

    /// Add a relay and reconnect the pool with the full stored set.
    pub async fn add_relay(&self, input: &str) -> Result<Vec<String>, SettingsError> {
        let result = self.try_add_relay(input).await;
        self.report(&result, "Relay added successfully");
        result
    }

    async fn try_add_relay(&self, input: &str) -> Result<Vec<String>, SettingsError> {
        let url = normalize_relay_url(input)
            .map_err(|e| SettingsError::invalid_endpoint("relay URL", e))?;

        let _guard = self.relay_writes.lock().await;
        self.store
            .add_relay(&url)
            .await
            .map_err(|e| SettingsError::StoreWrite(format!("relay: {e:#}")))?;

        let relays = self.reload_relays().await?;
        info!("Relay added: {url} ({} total)", relays.len());
        self.reconnect(&relays).await?;
        Ok(relays)
    }

    /// Remove a relay unless it is the last one.
    pub async fn remove_relay(&self, input: &str) -> Result<Vec<String>, SettingsError> {
        let result = self.try_remove_relay(input).await;
        self.report(&result, "Relay removed successfully");
        result
    }

    async fn try_remove_relay(&self, input: &str) -> Result<Vec<String>, SettingsError> {
        let url = normalize_relay_url(input)
            .map_err(|e| SettingsError::invalid_endpoint("relay URL", e))?;

        let _guard = self.relay_writes.lock().await;
        let removal = self
            .store
            .remove_relay(&url)
            .await
            .map_err(|e| SettingsError::StoreWrite(format!("relay: {e:#}")))?;

        match removal {
            RelayRemoval::Removed => {}
            RelayRemoval::LastRelay => {
                info!("Refused to remove last relay {url}");
                return Err(SettingsError::LastRelay);
            }
            RelayRemoval::NotFound => return Err(SettingsError::not_configured("relay URL")),
        }

        let relays = self.reload_relays().await?;
        info!("Relay removed: {url} ({} left)", relays.len());
        self.reconnect(&relays).await?;
        Ok(relays)
    }

    async fn reload_relays(&self) -> Result<Vec<String>, SettingsError> {
        let relays = self
            .store
            .load_relays()
            .await
            .map_err(|e| SettingsError::StoreRead(format!("relays: {e:#}")))?;
        self.snapshot.write().relays = relays.clone();
        Ok(relays)
    }

    async fn reconnect(&self, relays: &[String]) -> Result<(), SettingsError> {
        self.relay_handle
            .reconnect_with_relays(relays)
            .await
            .map_err(|e| {
                warn!("Relay reconnect failed: {e:#}");
                SettingsError::Reconnect(format!("{e:#}"))
            })
    }

    // ── Mints ────────────────────────────────────────────────────

    /// Submit from the mint URL modal. The first mint becomes active.
    pub async fn add_mint(&self, input: &str) -> Result<(), SettingsError> {
        let result = self.try_add_mint(input).await;
        self.report(&result, "Mint added successfully");
        result
    }

    async fn try_add_mint(&self, input: &str) -> Result<(), SettingsError> {
        let url = normalize_mint_url(input)
            .map_err(|e| SettingsError::invalid_endpoint("mint URL", e))?;

        let _guard = self.mint_writes.lock().await;
        self.store
            .add_mint(&url)
            .await
            .map_err(|e| SettingsError::StoreWrite(format!("mint: {e:#}")))?;
        self.reload_mints().await?;
        info!("Mint added: {url}");
        Ok(())
    }

    pub async fn set_active_mint(&self, input: &str) -> Result<(), SettingsError> {
        let result = self.try_set_active_mint(input).await;
        self.report(&result, "Active mint updated");
        result
    }

    async fn try_set_active_mint(&self, input: &str) -> Result<(), SettingsError> {
        let url = normalize_mint_url(input)
            .map_err(|e| SettingsError::invalid_endpoint("mint URL", e))?;

        let _guard = self.mint_writes.lock().await;
        let known = self
            .store
            .set_active_mint(&url)
            .await
            .map_err(|e| SettingsError::StoreWrite(format!("active mint: {e:#}")))?;
        if !known {
            return Err(SettingsError::not_configured("mint URL"));
        }
        self.reload_mints().await?;
        info!("Active mint: {url}");
        Ok(())
    }

    /// Remove a mint. Returns the active mint afterwards.
    pub async fn remove_mint(&self, input: &str) -> Result<Option<String>, SettingsError> {
        let result = self.try_remove_mint(input).await;
        self.report(&result, "Mint removed successfully");
        result
    }

    async fn try_remove_mint(&self, input: &str) -> Result<Option<String>, SettingsError> {
        let url = normalize_mint_url(input)
            .map_err(|e| SettingsError::invalid_endpoint("mint URL", e))?;

        let _guard = self.mint_writes.lock().await;
        let removal = self
            .store
            .remove_mint(&url)
            .await
            .map_err(|e| SettingsError::StoreWrite(format!("mint: {e:#}")))?;
        let MintRemoval::Removed { active } = removal else {
            return Err(SettingsError::not_configured("mint URL"));
        };

        self.reload_mints().await?;
        info!("Mint removed: {url} (active: {})", active.as_deref().unwrap_or("none"));
        Ok(active)
    }

    async fn load_mint_state(&self) -> Result<(Vec<MintEndpoint>, Option<String>), SettingsError> {
        let urls = self
            .store
            .load_mints()
            .await
            .map_err(|e| SettingsError::StoreRead(format!("mints: {e:#}")))?;
        let active = self
            .store
            .load_active_mint()
            .await
            .map_err(|e| SettingsError::StoreRead(format!("active mint: {e:#}")))?;
        Ok((mint_endpoints(urls, active.as_deref()), active))
    }

    async fn reload_mints(&self) -> Result<(), SettingsError> {
        let (mints, active) = self.load_mint_state().await?;
        let mut snap = self.snapshot.write();
        snap.mints = mints;
        snap.active_mint = active;
        Ok(())
    }

    // ── Recovery secret ──────────────────────────────────────────

    /// Read the seed phrase for display. The value is never logged.
    pub async fn view_secret(&self) -> Result<RecoverySecret, SettingsError> {
        match self.secrets.read().await {
            Ok(secret) => {
                info!("Seed phrase revealed ({} words)", secret.word_count());
                Ok(secret)
            }
            Err(e) => {
                if e == SecretError::NotFound {
                    self.snapshot.write().has_secret = false;
                }
                let err = SettingsError::from(e);
                self.notifier.emit(Notice::from(&err));
                Err(err)
            }
        }
    }

    /// Delete the seed phrase. Confirmation is the caller's job.
    ///
    /// Returns whether a secret was removed; the existence flag only flips
    /// on success.
    pub async fn delete_secret(&self) -> Result<bool, SettingsError> {
        match self.secrets.delete().await {
            Ok(true) => {
                self.snapshot.write().has_secret = false;
                info!("Seed phrase removed");
                self.notifier
                    .emit(Notice::success("Seed phrase removed from secure storage"));
                Ok(true)
            }
            Ok(false) => {
                warn!("Seed phrase removal reported nothing removed");
                self.notifier.emit(Notice::error(
                    SecretError::NotFound.category(),
                    "Failed to remove seed phrase",
                ));
                Ok(false)
            }
            Err(e) => {
                warn!("Seed phrase removal failed: {e}");
                let err = SettingsError::from(e);
                self.notifier.emit(Notice::error(
                    err.category(),
                    format!("Failed to remove seed phrase: {err}"),
                ));
                Err(err)
            }
        }
    }

    /// Store a seed phrase produced by wallet bootstrap or import.
    pub async fn import_secret(&self, secret: &RecoverySecret) -> Result<(), SettingsError> {
        let result = self
            .secrets
            .store(secret)
            .await
            .map_err(SettingsError::from);
        if result.is_ok() {
            self.snapshot.write().has_secret = true;
            info!("Seed phrase stored ({} words)", secret.word_count());
        }
        self.report(&result, "Seed phrase saved to secure storage");
        result
    }

    fn report<T>(&self, result: &Result<T, SettingsError>, success: &str) {
        match result {
            Ok(_) => self.notifier.emit(Notice::success(success)),
            Err(e) => self.notifier.emit(Notice::from(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::notice::NoticeLevel;
    use crate::store::SqliteConfigStore;
    use anyhow::Result;
    use async_trait::async_trait;
    use nostr_core::nostr_sdk::Filter;
    use nostr_core::{Deadline, FeedEvent};

    #[derive(Default)]
    struct RecordingHandle {
        reconnects: parking_lot::Mutex<Vec<Vec<String>>>,
        fail_reconnect: bool,
    }

    #[async_trait]
    impl RelayHandle for RecordingHandle {
        fn is_ready(&self) -> bool {
            true
        }

        async fn reconnect_with_relays(&self, relay_urls: &[String]) -> Result<()> {
            if self.fail_reconnect {
                anyhow::bail!("pool offline");
            }
            self.reconnects.lock().push(relay_urls.to_vec());
            Ok(())
        }

        async fn fetch_events(&self, _filter: Filter, _deadline: Deadline) -> Result<Vec<FeedEvent>> {
            Ok(vec![])
        }
    }

    #[derive(Default)]
    struct MemorySecrets {
        secret: parking_lot::Mutex<Option<RecoverySecret>>,
        cancel: bool,
    }

    #[async_trait]
    impl SecretStore for MemorySecrets {
        async fn exists(&self) -> Result<bool, SecretError> {
            Ok(self.secret.lock().is_some())
        }

        async fn read(&self) -> Result<RecoverySecret, SecretError> {
            if self.cancel {
                return Err(SecretError::AuthenticationCancelled);
            }
            self.secret.lock().clone().ok_or(SecretError::NotFound)
        }

        async fn delete(&self) -> Result<bool, SecretError> {
            Ok(self.secret.lock().take().is_some())
        }

        async fn store(&self, secret: &RecoverySecret) -> Result<(), SecretError> {
            *self.secret.lock() = Some(secret.clone());
            Ok(())
        }
    }

    /// Store whose reads always fail.
    struct BrokenStore;

    #[async_trait]
    impl ConfigStore for BrokenStore {
        async fn load_relays(&self) -> Result<Vec<String>> {
            anyhow::bail!("disk unavailable")
        }
        async fn add_relay(&self, _url: &str) -> Result<()> {
            anyhow::bail!("disk unavailable")
        }
        async fn remove_relay(&self, _url: &str) -> Result<RelayRemoval> {
            anyhow::bail!("disk unavailable")
        }
        async fn load_mints(&self) -> Result<Vec<String>> {
            anyhow::bail!("disk unavailable")
        }
        async fn load_active_mint(&self) -> Result<Option<String>> {
            anyhow::bail!("disk unavailable")
        }
        async fn add_mint(&self, _url: &str) -> Result<()> {
            anyhow::bail!("disk unavailable")
        }
        async fn set_active_mint(&self, _url: &str) -> Result<bool> {
            anyhow::bail!("disk unavailable")
        }
        async fn remove_mint(&self, _url: &str) -> Result<MintRemoval> {
            anyhow::bail!("disk unavailable")
        }
    }

    struct Fixture {
        manager: SettingsManager,
        handle: Arc<RecordingHandle>,
        secrets: Arc<MemorySecrets>,
    }

    fn fixture(relays: &[&str]) -> Fixture {
        fixture_with(relays, RecordingHandle::default(), MemorySecrets::default())
    }

    fn fixture_with(relays: &[&str], handle: RecordingHandle, secrets: MemorySecrets) -> Fixture {
        let defaults: Vec<String> = relays.iter().map(|r| r.to_string()).collect();
        let store = Arc::new(SqliteConfigStore::open_in_memory(&defaults).unwrap());
        let handle = Arc::new(handle);
        let secrets = Arc::new(secrets);
        let manager = SettingsManager::new(store, secrets.clone(), handle.clone(), Notifier::new());
        Fixture {
            manager,
            handle,
            secrets,
        }
    }

    #[tokio::test]
    async fn activate_loads_all_facets() {
        let f = fixture(&["wss://relay.damus.io"]);
        f.secrets
            .store(&RecoverySecret::new("one two three"))
            .await
            .unwrap();

        let report = f.manager.activate(true).await.unwrap();
        assert!(report.all_refreshed());

        let snap = f.manager.snapshot();
        assert_eq!(snap.relays, vec!["wss://relay.damus.io".to_string()]);
        assert!(snap.has_secret);
        assert!(snap.mints.is_empty());
        assert_eq!(snap.active_mint, None);
    }

    #[tokio::test]
    async fn hidden_view_skips_refresh() {
        let f = fixture(&["wss://relay.damus.io"]);
        assert!(f.manager.activate(false).await.is_none());
        assert!(f.manager.snapshot().relays.is_empty());
        assert!(!f.manager.is_visible());
    }

    #[tokio::test]
    async fn failing_facets_do_not_block_others() {
        let secrets = Arc::new(MemorySecrets::default());
        secrets.store(&RecoverySecret::new("one two")).await.unwrap();
        let manager = SettingsManager::new(
            Arc::new(BrokenStore),
            secrets,
            Arc::new(RecordingHandle::default()),
            Notifier::new(),
        );

        let report = manager.activate(true).await.unwrap();
        assert_eq!(report.secret, FacetStatus::Refreshed);
        assert!(matches!(report.relays, FacetStatus::Failed(_)));
        assert!(matches!(report.mints, FacetStatus::Failed(_)));

        let snap = manager.snapshot();
        assert!(snap.has_secret);
        assert!(snap.relays.is_empty());
        assert!(snap.mints.is_empty());
    }

    #[tokio::test]
    async fn add_relay_mirrors_store_and_reconnects_with_full_set() {
        let f = fixture(&["wss://relay.damus.io"]);
        f.manager.activate(true).await;

        let relays = f.manager.add_relay(" wss://NOS.lol/ ").await.unwrap();
        let expected = vec!["wss://relay.damus.io".to_string(), "wss://nos.lol".to_string()];
        assert_eq!(relays, expected);
        assert_eq!(f.manager.snapshot().relays, expected);
        assert_eq!(*f.handle.reconnects.lock(), vec![expected]);
    }

    #[tokio::test]
    async fn adding_same_relay_twice_keeps_size() {
        let f = fixture(&["wss://relay.damus.io"]);
        f.manager.add_relay("wss://nos.lol").await.unwrap();
        let relays = f.manager.add_relay("wss://nos.lol").await.unwrap();
        assert_eq!(relays.len(), 2);
    }

    #[tokio::test]
    async fn invalid_relay_touches_nothing() {
        let f = fixture(&["wss://relay.damus.io"]);
        f.manager.activate(true).await;
        let mut notices = f.manager.notifier().subscribe();

        let err = f.manager.add_relay("").await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);
        let err = f.manager.add_relay("https://relay.damus.io").await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);

        assert_eq!(f.manager.snapshot().relays.len(), 1);
        assert!(f.handle.reconnects.lock().is_empty());
        assert_eq!(notices.recv().await.unwrap().level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn removing_last_relay_is_refused_without_reconnect() {
        let f = fixture(&["wss://relay.damus.io"]);
        f.manager.activate(true).await;
        let mut notices = f.manager.notifier().subscribe();

        let err = f.manager.remove_relay("wss://relay.damus.io").await.unwrap_err();
        assert_eq!(err, SettingsError::LastRelay);
        assert_eq!(f.manager.snapshot().relays.len(), 1);
        assert!(f.handle.reconnects.lock().is_empty());

        let notice = notices.recv().await.unwrap();
        assert_eq!(notice.message, "Cannot remove the last relay");
        assert_eq!(notice.category, Some(ErrorCategory::ConstraintViolation));
    }

    #[tokio::test]
    async fn remove_relay_reconnects_with_reduced_set() {
        let f = fixture(&["wss://relay.damus.io", "wss://nos.lol"]);
        let relays = f.manager.remove_relay("wss://relay.damus.io").await.unwrap();
        assert_eq!(relays, vec!["wss://nos.lol".to_string()]);
        assert_eq!(*f.handle.reconnects.lock(), vec![relays]);
    }

    #[tokio::test]
    async fn removing_unknown_relay_is_validation_error() {
        let f = fixture(&["wss://relay.damus.io", "wss://nos.lol"]);
        let err = f.manager.remove_relay("wss://unknown.example").await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);
        assert!(f.handle.reconnects.lock().is_empty());
    }

    #[tokio::test]
    async fn reconnect_failure_keeps_durable_state_ahead() {
        let handle = RecordingHandle {
            fail_reconnect: true,
            ..Default::default()
        };
        let f = fixture_with(&["wss://relay.damus.io"], handle, MemorySecrets::default());

        let err = f.manager.add_relay("wss://nos.lol").await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::ReconnectFailure);
        // Mirror follows the store even though the pool lags.
        assert_eq!(f.manager.snapshot().relays.len(), 2);
    }

    /// Handle whose reconnect yields mid-call and tracks overlapping calls.
    #[derive(Default)]
    struct YieldingHandle {
        in_flight: std::sync::atomic::AtomicUsize,
        max_in_flight: std::sync::atomic::AtomicUsize,
        reconnects: parking_lot::Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl RelayHandle for YieldingHandle {
        fn is_ready(&self) -> bool {
            true
        }

        async fn reconnect_with_relays(&self, relay_urls: &[String]) -> Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            for _ in 0..5 {
                tokio::task::yield_now().await;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            self.reconnects.lock().push(relay_urls.to_vec());
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }

        async fn fetch_events(&self, _filter: Filter, _deadline: Deadline) -> Result<Vec<FeedEvent>> {
            Ok(vec![])
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_relay_mutations_are_serialized() {
        let defaults = vec!["wss://a.example".to_string(), "wss://b.example".to_string()];
        let store = Arc::new(SqliteConfigStore::open_in_memory(&defaults).unwrap());
        let handle = Arc::new(YieldingHandle::default());
        let manager = SettingsManager::new(
            store.clone(),
            Arc::new(MemorySecrets::default()),
            handle.clone(),
            Notifier::new(),
        );
        manager.activate(true).await;

        let (added, removed, added_again, removed_again) = tokio::join!(
            manager.add_relay("wss://c.example"),
            manager.remove_relay("wss://a.example"),
            manager.add_relay("wss://d.example"),
            manager.remove_relay("wss://b.example"),
        );
        added.unwrap();
        removed.unwrap();
        added_again.unwrap();
        removed_again.unwrap();

        assert_eq!(handle.max_in_flight.load(Ordering::SeqCst), 1);

        let stored = store.load_relays().await.unwrap();
        assert_eq!(
            stored,
            vec!["wss://c.example".to_string(), "wss://d.example".to_string()]
        );
        let reconnects = handle.reconnects.lock();
        assert_eq!(reconnects.len(), 4);
        assert_eq!(reconnects.last(), Some(&stored));
        assert_eq!(manager.snapshot().relays, stored);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_mint_mutations_keep_one_active() {
        let f = fixture(&["wss://relay.damus.io"]);
        f.manager.activate(true).await;

        let (a, b, c) = tokio::join!(
            f.manager.add_mint("https://mint-a.example"),
            f.manager.add_mint("https://mint-b.example"),
            f.manager.add_mint("https://mint-c.example"),
        );
        a.unwrap();
        b.unwrap();
        c.unwrap();

        let (used, removed) = tokio::join!(
            f.manager.set_active_mint("https://mint-c.example"),
            f.manager.remove_mint("https://mint-a.example"),
        );
        used.unwrap();
        removed.unwrap();

        let snap = f.manager.snapshot();
        assert_eq!(snap.mints.len(), 2);
        assert_eq!(snap.mints.iter().filter(|m| m.active).count(), 1);
        assert_eq!(
            snap.active_mint,
            f.manager.store.load_active_mint().await.unwrap()
        );
    }

    #[tokio::test]
    async fn relay_set_never_empties() {
        let f = fixture(&["wss://a.example"]);
        let ops: [(&str, bool); 6] = [
            ("wss://b.example", true),
            ("wss://a.example", false),
            ("wss://b.example", false),
            ("wss://c.example", true),
            ("wss://c.example", false),
            ("wss://b.example", false),
        ];
        for (url, add) in ops {
            let _ = if add {
                f.manager.add_relay(url).await
            } else {
                f.manager.remove_relay(url).await
            };
            let stored = f.manager.store.load_relays().await.unwrap();
            assert!(!stored.is_empty());
            if !f.handle.reconnects.lock().is_empty() {
                assert_eq!(f.manager.snapshot().relays, stored);
            }
        }
    }

    #[tokio::test]
    async fn mint_lifecycle_keeps_exactly_one_active() {
        let f = fixture(&["wss://relay.damus.io"]);
        f.manager.activate(true).await;

        f.manager.add_mint("https://mint-a.example").await.unwrap();
        f.manager.add_mint("https://mint-b.example").await.unwrap();
        f.manager.add_mint("https://mint-c.example").await.unwrap();

        let assert_single_active = |snap: &ConfigurationSnapshot| {
            let active: Vec<_> = snap.mints.iter().filter(|m| m.active).collect();
            if snap.mints.is_empty() {
                assert!(active.is_empty());
                assert_eq!(snap.active_mint, None);
            } else {
                assert_eq!(active.len(), 1);
                assert_eq!(snap.active_mint.as_deref(), Some(active[0].url.as_str()));
            }
        };

        let snap = f.manager.snapshot();
        assert_single_active(&snap);
        assert_eq!(snap.active_mint.as_deref(), Some("https://mint-a.example"));

        f.manager.set_active_mint("https://mint-c.example").await.unwrap();
        assert_single_active(&f.manager.snapshot());

        let active = f.manager.remove_mint("https://mint-c.example").await.unwrap();
        assert_eq!(active.as_deref(), Some("https://mint-a.example"));
        assert_single_active(&f.manager.snapshot());

        f.manager.remove_mint("https://mint-a.example").await.unwrap();
        f.manager.remove_mint("https://mint-b.example").await.unwrap();
        let snap = f.manager.snapshot();
        assert!(snap.mints.is_empty());
        assert_single_active(&snap);
    }

    #[tokio::test]
    async fn unknown_mint_cannot_be_activated() {
        let f = fixture(&["wss://relay.damus.io"]);
        f.manager.add_mint("https://mint-a.example").await.unwrap();
        let err = f
            .manager
            .set_active_mint("https://mint-z.example")
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);
        assert_eq!(
            f.manager.snapshot().active_mint.as_deref(),
            Some("https://mint-a.example")
        );
    }

    #[tokio::test]
    async fn mint_modal_close_refreshes_only_when_visible() {
        let f = fixture(&["wss://relay.damus.io"]);
        f.manager.store.add_mint("https://mint-a.example").await.unwrap();

        f.manager.on_mint_modal_closed().await;
        assert!(f.manager.snapshot().mints.is_empty());

        f.manager.activate(true).await;
        f.manager.store.add_mint("https://mint-b.example").await.unwrap();
        f.manager.on_mint_modal_closed().await;
        assert_eq!(f.manager.snapshot().mints.len(), 2);
    }

    #[tokio::test]
    async fn view_secret_distinguishes_cancel_and_missing() {
        let f = fixture(&["wss://relay.damus.io"]);
        let err = f.manager.view_secret().await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::NotFound);

        let cancelling = MemorySecrets {
            cancel: true,
            ..Default::default()
        };
        let f = fixture_with(&["wss://relay.damus.io"], RecordingHandle::default(), cancelling);
        f.secrets.store(&RecoverySecret::new("one two")).await.unwrap();
        let err = f.manager.view_secret().await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::AuthenticationCancelled);
    }

    #[tokio::test]
    async fn delete_secret_flips_flag_and_then_view_is_not_found() {
        let f = fixture(&["wss://relay.damus.io"]);
        f.secrets
            .store(&RecoverySecret::new("one two three"))
            .await
            .unwrap();
        f.manager.activate(true).await;
        assert!(f.manager.snapshot().has_secret);

        assert!(f.manager.delete_secret().await.unwrap());
        assert!(!f.manager.snapshot().has_secret);
        assert!(!f.secrets.exists().await.unwrap());
        assert_eq!(
            f.manager.view_secret().await.unwrap_err(),
            SettingsError::Secret(SecretError::NotFound)
        );
    }

    #[tokio::test]
    async fn delete_without_secret_leaves_flag() {
        let f = fixture(&["wss://relay.damus.io"]);
        let mut notices = f.manager.notifier().subscribe();
        assert!(!f.manager.delete_secret().await.unwrap());
        assert_eq!(notices.recv().await.unwrap().message, "Failed to remove seed phrase");
    }
}
