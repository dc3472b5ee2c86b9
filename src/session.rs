//! Owned application state
//!
//! A `Session` is the single owner of the caches, the watchlist and the
//! notification log. It is built once at start-up, handed to the
//! presentation layer, and flushed on shutdown.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::cache::{CacheManager, CacheSettings, Clock, DiscoveryResult, SystemClock};
use crate::config::Config;
use crate::data::{Item, ItemKey, Stats};
use crate::notifications::{ChangeDetector, NotificationLog, SnapshotChange, SnapshotDiff};
use crate::refresh::{can_refresh_now, CooldownStatus, RefreshHandle, RefreshMessage};
use crate::remote::{HttpClient, RemoteClient, RemoteError};
use crate::store::{
    self, FileStore, MemoryStore, Store, LAST_REFRESH_KEY, SEEN_DISCOVERY_KEY, SEEN_RELEASES_KEY,
};
use crate::watchlist::Watchlist;

/// Errors that can occur when opening a session
#[derive(Debug, Error)]
pub enum SessionError {
    /// The HTTP client could not be built from the API settings
    #[error("Failed to create API client: {0}")]
    Client(#[from] RemoteError),
}

pub struct Session {
    cache: CacheManager,
    watchlist: Watchlist,
    notifications: NotificationLog,
    detector: Box<dyn ChangeDetector>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    cooldown: Duration,
    last_user_refresh: Option<DateTime<Utc>>,
    /// Discovery list as last seen by this owner, for change detection.
    /// Persisted on its own so a refresh does not reset the baseline.
    last_seen: Vec<Item>,
    /// Most recent good stats per item, for release detection. Entries for
    /// watched items are persisted.
    seen_stats: HashMap<ItemKey, Stats>,
}

impl Session {
    /// Opens a session with the HTTP client and the on-disk store
    ///
    /// If no data directory can be determined the session runs on an
    /// in-memory store and nothing survives a restart.
    pub fn open(config: &Config) -> Result<Self, SessionError> {
        let remote = Arc::new(HttpClient::from_config(&config.api)?);

        let store: Arc<dyn Store> = match config.data_dir.clone().map(FileStore::with_dir) {
            Some(store) => Arc::new(store),
            None => match FileStore::new() {
                Some(store) => Arc::new(store),
                None => {
                    warn!("No data directory available, state will not be persisted");
                    Arc::new(MemoryStore::new())
                }
            },
        };

        Ok(Self::with_parts(remote, store, Arc::new(SystemClock), config))
    }

    /// Builds a session from explicit collaborators
    pub fn with_parts(
        remote: Arc<dyn RemoteClient>,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        let cache = CacheManager::new(
            remote,
            Arc::clone(&store),
            Arc::clone(&clock),
            CacheSettings::from_config(config),
        );
        let watchlist = Watchlist::load(Arc::clone(&store), Arc::clone(&clock));
        let notifications =
            NotificationLog::load(Arc::clone(&store), config.notifications.max_retained);

        let last_refresh_millis: Option<i64> =
            store::load_or_default(store.as_ref(), LAST_REFRESH_KEY);
        let last_user_refresh = last_refresh_millis.and_then(DateTime::from_timestamp_millis);

        let mut last_seen: Vec<Item> = store::load_or_default(store.as_ref(), SEEN_DISCOVERY_KEY);
        if last_seen.is_empty() {
            last_seen = cache.discovery_snapshot();
        }
        let seen_releases: Vec<(ItemKey, Stats)> =
            store::load_or_default(store.as_ref(), SEEN_RELEASES_KEY);

        Self {
            cache,
            watchlist,
            notifications,
            detector: Box::new(SnapshotDiff),
            store,
            clock,
            cooldown: config.cache.refresh_cooldown(),
            last_user_refresh,
            last_seen,
            seen_stats: seen_releases.into_iter().collect(),
        }
    }

    /// Replaces the change detector
    pub fn with_detector(mut self, detector: Box<dyn ChangeDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn watchlist(&self) -> &Watchlist {
        &self.watchlist
    }

    pub fn notifications(&self) -> &NotificationLog {
        &self.notifications
    }

    pub fn notifications_mut(&mut self) -> &mut NotificationLog {
        &mut self.notifications
    }

    /// Creates a handle for fetching on background tasks
    ///
    /// Results must be passed back through [`Session::apply`].
    pub fn refresh_handle(&self) -> RefreshHandle {
        RefreshHandle::new(self.cache.clone())
    }

    /// Looks up the discovery list and records any detected changes
    pub async fn discover(&mut self) -> DiscoveryResult {
        let result = self.cache.get_discovery_list().await;
        self.apply_discovery(&result);
        result
    }

    /// Looks up stats for an item and records any detected release
    pub async fn stats(&mut self, item: &Item) -> Stats {
        let stats = self.cache.get_stats(item).await;
        self.apply_stats(item, &stats);
        stats
    }

    /// Applies a result delivered by a [`RefreshHandle`]
    pub fn apply(&mut self, message: &RefreshMessage) {
        match message {
            RefreshMessage::DiscoveryLoaded(result) => self.apply_discovery(result),
            RefreshMessage::StatsLoaded { item, stats } => self.apply_stats(item, stats),
        }
    }

    /// Finds the best known record for an identity
    ///
    /// Looks in the discovery list, then the watchlist, and falls back to a
    /// bare record built from the key.
    pub fn resolve(&self, key: &ItemKey) -> Item {
        self.cache
            .discovery_snapshot()
            .into_iter()
            .find(|item| item.key() == *key)
            .or_else(|| self.watchlist.get(key).map(|entry| entry.item.clone()))
            .unwrap_or_else(|| Item::from_key(key, self.clock.now()))
    }

    pub fn is_watched(&self, key: &ItemKey) -> bool {
        self.watchlist.is_watched(key)
    }

    /// Toggles watch state; returns whether the item is now watched
    pub fn toggle_watch(&mut self, item: &Item) -> bool {
        self.watchlist.toggle(item)
    }

    /// Clears every cache if the cooldown allows it
    ///
    /// Watchlist and notifications are left untouched.
    pub fn request_refresh(&mut self) -> CooldownStatus {
        let now = self.clock.now();
        let status = can_refresh_now(self.last_user_refresh, now, self.cooldown);
        if !status.allowed {
            info!(
                seconds_remaining = status.seconds_remaining,
                "Refresh rejected during cooldown"
            );
            return status;
        }

        self.last_user_refresh = Some(now);
        store::persist(
            self.store.as_ref(),
            LAST_REFRESH_KEY,
            &Some(now.timestamp_millis()),
        );
        self.cache.invalidate_all();
        status
    }

    /// Writes all state to the store and ends the session
    pub fn shutdown(self) {
        self.cache.flush();
        self.watchlist.flush();
        self.notifications.flush();
        store::persist(self.store.as_ref(), SEEN_DISCOVERY_KEY, &self.last_seen);
        self.flush_seen_stats();
        info!("Session state flushed");
    }

    fn watched_keys(&self) -> HashSet<ItemKey> {
        self.watchlist
            .entries()
            .iter()
            .map(|entry| entry.item.key())
            .collect()
    }

    fn apply_discovery(&mut self, result: &DiscoveryResult) {
        if result.from_cache {
            return;
        }

        let watched = self.watched_keys();
        let change = SnapshotChange {
            previous: &self.last_seen,
            current: &result.items,
            watched: &watched,
            now: self.clock.now(),
        };
        let found = self.detector.detect(&change);
        for notification in found {
            self.notifications.append(notification);
        }
        self.last_seen = result.items.clone();
        store::persist(self.store.as_ref(), SEEN_DISCOVERY_KEY, &self.last_seen);
    }

    fn apply_stats(&mut self, item: &Item, stats: &Stats) {
        if stats.error {
            return;
        }

        let key = item.key();
        let previous = self.seen_stats.get(&key);
        if previous == Some(stats) {
            return;
        }

        let watched = self.watchlist.is_watched(&key);
        if let Some(notification) =
            self.detector
                .detect_release(item, previous, stats, watched, self.clock.now())
        {
            self.notifications.append(notification);
        }
        self.seen_stats.insert(key, stats.clone());
        if watched {
            self.flush_seen_stats();
        }
    }

    fn flush_seen_stats(&self) {
        let watched: Vec<(&ItemKey, &Stats)> = self
            .seen_stats
            .iter()
            .filter(|(key, _)| self.watchlist.is_watched(key))
            .collect();
        store::persist(self.store.as_ref(), SEEN_RELEASES_KEY, &watched);
    }
}
