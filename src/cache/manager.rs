//! Cache manager for discovery lists and per-item release stats
//!
//! Provides a `CacheManager` that answers "what is the best value we know
//! for X" while keeping calls to the rate-limited API to a minimum. Every
//! failure degrades to the last known data; nothing here returns an error.

use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{CacheEntry, Clock};
use crate::config::Config;
use crate::data::{
    discovery_url, parse_discovery, parse_releases, releases_url, DiscoveryFilter, Item, ItemKey,
    Stats,
};
use crate::remote::{Endpoint, RemoteClient};
use crate::store::{self, Store, DISCOVER_CACHE_KEY, DISCOVER_TIME_KEY};

/// Endpoints, filter and freshness windows used by the cache manager
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub api_base: String,
    pub filter: DiscoveryFilter,
    pub per_page: u32,
    pub discovery_timeout: std::time::Duration,
    pub stats_timeout: std::time::Duration,
    pub discovery_ttl: Duration,
    pub stats_ttl: Duration,
}

impl CacheSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_base: config.api.base_url.clone(),
            filter: DiscoveryFilter {
                topic: config.api.topic.clone(),
                min_stars: config.api.min_stars,
            },
            per_page: config.api.per_page,
            discovery_timeout: config.api.discovery_timeout(),
            stats_timeout: config.api.stats_timeout(),
            discovery_ttl: to_ttl(config.cache.discovery_ttl()),
            stats_ttl: to_ttl(config.cache.stats_ttl()),
        }
    }

    fn discovery_endpoint(&self) -> Endpoint {
        Endpoint::new(
            discovery_url(&self.api_base, &self.filter, self.per_page),
            self.discovery_timeout,
        )
    }

    fn stats_endpoint(&self, key: &ItemKey) -> Endpoint {
        Endpoint::new(releases_url(&self.api_base, key), self.stats_timeout)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

fn to_ttl(ttl: std::time::Duration) -> Duration {
    Duration::from_std(ttl).unwrap_or(Duration::MAX)
}

/// Result of a discovery lookup
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryResult {
    pub items: Vec<Item>,
    /// `false` only when this call performed a successful fetch
    pub from_cache: bool,
}

impl DiscoveryResult {
    fn cached(items: Vec<Item>) -> Self {
        Self {
            items,
            from_cache: true,
        }
    }
}

struct DiscoveryState {
    entry: CacheEntry<Vec<Item>>,
    in_flight: bool,
}

impl DiscoveryState {
    /// An empty list is never fresh: it always warrants a fetch attempt
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        !self.entry.data.is_empty() && self.entry.is_fresh(now)
    }
}

/// Clears the discovery in-flight flag when the fetch ends or is dropped
struct InFlight<'a>(&'a Mutex<DiscoveryState>);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.lock().in_flight = false;
    }
}

type PendingStats = Shared<BoxFuture<'static, Stats>>;

struct Inner {
    remote: Arc<dyn RemoteClient>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    settings: CacheSettings,
    discovery: Mutex<DiscoveryState>,
    stats: Mutex<HashMap<ItemKey, CacheEntry<Stats>>>,
    pending_stats: Mutex<HashMap<ItemKey, PendingStats>>,
}

/// Owns the discovery and stats caches
///
/// Cloning gives another handle to the same caches. Each cache sits behind
/// its own lock, and no lock is held while a request is outstanding, so
/// handles can be used from any task or thread.
#[derive(Clone)]
pub struct CacheManager {
    inner: Arc<Inner>,
}

impl fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheManager")
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl CacheManager {
    /// Creates a cache manager and restores the persisted discovery list
    pub fn new(
        remote: Arc<dyn RemoteClient>,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        settings: CacheSettings,
    ) -> Self {
        let items: Vec<Item> = store::load_or_default(store.as_ref(), DISCOVER_CACHE_KEY);
        let fetched_millis: i64 = store::load_or_default(store.as_ref(), DISCOVER_TIME_KEY);
        let fetched_at =
            DateTime::from_timestamp_millis(fetched_millis).unwrap_or(DateTime::UNIX_EPOCH);

        debug!(
            items = items.len(),
            fetched_at = %fetched_at,
            "Restored discovery cache"
        );

        let discovery = DiscoveryState {
            entry: CacheEntry::new(items, fetched_at, settings.discovery_ttl),
            in_flight: false,
        };

        Self {
            inner: Arc::new(Inner {
                remote,
                store,
                clock,
                settings,
                discovery: Mutex::new(discovery),
                stats: Mutex::new(HashMap::new()),
                pending_stats: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.inner.settings
    }

    /// Returns the discovery list, fetching it if the cache is not fresh
    ///
    /// # Behavior
    /// - Fresh cache: returned as is
    /// - A fetch already in flight: the current (possibly stale or empty)
    ///   list is returned immediately; callers re-invoke to see the result
    /// - Otherwise one request is issued. On success the list is replaced
    ///   wholesale and persisted; on any failure the previous list is
    ///   returned unchanged
    pub async fn get_discovery_list(&self) -> DiscoveryResult {
        let now = self.inner.clock.now();
        {
            let mut state = self.inner.discovery.lock();
            if state.is_fresh(now) {
                debug!(items = state.entry.data.len(), "Discovery cache hit");
                return DiscoveryResult::cached(state.entry.data.clone());
            }
            if state.in_flight {
                debug!("Discovery fetch already in flight, returning last known list");
                return DiscoveryResult::cached(state.entry.data.clone());
            }
            state.in_flight = true;
        }
        let _in_flight = InFlight(&self.inner.discovery);

        let endpoint = self.inner.settings.discovery_endpoint();
        info!(url = %endpoint.url, "Fetching discovery list");

        let fetched = match self.inner.remote.fetch(&endpoint).await {
            Ok(body) => {
                let now = self.inner.clock.now();
                match parse_discovery(&body, &self.inner.settings.filter, now) {
                    Ok(items) => Some(items),
                    Err(e) => {
                        warn!(
                            error = %e,
                            "Discovery response was malformed, keeping previous list"
                        );
                        None
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Discovery fetch failed, keeping previous list");
                None
            }
        };

        let mut state = self.inner.discovery.lock();
        match fetched {
            Some(items) => {
                info!(items = items.len(), "Discovery list updated");
                state.entry = CacheEntry::new(
                    items.clone(),
                    self.inner.clock.now(),
                    self.inner.settings.discovery_ttl,
                );
                self.inner.persist_discovery(&state.entry);
                DiscoveryResult {
                    items,
                    from_cache: false,
                }
            }
            None => DiscoveryResult::cached(state.entry.data.clone()),
        }
    }

    /// Returns release stats for an item, fetching them if not fresh
    ///
    /// Concurrent calls for the same item share one request. A failed fetch
    /// yields an error-flagged record that is not cached, and any earlier
    /// good entry for the item stays in place.
    pub async fn get_stats(&self, item: &Item) -> Stats {
        let key = item.key();
        let now = self.inner.clock.now();

        if let Some(stats) = self.inner.fresh_stats(&key, now) {
            debug!(item = %key, "Stats cache hit");
            return stats;
        }

        let pending = {
            let mut pending = self.inner.pending_stats.lock();
            // A fetch for this key may have landed since the check above
            if let Some(stats) = self.inner.fresh_stats(&key, now) {
                debug!(item = %key, "Stats cache hit after concurrent fetch");
                return stats;
            }
            pending
                .entry(key.clone())
                .or_insert_with(|| {
                    let inner = Arc::clone(&self.inner);
                    async move { inner.fetch_stats(key).await }.boxed().shared()
                })
                .clone()
        };

        pending.await
    }

    /// Returns the last stats fetched for an item, even if stale
    pub fn last_known_stats(&self, key: &ItemKey) -> Option<Stats> {
        self.inner
            .stats
            .lock()
            .get(key)
            .map(|entry| entry.data.clone())
    }

    /// Returns the current discovery list without fetching
    pub fn discovery_snapshot(&self) -> Vec<Item> {
        self.inner.discovery.lock().entry.data.clone()
    }

    /// When the discovery list was last fetched, if ever
    pub fn last_discovery_fetch(&self) -> Option<DateTime<Utc>> {
        let fetched_at = self.inner.discovery.lock().entry.fetched_at;
        (fetched_at != DateTime::UNIX_EPOCH).then_some(fetched_at)
    }

    pub fn is_discovery_in_flight(&self) -> bool {
        self.inner.discovery.lock().in_flight
    }

    /// Drops both caches and the discovery timestamp, in memory and on disk
    ///
    /// A fetch that is already outstanding still lands in the cache when it
    /// completes. Callers reachable from a user action must check the
    /// refresh cooldown first.
    pub fn invalidate_all(&self) {
        {
            let mut state = self.inner.discovery.lock();
            state.entry = CacheEntry::new(
                Vec::new(),
                DateTime::UNIX_EPOCH,
                self.inner.settings.discovery_ttl,
            );
            self.inner.persist_discovery(&state.entry);
        }
        self.inner.stats.lock().clear();
        info!("All caches invalidated");
    }

    /// Writes the discovery cache to the store
    pub fn flush(&self) {
        let state = self.inner.discovery.lock();
        self.inner.persist_discovery(&state.entry);
    }
}

impl Inner {
    /// Lock order is `pending_stats` then `stats`; `fetch_stats` never
    /// holds both.
    fn fresh_stats(&self, key: &ItemKey, now: DateTime<Utc>) -> Option<Stats> {
        self.stats
            .lock()
            .get(key)
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| entry.data.clone())
    }

    fn persist_discovery(&self, entry: &CacheEntry<Vec<Item>>) {
        store::persist(self.store.as_ref(), DISCOVER_CACHE_KEY, &entry.data);
        store::persist(
            self.store.as_ref(),
            DISCOVER_TIME_KEY,
            &entry.fetched_at.timestamp_millis(),
        );
    }

    async fn fetch_stats(self: Arc<Self>, key: ItemKey) -> Stats {
        let endpoint = self.settings.stats_endpoint(&key);
        debug!(item = %key, url = %endpoint.url, "Fetching stats");

        let fetched = match self.remote.fetch(&endpoint).await {
            Ok(body) => match parse_releases(&body, self.clock.now()) {
                Ok(stats) => Some(stats),
                Err(e) => {
                    warn!(item = %key, error = %e, "Releases response was malformed");
                    None
                }
            },
            Err(e) => {
                warn!(item = %key, error = %e, "Stats fetch failed");
                None
            }
        };

        let stats = match fetched {
            Some(stats) => {
                self.stats.lock().insert(
                    key.clone(),
                    CacheEntry::new(stats.clone(), stats.cached_at, self.settings.stats_ttl),
                );
                stats
            }
            None => Stats::unavailable(self.clock.now()),
        };

        self.pending_stats.lock().remove(&key);
        stats
    }
}
