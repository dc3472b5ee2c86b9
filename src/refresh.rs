//! Refresh policy and background fetching
//!
//! Network work runs on tokio tasks; results come back to the owner of
//! the UI state over a bounded channel, so shared state is only ever
//! mutated from the context that drains [`RefreshHandle`].

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use crate::cache::{CacheManager, DiscoveryResult};
use crate::data::{Item, Stats};

/// Minimum seconds between user-triggered full invalidations
pub const REFRESH_COOLDOWN_SECS: u64 = 60;

/// Capacity of the channel back to the owner
const CHANNEL_CAPACITY: usize = 32;

/// Outcome of a cooldown check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownStatus {
    pub allowed: bool,
    /// Whole seconds until a refresh is allowed; zero when allowed
    pub seconds_remaining: u64,
}

/// Checks whether a user refresh may run now
///
/// # Arguments
/// * `last_user_refresh` - When the user last refreshed, `None` if never
/// * `now` - Current time
/// * `cooldown` - Required gap between refreshes
pub fn can_refresh_now(
    last_user_refresh: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    cooldown: Duration,
) -> CooldownStatus {
    let Some(last) = last_user_refresh else {
        return CooldownStatus {
            allowed: true,
            seconds_remaining: 0,
        };
    };

    // A clock that went backwards counts as no time elapsed
    let elapsed = u64::try_from((now - last).num_seconds()).unwrap_or(0);
    let cooldown = cooldown.as_secs();

    if elapsed >= cooldown {
        CooldownStatus {
            allowed: true,
            seconds_remaining: 0,
        }
    } else {
        CooldownStatus {
            allowed: false,
            seconds_remaining: cooldown - elapsed,
        }
    }
}

/// Messages sent from background fetches to the owner
#[derive(Debug, Clone)]
pub enum RefreshMessage {
    /// A discovery lookup finished
    DiscoveryLoaded(DiscoveryResult),
    /// A stats lookup finished for an item
    StatsLoaded { item: Item, stats: Stats },
}

/// Handle for dispatching fetches and receiving their results
pub struct RefreshHandle {
    cache: CacheManager,
    sender: mpsc::Sender<RefreshMessage>,
    /// Channel for receiving refresh messages
    pub receiver: mpsc::Receiver<RefreshMessage>,
}

impl RefreshHandle {
    pub fn new(cache: CacheManager) -> Self {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        Self {
            cache,
            sender,
            receiver,
        }
    }

    /// Starts a discovery lookup in the background
    ///
    /// If a fetch is already in flight the task answers immediately with the
    /// last known list.
    pub fn request_discovery(&self) {
        let cache = self.cache.clone();
        let tx = self.sender.clone();
        tokio::spawn(async move {
            let result = cache.get_discovery_list().await;
            if tx.send(RefreshMessage::DiscoveryLoaded(result)).await.is_err() {
                debug!("Owner went away before discovery result was delivered");
            }
        });
    }

    /// Starts a stats lookup for one item in the background
    pub fn request_stats(&self, item: Item) {
        let cache = self.cache.clone();
        let tx = self.sender.clone();
        tokio::spawn(async move {
            let stats = cache.get_stats(&item).await;
            if tx
                .send(RefreshMessage::StatsLoaded { item, stats })
                .await
                .is_err()
            {
                debug!("Owner went away before stats were delivered");
            }
        });
    }

    /// Starts stats lookups for several items, staggered by `spacing`
    ///
    /// Spacing keeps a page of items from bursting the rate limit.
    pub fn request_stats_staggered(&self, items: Vec<Item>, spacing: Duration) {
        for (index, item) in items.into_iter().enumerate() {
            let cache = self.cache.clone();
            let tx = self.sender.clone();
            let delay = spacing.saturating_mul(u32::try_from(index).unwrap_or(u32::MAX));
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let stats = cache.get_stats(&item).await;
                if tx
                    .send(RefreshMessage::StatsLoaded { item, stats })
                    .await
                    .is_err()
                {
                    debug!("Owner went away before staggered stats were delivered");
                }
            });
        }
    }

    /// Waits for the next message
    pub async fn recv(&mut self) -> Option<RefreshMessage> {
        self.receiver.recv().await
    }
}

/// Checks for pending refresh messages without blocking
///
/// # Arguments
/// * `handle` - The RefreshHandle to check
///
/// # Returns
/// * `Some(RefreshMessage)` if a message was available
/// * `None` if no messages are pending
pub fn try_recv(handle: &mut RefreshHandle) -> Option<RefreshMessage> {
    handle.receiver.try_recv().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheSettings, ManualClock};
    use crate::store::MemoryStore;
    use crate::test_support::{item, search_body, start_time, ScriptedRemote};
    use std::sync::Arc;

    fn cooldown() -> Duration {
        Duration::from_secs(REFRESH_COOLDOWN_SECS)
    }

    #[test]
    fn test_first_refresh_is_allowed() {
        let status = can_refresh_now(None, start_time(), cooldown());
        assert!(status.allowed);
        assert_eq!(status.seconds_remaining, 0);
    }

    #[test]
    fn test_refresh_inside_cooldown_reports_remaining() {
        let last = start_time();
        let now = last + chrono::Duration::seconds(15);

        let status = can_refresh_now(Some(last), now, cooldown());
        assert_eq!(
            status,
            CooldownStatus {
                allowed: false,
                seconds_remaining: 45
            }
        );
    }

    #[test]
    fn test_refresh_allowed_once_cooldown_elapsed() {
        let last = start_time();
        let at = |secs| {
            can_refresh_now(Some(last), last + chrono::Duration::seconds(secs), cooldown())
        };
        assert!(at(60).allowed);
        assert!(!at(59).allowed);
    }

    #[test]
    fn test_clock_going_backwards_keeps_cooldown() {
        let last = start_time();
        let earlier = last - chrono::Duration::seconds(30);
        let status = can_refresh_now(Some(last), earlier, cooldown());
        assert!(!status.allowed);
        assert_eq!(status.seconds_remaining, 60);
    }

    fn handle_with(remote: Arc<ScriptedRemote>) -> RefreshHandle {
        let cache = CacheManager::new(
            remote,
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::new(start_time())),
            CacheSettings::default(),
        );
        RefreshHandle::new(cache)
    }

    #[tokio::test]
    async fn test_discovery_result_arrives_on_channel() {
        let remote = Arc::new(ScriptedRemote::new());
        remote.push_ok(search_body(&[("alice", "BetterMining", 42)]));
        let mut handle = handle_with(remote);

        handle.request_discovery();

        match handle.recv().await {
            Some(RefreshMessage::DiscoveryLoaded(result)) => {
                assert!(!result.from_cache);
                assert_eq!(result.items.len(), 1);
            }
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stats_result_arrives_on_channel() {
        let remote = Arc::new(ScriptedRemote::new());
        remote.push_ok(r#"[{"assets": [{"download_count": 4}]}]"#);
        let mut handle = handle_with(remote);

        handle.request_stats(item("alice", "BetterMining", 42));

        match handle.recv().await {
            Some(RefreshMessage::StatsLoaded { item, stats }) => {
                assert_eq!(item.repo, "BetterMining");
                assert_eq!(stats.downloads, 4);
            }
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_staggered_stats_deliver_every_item() {
        let remote = Arc::new(ScriptedRemote::new());
        remote.push_ok("[]");
        remote.push_ok("[]");
        let mut handle = handle_with(remote.clone());

        handle.request_stats_staggered(
            vec![item("a", "One", 1), item("b", "Two", 1)],
            Duration::from_millis(1),
        );

        let mut received = 0;
        while received < 2 {
            if let Some(RefreshMessage::StatsLoaded { .. }) = handle.recv().await {
                received += 1;
            }
        }
        assert_eq!(remote.calls(), 2);
    }

    #[tokio::test]
    async fn test_staggered_stats_finish_after_owner_goes_away() {
        let remote = Arc::new(ScriptedRemote::new());
        remote.push_ok("[]");
        remote.push_ok("[]");
        let handle = handle_with(remote.clone());

        handle.request_stats_staggered(
            vec![item("a", "One", 1), item("b", "Two", 1)],
            Duration::from_millis(1),
        );
        drop(handle);

        while remote.calls() < 2 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        // Let the send on the closed channel run
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(remote.calls(), 2);
    }

    #[tokio::test]
    async fn test_try_recv_empty_without_requests() {
        let mut handle = handle_with(Arc::new(ScriptedRemote::new()));
        assert!(try_recv(&mut handle).is_none());
    }
}
