//! Timestamped cache entries

use chrono::{DateTime, Duration, Utc};

/// A cached payload and the moment it was fetched
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub data: T,
    pub fetched_at: DateTime<Utc>,
    /// How long after `fetched_at` the entry may be served without refetching
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T, fetched_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            data,
            fetched_at,
            ttl,
        }
    }

    /// Fresh iff `now - fetched_at < ttl`
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now - self.fetched_at < self.ttl
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.fetched_at
    }
}
