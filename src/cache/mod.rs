//! Cache module for remote metadata
//!
//! This module owns the two TTL caches (discovery list and per-item stats),
//! deduplicates concurrent fetches and keeps the discovery list durable via
//! the persistent store. Stale entries are never deleted by age alone; they
//! only stop being served without a refresh attempt.

mod clock;
mod entry;
mod manager;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use manager::{CacheManager, CacheSettings, DiscoveryResult};
