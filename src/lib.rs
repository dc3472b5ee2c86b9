//! ModInfo+ Library
//!
//! Discovery, release stats, watchlist and notifications for Mindustry mods
//! published on GitHub. Remote lookups go through TTL caches that survive
//! restarts; all state is owned by a [`session::Session`].

pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod format;
pub mod logging;
pub mod notifications;
pub mod refresh;
pub mod remote;
pub mod session;
pub mod store;
pub mod watchlist;

#[cfg(test)]
mod test_support;

pub use cache::{CacheManager, Clock, DiscoveryResult, SystemClock};
pub use config::Config;
pub use data::{Item, ItemKey, Notification, Stats, WatchEntry};
pub use session::Session;
