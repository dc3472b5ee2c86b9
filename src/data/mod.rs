//! Core data models for ModInfo+
//!
//! This module contains the records exchanged between the cache manager, the
//! watchlist and the notification log: discovered items, per-item release
//! statistics, watch entries and notifications.

pub mod discovery;
pub mod releases;

pub use discovery::{discovery_url, parse_discovery, DiscoveryFilter};
pub use releases::{parse_releases, releases_url};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Downloads value carried by a [`Stats`] record whose fetch failed
pub const DOWNLOADS_UNAVAILABLE: i64 = -1;

/// Description used when the upstream repository has none
pub const NO_DESCRIPTION: &str = "No description";

/// Errors that can occur when decoding an upstream payload
#[derive(Debug, Error)]
pub enum ParseError {
    /// The body was not the JSON shape we expected
    #[error("Failed to parse JSON response: {0}")]
    Json(#[from] serde_json::Error),
}

/// Identity of an item: the (owner, repository) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    /// Account or organisation owning the repository
    pub owner: String,
    /// Repository name
    pub repo: String,
}

impl ItemKey {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Error returned when an `owner/repo` string cannot be split into a key
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid item '{0}': expected owner/repo")]
pub struct InvalidItemKey(pub String);

impl FromStr for ItemKey {
    type Err = InvalidItemKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(2, '/');
        match (parts.next(), parts.next()) {
            (Some(owner), Some(repo))
                if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') =>
            {
                Ok(ItemKey::new(owner, repo))
            }
            _ => Err(InvalidItemKey(s.to_string())),
        }
    }
}

/// A discovered add-on repository
///
/// Everything except `stars` is fixed once fetched; a later discovery
/// fetch replaces the whole record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub owner: String,
    pub repo: String,
    /// Human-readable name shown in listings
    pub name: String,
    pub description: String,
    pub stars: u32,
    /// Canonical web URL of the repository
    pub url: String,
    /// When the discovery fetch that produced this record completed
    pub discovered_at: DateTime<Utc>,
}

impl Item {
    /// Returns the identity of this item
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.owner.clone(), self.repo.clone())
    }

    /// Builds a bare record for an item only known by its identity
    ///
    /// Used when the user names a repository that is not in the current
    /// discovery list.
    pub fn from_key(key: &ItemKey, now: DateTime<Utc>) -> Self {
        Self {
            owner: key.owner.clone(),
            repo: key.repo.clone(),
            name: key.repo.clone(),
            description: NO_DESCRIPTION.to_string(),
            stars: 0,
            url: format!("https://github.com/{}/{}", key.owner, key.repo),
            discovered_at: now,
        }
    }
}

/// Release statistics for one item
///
/// `error == true` always comes with `downloads == DOWNLOADS_UNAVAILABLE`;
/// a successful record always has `downloads >= 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Sum of every asset download across every release
    pub downloads: i64,
    /// Number of releases returned by the upstream API
    pub releases: u32,
    /// `published_at` of the first release in response order
    pub latest_release: Option<DateTime<Utc>>,
    /// `published_at` of the last release in response order
    pub first_release: Option<DateTime<Utc>>,
    /// When these numbers were produced
    pub cached_at: DateTime<Utc>,
    /// Whether the fetch failed
    pub error: bool,
}

impl Stats {
    /// Creates the sentinel record returned when a stats fetch fails
    pub fn unavailable(now: DateTime<Utc>) -> Self {
        Self {
            downloads: DOWNLOADS_UNAVAILABLE,
            releases: 0,
            latest_release: None,
            first_release: None,
            cached_at: now,
            error: true,
        }
    }

    /// Returns the download count, or `None` for a failed fetch
    pub fn download_count(&self) -> Option<u64> {
        if self.error {
            return None;
        }
        u64::try_from(self.downloads).ok()
    }
}

/// An item the user chose to watch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchEntry {
    pub item: Item,
    /// When the user added the item
    pub added_at: DateTime<Utc>,
}

/// Category of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A watched item published a new release
    NewRelease,
    /// A watched item's star count changed
    StarsChanged,
    /// An item appeared in discovery that was not there before
    NewItem,
}

/// A generated event shown in the inbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Stable identifier, assigned by the notification log on append
    pub id: u64,
    pub key: ItemKey,
    /// Display name of the item at the time of the event
    pub item_name: String,
    pub kind: NotificationKind,
    pub message: String,
    pub time: DateTime<Utc>,
    pub read: bool,
}

impl Notification {
    /// Creates an unread notification; the id is assigned on append
    pub fn new(
        item: &Item,
        kind: NotificationKind,
        message: impl Into<String>,
        time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            key: item.key(),
            item_name: item.name.clone(),
            kind,
            message: message.into(),
            time,
            read: false,
        }
    }
}
