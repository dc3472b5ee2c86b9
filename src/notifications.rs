//! Notification log and change detection
//!
//! The log is an append-only, bounded sequence persisted after every
//! mutation. What produces notifications is pluggable: a [`ChangeDetector`]
//! compares consecutive snapshots and returns the events to append.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::data::{Item, ItemKey, Notification, NotificationKind, Stats};
use crate::format::{format_date, format_number};
use crate::store::{self, Store, NOTIFICATIONS_KEY};

/// Default number of notifications kept
pub const DEFAULT_MAX_RETAINED: usize = 50;

/// Bounded, persisted log of notifications in insertion order
pub struct NotificationLog {
    store: Arc<dyn Store>,
    max_retained: usize,
    entries: Vec<Notification>,
}

impl NotificationLog {
    /// Loads the persisted log, trimming it to `max_retained`
    pub fn load(store: Arc<dyn Store>, max_retained: usize) -> Self {
        let entries: Vec<Notification> = store::load_or_default(store.as_ref(), NOTIFICATIONS_KEY);
        let mut log = Self {
            store,
            max_retained: max_retained.max(1),
            entries,
        };
        log.truncate();
        log
    }

    /// Appends a notification, evicting the oldest beyond the bound
    ///
    /// # Returns
    /// The id assigned to the notification
    pub fn append(&mut self, mut notification: Notification) -> u64 {
        let id = self.next_id();
        notification.id = id;
        debug!(id, item = %notification.key, kind = ?notification.kind, "Notification appended");

        self.entries.push(notification);
        self.truncate();
        self.flush();
        id
    }

    /// Marks one notification as read
    ///
    /// # Returns
    /// `false` if no notification has that id
    pub fn mark_read(&mut self, id: u64) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        if !entry.read {
            entry.read = true;
            self.flush();
        }
        true
    }

    pub fn mark_all_read(&mut self) {
        if self.unread_count() == 0 {
            return;
        }
        for entry in &mut self.entries {
            entry.read = true;
        }
        self.flush();
    }

    pub fn unread_count(&self) -> usize {
        self.entries.iter().filter(|n| !n.read).count()
    }

    /// Entries oldest first, as stored
    pub fn entries(&self) -> &[Notification] {
        &self.entries
    }

    /// Entries newest first, for display
    pub fn newest_first(&self) -> impl Iterator<Item = &Notification> {
        self.entries.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn flush(&self) {
        store::persist(self.store.as_ref(), NOTIFICATIONS_KEY, &self.entries);
    }

    fn next_id(&self) -> u64 {
        self.entries.iter().map(|n| n.id).max().map_or(1, |id| id + 1)
    }

    fn truncate(&mut self) {
        if self.entries.len() > self.max_retained {
            let excess = self.entries.len() - self.max_retained;
            self.entries.drain(..excess);
        }
    }
}

/// Two consecutive discovery snapshots and the user's watched set
pub struct SnapshotChange<'a> {
    pub previous: &'a [Item],
    pub current: &'a [Item],
    pub watched: &'a HashSet<ItemKey>,
    pub now: DateTime<Utc>,
}

/// Produces notifications from observed changes
pub trait ChangeDetector: Send + Sync {
    /// Called after a discovery fetch replaced the list
    fn detect(&self, change: &SnapshotChange<'_>) -> Vec<Notification>;

    /// Called after fresh stats were fetched for an item
    fn detect_release(
        &self,
        _item: &Item,
        _previous: Option<&Stats>,
        _current: &Stats,
        _watched: bool,
        _now: DateTime<Utc>,
    ) -> Option<Notification> {
        None
    }
}

/// Detector that never reports anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoChanges;

impl ChangeDetector for NoChanges {
    fn detect(&self, _change: &SnapshotChange<'_>) -> Vec<Notification> {
        Vec::new()
    }
}

/// Diff-based detector
///
/// Reports star changes and new releases for watched items, and items that
/// appear in discovery for the first time. The very first snapshot (empty
/// `previous`) reports nothing, so a fresh install is not flooded.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotDiff;

impl ChangeDetector for SnapshotDiff {
    fn detect(&self, change: &SnapshotChange<'_>) -> Vec<Notification> {
        if change.previous.is_empty() {
            return Vec::new();
        }

        let previous: HashMap<ItemKey, &Item> =
            change.previous.iter().map(|i| (i.key(), i)).collect();

        let mut found = Vec::new();
        for item in change.current {
            let key = item.key();
            match previous.get(&key) {
                None => found.push(Notification::new(
                    item,
                    NotificationKind::NewItem,
                    format!("New in discovery with {} stars", format_number(u64::from(item.stars))),
                    change.now,
                )),
                Some(before) if change.watched.contains(&key) && before.stars != item.stars => {
                    found.push(Notification::new(
                        item,
                        NotificationKind::StarsChanged,
                        format!("Stars changed from {} to {}", before.stars, item.stars),
                        change.now,
                    ))
                }
                Some(_) => {}
            }
        }
        found
    }

    fn detect_release(
        &self,
        item: &Item,
        previous: Option<&Stats>,
        current: &Stats,
        watched: bool,
        now: DateTime<Utc>,
    ) -> Option<Notification> {
        if !watched || current.error {
            return None;
        }
        let before = previous.filter(|p| !p.error)?.latest_release;
        let latest = current.latest_release?;
        if before.is_some_and(|b| b >= latest) {
            return None;
        }
        Some(Notification::new(
            item,
            NotificationKind::NewRelease,
            format!("New release published {}", format_date(Some(latest))),
            now,
        ))
    }
}
