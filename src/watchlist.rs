//! User watchlist
//!
//! A set of items keyed by identity, persisted in full after every change.
//! Membership is purely local state: toggling never touches the network.

use std::sync::Arc;
use tracing::info;

use crate::cache::Clock;
use crate::data::{Item, ItemKey, WatchEntry};
use crate::store::{self, Store, WATCHLIST_KEY};

pub struct Watchlist {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    entries: Vec<WatchEntry>,
}

impl Watchlist {
    /// Loads the persisted watchlist, starting empty if there is none
    pub fn load(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        let entries: Vec<WatchEntry> = store::load_or_default(store.as_ref(), WATCHLIST_KEY);
        Self {
            store,
            clock,
            entries,
        }
    }

    pub fn is_watched(&self, key: &ItemKey) -> bool {
        self.position(key).is_some()
    }

    /// Removes the item if watched, otherwise adds it
    ///
    /// # Returns
    /// Whether the item is watched after the call
    pub fn toggle(&mut self, item: &Item) -> bool {
        let key = item.key();
        let watched = match self.position(&key) {
            Some(index) => {
                self.entries.remove(index);
                info!(item = %key, "Removed from watchlist");
                false
            }
            None => {
                self.entries.push(WatchEntry {
                    item: item.clone(),
                    added_at: self.clock.now(),
                });
                info!(item = %key, "Added to watchlist");
                true
            }
        };
        self.flush();
        watched
    }

    /// Entries in insertion order
    pub fn entries(&self) -> &[WatchEntry] {
        &self.entries
    }

    pub fn get(&self, key: &ItemKey) -> Option<&WatchEntry> {
        self.position(key).map(|index| &self.entries[index])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes the full collection to the store
    pub fn flush(&self) {
        store::persist(self.store.as_ref(), WATCHLIST_KEY, &self.entries);
    }

    fn position(&self, key: &ItemKey) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.item.owner == key.owner && entry.item.repo == key.repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::store::MemoryStore;
    use crate::test_support::{item, start_time};
    use chrono::Duration;

    fn create_watchlist() -> (Watchlist, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(start_time()));
        let watchlist = Watchlist::load(store.clone(), clock.clone());
        (watchlist, store, clock)
    }

    #[test]
    fn test_toggle_adds_with_timestamp() {
        let (mut watchlist, _store, _clock) = create_watchlist();
        let mod_item = item("alice", "BetterMining", 42);

        assert!(watchlist.toggle(&mod_item));
        assert!(watchlist.is_watched(&mod_item.key()));

        let entry = watchlist.get(&mod_item.key()).unwrap();
        assert_eq!(entry.added_at, start_time());
        assert_eq!(entry.item, mod_item);
    }

    #[test]
    fn test_toggle_twice_restores_membership() {
        let (mut watchlist, _store, _clock) = create_watchlist();
        let other = item("bob", "Turrets", 3);
        watchlist.toggle(&other);
        let before: Vec<ItemKey> = watchlist.entries().iter().map(|e| e.item.key()).collect();

        let mod_item = item("alice", "BetterMining", 42);
        assert!(watchlist.toggle(&mod_item));
        assert!(!watchlist.toggle(&mod_item));

        let after: Vec<ItemKey> = watchlist.entries().iter().map(|e| e.item.key()).collect();
        assert_eq!(after, before);
        assert_eq!(watchlist.len(), 1);
    }

    #[test]
    fn test_toggle_matches_by_identity_only() {
        let (mut watchlist, _store, _clock) = create_watchlist();
        watchlist.toggle(&item("alice", "BetterMining", 42));

        // Same identity, refreshed star count
        let refreshed = item("alice", "BetterMining", 99);
        assert!(!watchlist.toggle(&refreshed));
        assert!(watchlist.is_empty());
    }

    #[test]
    fn test_entries_keep_insertion_order() {
        let (mut watchlist, _store, clock) = create_watchlist();
        watchlist.toggle(&item("c", "Third", 1));
        clock.advance(Duration::seconds(1));
        watchlist.toggle(&item("a", "First", 1));
        clock.advance(Duration::seconds(1));
        watchlist.toggle(&item("b", "Second", 1));

        let names: Vec<&str> = watchlist
            .entries()
            .iter()
            .map(|e| e.item.name.as_str())
            .collect();
        assert_eq!(names, vec!["Third", "First", "Second"]);
    }

    #[test]
    fn test_every_toggle_is_persisted() {
        let (mut watchlist, store, clock) = create_watchlist();
        let mod_item = item("alice", "BetterMining", 42);

        watchlist.toggle(&mod_item);
        let reloaded = Watchlist::load(store.clone(), clock.clone());
        assert!(reloaded.is_watched(&mod_item.key()));

        watchlist.toggle(&mod_item);
        let reloaded = Watchlist::load(store, clock);
        assert!(reloaded.is_empty());
    }

    #[test]
    fn test_reload_compares_field_by_field() {
        let (mut watchlist, store, clock) = create_watchlist();
        watchlist.toggle(&item("alice", "BetterMining", 42));
        clock.advance(Duration::minutes(3));
        watchlist.toggle(&item("bob", "Turrets", 3));

        let reloaded = Watchlist::load(store, clock);
        assert_eq!(reloaded.entries(), watchlist.entries());
    }

    #[test]
    fn test_corrupt_store_starts_empty() {
        let store = Arc::new(MemoryStore::new());
        store.put(WATCHLIST_KEY, "not json").unwrap();
        let clock = Arc::new(ManualClock::new(start_time()));

        let watchlist = Watchlist::load(store, clock);
        assert!(watchlist.is_empty());
    }
}
