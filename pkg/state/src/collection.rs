use pkg_types::event::UpdateEvent;
use pkg_types::meta::{Keyed, ObjectKey};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lifecycle of a collection. Events may be applied in either state; the
/// first `replace_all` moves it to `SnapshotLoaded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Empty,
    SnapshotLoaded,
}

/// What a single `apply` did to the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Inserted,
    Replaced,
    Removed,
    /// DELETED for a key that is not present.
    Ignored,
}

/// Counters kept per collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub events_applied: u64,
    pub resyncs: u64,
    /// Events that were tolerated by a fallback: duplicate ADDED,
    /// MODIFIED or DELETED for an unknown key.
    pub anomalies: u64,
}

/// Immutable handle on the contents of a collection at one revision.
///
/// Later mutations of the collection copy the underlying map instead of
/// touching it, so a view stays stable for as long as it is held.
#[derive(Debug)]
pub struct CollectionView<T> {
    items: Arc<BTreeMap<ObjectKey, T>>,
    revision: u64,
}

impl<T> Clone for CollectionView<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            revision: self.revision,
        }
    }
}

impl<T> CollectionView<T> {
    pub fn get(&self, key: &ObjectKey) -> Option<&T> {
        self.items.get(key)
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}

impl<T: Clone> CollectionView<T> {
    pub fn list(&self) -> Vec<T> {
        self.items.values().cloned().collect()
    }
}

/// Keyed local mirror of one remote collection.
///
/// The only mutation entry points are [`replace_all`](Self::replace_all) and
/// [`apply`](Self::apply). Both are upserts or set-removes, so redelivering
/// an event leaves the collection as it was after the first delivery.
#[derive(Debug)]
pub struct SyncedCollection<T> {
    name: String,
    state: SyncState,
    items: Arc<BTreeMap<ObjectKey, T>>,
    revision: u64,
    stats: SyncStats,
}

impl<T: Clone> SyncedCollection<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: SyncState::Empty,
            items: Arc::new(BTreeMap::new()),
            revision: 0,
            stats: SyncStats::default(),
        }
    }

    /// Rebuild the collection from a full snapshot. Called once per session;
    /// a second call is a forced resync (e.g. after a reconnect).
    pub fn replace_all<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = T>,
        T: Keyed,
    {
        let map: BTreeMap<ObjectKey, T> = items.into_iter().map(|item| (item.key(), item)).collect();
        match self.state {
            SyncState::Empty => {
                info!("{}: snapshot loaded ({} items)", self.name, map.len());
            }
            SyncState::SnapshotLoaded => {
                self.stats.resyncs += 1;
                info!(
                    "{}: forced resync ({} -> {} items)",
                    self.name,
                    self.items.len(),
                    map.len()
                );
            }
        }
        self.items = Arc::new(map);
        self.state = SyncState::SnapshotLoaded;
        self.revision += 1;
    }

    /// Apply one update event.
    pub fn apply(&mut self, event: UpdateEvent<T>) -> ApplyOutcome {
        self.stats.events_applied += 1;
        let items = Arc::make_mut(&mut self.items);

        let outcome = match event {
            UpdateEvent::Added { key, payload } => {
                if items.insert(key.clone(), payload).is_some() {
                    self.stats.anomalies += 1;
                    debug!("{}: duplicate ADDED for {}, overwriting", self.name, key);
                    ApplyOutcome::Replaced
                } else {
                    debug!("{}: ADDED {}", self.name, key);
                    ApplyOutcome::Inserted
                }
            }
            UpdateEvent::Modified { key, payload } => {
                if items.insert(key.clone(), payload).is_some() {
                    debug!("{}: MODIFIED {}", self.name, key);
                    ApplyOutcome::Replaced
                } else {
                    self.stats.anomalies += 1;
                    warn!("{}: MODIFIED for unknown {}, inserting", self.name, key);
                    ApplyOutcome::Inserted
                }
            }
            UpdateEvent::Deleted { key } => {
                if items.remove(&key).is_some() {
                    debug!("{}: DELETED {}", self.name, key);
                    ApplyOutcome::Removed
                } else {
                    self.stats.anomalies += 1;
                    warn!("{}: DELETED for unknown {}, ignoring", self.name, key);
                    ApplyOutcome::Ignored
                }
            }
        };

        if outcome != ApplyOutcome::Ignored {
            self.revision += 1;
        }
        outcome
    }

    /// Snapshot of the current contents.
    pub fn view(&self) -> CollectionView<T> {
        CollectionView {
            items: Arc::clone(&self.items),
            revision: self.revision,
        }
    }

    pub fn list(&self) -> Vec<T> {
        self.items.values().cloned().collect()
    }

    pub fn get(&self, key: &ObjectKey) -> Option<&T> {
        self.items.get(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Incremented on every change to the contents.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        name: String,
        value: u32,
    }

    impl Keyed for Item {
        fn key(&self) -> ObjectKey {
            ObjectKey::new("ns", &self.name)
        }
    }

    fn item(name: &str, value: u32) -> Item {
        Item {
            name: name.to_string(),
            value,
        }
    }

    fn key(name: &str) -> ObjectKey {
        ObjectKey::new("ns", name)
    }

    #[test]
    fn snapshot_then_events() {
        let mut c = SyncedCollection::new("items");
        assert_eq!(c.state(), SyncState::Empty);

        c.replace_all(vec![item("a", 1), item("b", 2)]);
        assert_eq!(c.state(), SyncState::SnapshotLoaded);
        assert_eq!(c.len(), 2);

        assert_eq!(c.apply(UpdateEvent::added(item("c", 3))), ApplyOutcome::Inserted);
        assert_eq!(c.apply(UpdateEvent::modified(item("a", 10))), ApplyOutcome::Replaced);
        assert_eq!(c.apply(UpdateEvent::deleted(key("b"))), ApplyOutcome::Removed);

        assert_eq!(c.list(), vec![item("a", 10), item("c", 3)]);
        assert_eq!(c.get(&key("c")), Some(&item("c", 3)));
        assert_eq!(c.stats().anomalies, 0);
    }

    #[test]
    fn delete_of_unknown_key_is_a_no_op() {
        let mut c = SyncedCollection::new("items");
        c.replace_all(vec![item("a", 1)]);
        let before = c.revision();

        assert_eq!(c.apply(UpdateEvent::deleted(key("x"))), ApplyOutcome::Ignored);
        assert_eq!(c.list(), vec![item("a", 1)]);
        assert_eq!(c.revision(), before);
        assert_eq!(c.stats().anomalies, 1);
    }

    #[test]
    fn duplicate_added_is_an_upsert() {
        let mut once = SyncedCollection::new("once");
        once.apply(UpdateEvent::added(item("a", 1)));

        let mut twice = SyncedCollection::new("twice");
        twice.apply(UpdateEvent::added(item("a", 1)));
        assert_eq!(twice.apply(UpdateEvent::added(item("a", 1))), ApplyOutcome::Replaced);

        assert_eq!(once.list(), twice.list());
    }

    #[test]
    fn modified_for_unknown_key_inserts() {
        let mut ordered = SyncedCollection::new("ordered");
        ordered.apply(UpdateEvent::added(item("a", 1)));
        ordered.apply(UpdateEvent::modified(item("a", 2)));

        let mut modified_only = SyncedCollection::new("modified-only");
        assert_eq!(
            modified_only.apply(UpdateEvent::modified(item("a", 2))),
            ApplyOutcome::Inserted
        );

        assert_eq!(ordered.list(), modified_only.list());
    }

    #[test]
    fn views_are_isolated_from_later_applies() {
        let mut c = SyncedCollection::new("items");
        c.replace_all(vec![item("a", 1)]);
        let view = c.view();

        c.apply(UpdateEvent::modified(item("a", 99)));
        c.apply(UpdateEvent::added(item("b", 2)));

        assert_eq!(view.len(), 1);
        assert_eq!(view.get(&key("a")), Some(&item("a", 1)));
        assert!(view.revision() < c.revision());
        assert_eq!(c.view().get(&key("a")), Some(&item("a", 99)));
    }

    #[test]
    fn second_snapshot_is_a_resync() {
        let mut c = SyncedCollection::new("items");
        c.replace_all(vec![item("a", 1), item("b", 2)]);
        c.replace_all(vec![item("c", 3)]);
        assert_eq!(c.list(), vec![item("c", 3)]);
        assert_eq!(c.stats().resyncs, 1);
    }

    fn arb_event() -> impl Strategy<Value = UpdateEvent<Item>> {
        let name = prop::sample::select(vec!["a", "b", "c", "d"]);
        (0u8..3, name, 0u32..5).prop_map(|(kind, name, value)| match kind {
            0 => UpdateEvent::added(item(name, value)),
            1 => UpdateEvent::modified(item(name, value)),
            _ => UpdateEvent::deleted(key(name)),
        })
    }

    proptest! {
        /// Delivering every event twice in a row ends in the same state as
        /// delivering each once.
        #[test]
        fn redelivery_is_idempotent(events in prop::collection::vec(arb_event(), 0..64)) {
            let mut once = SyncedCollection::new("once");
            let mut twice = SyncedCollection::new("twice");
            for event in events {
                once.apply(event.clone());
                twice.apply(event.clone());
                twice.apply(event);
            }
            prop_assert_eq!(once.list(), twice.list());
        }
    }
}
