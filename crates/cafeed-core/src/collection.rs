// ── Reactive ordered event list ──
//
// Newest-first list of events with push-based change notification via
// `watch` channels. Backs both the cache and the display list. Every
// mutation runs inside `send_if_modified`, so concurrent writers are
// serialized by the channel lock and subscribers only wake on real changes.

use std::sync::Arc;

use cafeed_api::CaEvent;
use tokio::sync::watch;

pub(crate) type Snapshot = Arc<Vec<Arc<CaEvent>>>;

pub(crate) struct EventCollection {
    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,

    /// Full newest-first snapshot.
    snapshot: watch::Sender<Snapshot>,
}

impl EventCollection {
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self { version, snapshot }
    }

    /// Put `batch` (newest first) in front of the list and cap it at
    /// `max_len`. Returns how many events fell off the tail.
    pub(crate) fn prepend(&self, batch: Vec<Arc<CaEvent>>, max_len: usize) -> usize {
        if batch.is_empty() {
            return 0;
        }
        let mut evicted = 0;
        self.mutate(|events| {
            let mut merged = batch;
            merged.append(events);
            newest_first(&mut merged);
            evicted = cap(&mut merged, max_len);
            *events = merged;
            true
        });
        evicted
    }

    /// Replace the whole list, re-sorting and capping it.
    pub(crate) fn replace(&self, mut events: Vec<Arc<CaEvent>>, max_len: usize) -> usize {
        newest_first(&mut events);
        let evicted = cap(&mut events, max_len);
        self.mutate(|current| {
            *current = events;
            true
        });
        evicted
    }

    /// Drop every event received before `cutoff_ms`. Returns the count removed.
    pub(crate) fn expire_before(&self, cutoff_ms: i64) -> usize {
        let mut removed = 0;
        self.mutate(|events| {
            removed = expire(events, cutoff_ms);
            removed > 0
        });
        removed
    }

    /// Remove all events. Returns `false` if the list was already empty.
    pub(crate) fn clear(&self) -> bool {
        self.mutate(|events| {
            if events.is_empty() {
                return false;
            }
            events.clear();
            true
        })
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.subscribe()
    }

    pub(crate) fn len(&self) -> usize {
        self.snapshot.borrow().len()
    }

    pub(crate) fn version(&self) -> u64 {
        *self.version.borrow()
    }

    fn mutate(&self, apply: impl FnOnce(&mut Vec<Arc<CaEvent>>) -> bool) -> bool {
        let changed = self.snapshot.send_if_modified(|snap| {
            let mut events = snap.as_ref().clone();
            let changed = apply(&mut events);
            if changed {
                *snap = Arc::new(events);
            }
            changed
        });
        if changed {
            self.version.send_modify(|v| *v = v.wrapping_add(1));
        }
        changed
    }
}

/// Sort by `received_at`, newest first. Stable, so ties keep their order.
pub(crate) fn newest_first(events: &mut [Arc<CaEvent>]) {
    events.sort_by(|a, b| b.received_at.cmp(&a.received_at));
}

/// Truncate to `max_len`, returning how many were cut.
pub(crate) fn cap(events: &mut Vec<Arc<CaEvent>>, max_len: usize) -> usize {
    let excess = events.len().saturating_sub(max_len);
    events.truncate(max_len);
    excess
}

/// Remove events older than `cutoff_ms`, returning how many were removed.
pub(crate) fn expire(events: &mut Vec<Arc<CaEvent>>, cutoff_ms: i64) -> usize {
    let before = events.len();
    events.retain(|e| e.received_at >= cutoff_ms);
    before - events.len()
}


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::test_support::{event_at, labels};
    use super::*;

    #[test]
    fn prepend_keeps_newest_first_and_caps() {
        let list = EventCollection::new();
        list.prepend(vec![event_at("A", 1)], 3);
        list.prepend(vec![event_at("B", 2)], 3);
        list.prepend(vec![event_at("C", 3)], 3);
        let evicted = list.prepend(vec![event_at("D", 4)], 3);

        assert_eq!(evicted, 1);
        assert_eq!(labels(&list.snapshot()), ["D", "C", "B"]);
    }

    #[test]
    fn prepend_batch_keeps_batch_order_on_ties() {
        let list = EventCollection::new();
        list.prepend(vec![event_at("old", 5)], 10);
        list.prepend(vec![event_at("y", 5), event_at("x", 5)], 10);
        assert_eq!(labels(&list.snapshot()), ["y", "x", "old"]);
    }

    #[test]
    fn expire_before_removes_only_stale_entries() {
        let list = EventCollection::new();
        list.replace(vec![event_at("old", 10), event_at("new", 100)], 10);

        assert_eq!(list.expire_before(50), 1);
        assert_eq!(labels(&list.snapshot()), ["new"]);
        assert_eq!(list.expire_before(50), 0);
    }

    #[test]
    fn version_only_moves_on_change() {
        let list = EventCollection::new();
        assert!(!list.clear());
        assert_eq!(list.version(), 0);

        list.prepend(vec![event_at("A", 1)], 10);
        assert_eq!(list.version(), 1);
        assert!(list.clear());
        assert_eq!(list.version(), 2);
        assert_eq!(list.len(), 0);
    }

    #[tokio::test]
    async fn subscribers_see_mutations() {
        let list = EventCollection::new();
        let mut rx = list.subscribe();
        list.prepend(vec![event_at("A", 1)], 10);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().len(), 1);
    }
}
