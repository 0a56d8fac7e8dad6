//! Deadline-ordered queue with removal by id.
//!
//! Entries are ordered by `(deadline, insertion sequence)`, so entries that
//! share a deadline come out in the order they went in. Each entry gets an
//! [`EntryId`] that stays valid until the entry is popped or removed, which
//! is what cancellation handles hold on to instead of the payload itself.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

/// Stable identifier of a queued entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

type Key = (Instant, u64);

/// Entries ordered by deadline, addressable by [`EntryId`].
#[derive(Debug)]
pub struct DelayQueue<T> {
    entries: BTreeMap<Key, (EntryId, T)>,
    index: HashMap<EntryId, Key>,
    next_seq: u64,
    next_id: u64,
}

impl<T> DelayQueue<T> {
    /// Empty queue.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            index: HashMap::new(),
            next_seq: 0,
            next_id: 0,
        }
    }

    /// Add `value` due at `deadline`.
    pub fn insert(&mut self, deadline: Instant, value: T) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        self.insert_with_id(id, deadline, value);
        id
    }

    /// Put a popped entry back under its old id. Repeating timers use this
    /// so a handle taken at registration keeps addressing every occurrence.
    pub fn reinsert(&mut self, id: EntryId, deadline: Instant, value: T) {
        self.insert_with_id(id, deadline, value);
    }

    fn insert_with_id(&mut self, id: EntryId, deadline: Instant, value: T) {
        if let Some(old) = self.index.remove(&id) {
            self.entries.remove(&old);
        }

        let key = (deadline, self.next_seq);
        self.next_seq += 1;
        self.entries.insert(key, (id, value));
        self.index.insert(id, key);
    }

    /// Take an entry out by id.
    pub fn remove(&mut self, id: EntryId) -> Option<T> {
        let key = self.index.remove(&id)?;
        self.entries.remove(&key).map(|(_, value)| value)
    }

    /// Whether `id` is still queued.
    pub fn contains(&self, id: EntryId) -> bool {
        self.index.contains_key(&id)
    }

    /// Deadline of the earliest entry.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Pop the earliest entry if its deadline is not after `now`.
    pub fn pop_expired(&mut self, now: Instant) -> Option<(EntryId, Instant, T)> {
        let key = *self.entries.keys().next()?;
        if key.0 > now {
            return None;
        }

        let (id, value) = self.entries.remove(&key)?;
        self.index.remove(&id);
        Some((id, key.0, value))
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    /// Number of queued entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for DelayQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_pops_in_deadline_order() {
        let now = Instant::now();
        let mut queue = DelayQueue::new();
        queue.insert(now + Duration::from_millis(30), "c");
        queue.insert(now + Duration::from_millis(10), "a");
        queue.insert(now + Duration::from_millis(20), "b");

        let later = now + Duration::from_millis(50);
        let order: Vec<_> = std::iter::from_fn(|| queue.pop_expired(later))
            .map(|(_, _, v)| v)
            .collect();

        assert_eq!(order, vec!["a", "b", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_fifo_at_equal_deadline() {
        let now = Instant::now();
        let mut queue = DelayQueue::new();
        for i in 0..5 {
            queue.insert(now, i);
        }

        let order: Vec<_> = std::iter::from_fn(|| queue.pop_expired(now))
            .map(|(_, _, v)| v)
            .collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_not_expired_stays_queued() {
        let now = Instant::now();
        let mut queue = DelayQueue::new();
        queue.insert(now + Duration::from_secs(5), ());

        assert!(queue.pop_expired(now).is_none());
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.next_deadline(), Some(now + Duration::from_secs(5)));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let now = Instant::now();
        let mut queue = DelayQueue::new();
        let id = queue.insert(now, 7);

        assert!(queue.contains(id));
        assert_eq!(queue.remove(id), Some(7));
        assert_eq!(queue.remove(id), None);
        assert!(!queue.contains(id));
        assert!(queue.pop_expired(now).is_none());
    }

    #[test]
    fn test_reinsert_keeps_id() {
        let now = Instant::now();
        let mut queue = DelayQueue::new();
        let id = queue.insert(now, 1);

        let (popped, _, value) = queue.pop_expired(now).unwrap();
        assert_eq!(popped, id);

        queue.reinsert(id, now + Duration::from_millis(5), value + 1);
        assert!(queue.contains(id));
        assert_eq!(queue.remove(id), Some(2));
    }
}
