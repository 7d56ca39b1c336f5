//! Top-level keyspace: key -> tagged entry, with optional TTL heap linkage.
//!
//! Entries live in an arena; the hash index and the TTL heap both hold entry ids, and each
//! entry stores its own heap position so a TTL can be cancelled or rescheduled in O(log n).
//! The store is clock-free: every TTL operation takes `now_ms` from the caller.

use crate::arena::{Arena, SlotId};
use crate::hash::{fnv1a_hash, HashIndex};
use crate::heap::BackPointerHeap;
use crate::reclaim::DeferredReclaimer;
use crate::zset::SortedSet;

/// Handle to one keyspace entry.
pub type EntryId = SlotId;

/// Entry payload. The tag is fixed at creation; commands never convert between types.
#[derive(Debug)]
pub enum Value {
    /// Plain byte-string value.
    Str(Vec<u8>),
    /// Sorted-set value.
    Sorted(SortedSet),
}

/// One keyed entry, optionally linked into the TTL heap.
#[derive(Debug)]
pub struct Entry {
    /// Owning key bytes.
    pub key: Vec<u8>,
    /// Tagged payload.
    pub value: Value,
    heap_pos: Option<usize>,
}

/// The process keyspace.
#[derive(Debug)]
pub struct KeyspaceStore {
    entries: Arena<Entry>,
    index: HashIndex<EntryId>,
    ttl: BackPointerHeap<EntryId>,
    reclaimer: DeferredReclaimer,
    large_set_threshold: usize,
}

impl KeyspaceStore {
    /// Creates an empty keyspace with its destructor pool.
    #[must_use]
    pub fn new(large_set_threshold: usize, reclaim_threads: usize) -> Self {
        Self {
            entries: Arena::new(),
            index: HashIndex::new(),
            ttl: BackPointerHeap::new(),
            reclaimer: DeferredReclaimer::new(reclaim_threads),
            large_set_threshold,
        }
    }

    /// Number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the keyspace holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Finds the entry for `key`.
    pub fn find(&mut self, key: &[u8]) -> Option<EntryId> {
        let entries = &self.entries;
        self.index
            .lookup(fnv1a_hash(key), |&id| entries.get(id).key == key)
            .copied()
    }

    /// Shared access to an entry.
    #[must_use]
    pub fn entry(&self, id: EntryId) -> &Entry {
        self.entries.get(id)
    }

    /// Mutable access to an entry.
    pub fn entry_mut(&mut self, id: EntryId) -> &mut Entry {
        self.entries.get_mut(id)
    }

    /// Creates a new entry. The caller guarantees `key` is absent.
    pub fn insert_entry(&mut self, key: Vec<u8>, value: Value) -> EntryId {
        let hash = fnv1a_hash(&key);
        let id = self.entries.insert(Entry {
            key,
            value,
            heap_pos: None,
        });
        self.index.insert(hash, id);
        id
    }

    /// Removes `key` if present. Returns whether an entry was destroyed.
    pub fn remove_key(&mut self, key: &[u8]) -> bool {
        let Some(id) = self.find(key) else {
            return false;
        };
        self.remove_entry(id);
        true
    }

    /// Sets, reschedules, or (for negative `ttl_ms`) cancels the entry's TTL.
    pub fn set_ttl(&mut self, id: EntryId, ttl_ms: i64, now_ms: u64) {
        if ttl_ms < 0 {
            self.unlink_ttl(id);
            return;
        }
        let expires_at = now_ms.saturating_add(ttl_ms as u64);
        let pos = self.entries.get(id).heap_pos;
        let entries = &mut self.entries;
        self.ttl.upsert(pos, expires_at, id, &mut |owner, new_pos| {
            entries.get_mut(owner).heap_pos = Some(new_pos);
        });
    }

    /// Milliseconds until the entry expires; `None` when no TTL is set.
    #[must_use]
    pub fn ttl_remaining(&self, id: EntryId, now_ms: u64) -> Option<i64> {
        let pos = self.entries.get(id).heap_pos?;
        let (deadline, _) = self.ttl.slot_at(pos);
        Some(i64::try_from(deadline.saturating_sub(now_ms)).unwrap_or(i64::MAX))
    }

    /// Earliest TTL deadline across the keyspace, for the event-loop wait calculation.
    #[must_use]
    pub fn next_expiry_ms(&self) -> Option<u64> {
        self.ttl.peek().map(|(deadline, _)| deadline)
    }

    /// Destroys entries whose deadline has passed, up to `budget` per call.
    ///
    /// The budget keeps one event-loop iteration from stalling on mass expiry.
    pub fn expire_due(&mut self, now_ms: u64, budget: usize) -> usize {
        let mut expired = 0;
        while expired < budget {
            match self.ttl.peek() {
                Some((deadline, id)) if deadline <= now_ms => {
                    self.remove_entry(id);
                    expired += 1;
                }
                _ => break,
            }
        }
        expired
    }

    /// Visits every key; the visitor returns `false` to stop.
    pub fn for_each_key<F: FnMut(&[u8]) -> bool>(&self, mut visit: F) {
        let entries = &self.entries;
        self.index.for_each(|&id| visit(&entries.get(id).key));
    }

    fn remove_entry(&mut self, id: EntryId) {
        let hash = fnv1a_hash(&self.entries.get(id).key);
        let _ = self.index.remove(hash, |&candidate| candidate == id);
        self.unlink_ttl(id);
        let entry = self.entries.remove(id);
        self.dispose(entry.value);
    }

    fn unlink_ttl(&mut self, id: EntryId) {
        let Some(pos) = self.entries.get_mut(id).heap_pos.take() else {
            return;
        };
        let entries = &mut self.entries;
        self.ttl.remove(pos, &mut |owner, new_pos| {
            entries.get_mut(owner).heap_pos = Some(new_pos);
        });
    }

    /// Large sorted sets are destroyed off-thread; everything else drops inline.
    fn dispose(&self, value: Value) {
        match value {
            Value::Str(_) => {}
            Value::Sorted(set) => {
                if set.len() > self.large_set_threshold {
                    self.reclaimer.submit(move || drop(set));
                }
            }
        }
    }
}
