//! Chained hash table pair with bounded-latency progressive rehashing.
//!
//! `HashIndex` keeps two generations: inserts always target `newer`, and while `older` exists
//! every operation first migrates a fixed quota of entries, so no single operation ever pays
//! for a full-table rehash. Keys are caller-hashed and caller-compared, which keeps the index
//! agnostic of key types; the keyspace and sorted sets both build on it.

/// Load factor that triggers a new table generation.
pub const MAX_LOAD_FACTOR: usize = 8;

/// Entries migrated from the old generation per operation.
pub const REHASH_WORK: usize = 128;

/// FNV-1a style hash used for all byte-string keys.
#[must_use]
pub fn fnv1a_hash(data: &[u8]) -> u64 {
    let mut hash: u32 = 0x811C_9DC5;
    for &byte in data {
        hash = hash.wrapping_add(u32::from(byte)).wrapping_mul(0x0100_0193);
    }
    u64::from(hash)
}

#[derive(Debug)]
struct HashNode<T> {
    hash: u64,
    value: T,
    next: Link<T>,
}

type Link<T> = Option<Box<HashNode<T>>>;

/// One table generation: power-of-two bucket array of singly linked chains.
#[derive(Debug)]
struct HashTable<T> {
    slots: Vec<Link<T>>,
    mask: u64,
    len: usize,
}

impl<T> HashTable<T> {
    fn empty() -> Self {
        Self {
            slots: Vec::new(),
            mask: 0,
            len: 0,
        }
    }

    fn with_capacity(capacity: usize) -> Self {
        debug_assert!(capacity > 0 && capacity.is_power_of_two());
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            mask: (capacity as u64) - 1,
            len: 0,
        }
    }

    fn insert_node(&mut self, mut node: Box<HashNode<T>>) {
        let idx = (node.hash & self.mask) as usize;
        node.next = self.slots[idx].take();
        self.slots[idx] = Some(node);
        self.len += 1;
    }

    fn lookup<F: FnMut(&T) -> bool>(&self, hash: u64, eq: &mut F) -> Option<&T> {
        if self.slots.is_empty() {
            return None;
        }
        let idx = (hash & self.mask) as usize;
        let mut cur = self.slots[idx].as_deref();
        while let Some(node) = cur {
            if node.hash == hash && eq(&node.value) {
                return Some(&node.value);
            }
            cur = node.next.as_deref();
        }
        None
    }

    fn lookup_mut<F: FnMut(&T) -> bool>(&mut self, hash: u64, eq: &mut F) -> Option<&mut T> {
        if self.slots.is_empty() {
            return None;
        }
        let idx = (hash & self.mask) as usize;
        let mut cur = self.slots[idx].as_deref_mut();
        while let Some(node) = cur {
            if node.hash == hash && eq(&node.value) {
                return Some(&mut node.value);
            }
            cur = node.next.as_deref_mut();
        }
        None
    }

    fn detach<F: FnMut(&T) -> bool>(&mut self, hash: u64, eq: &mut F) -> Option<Box<HashNode<T>>> {
        if self.slots.is_empty() {
            return None;
        }
        let idx = (hash & self.mask) as usize;
        let removed = Self::detach_in(&mut self.slots[idx], hash, eq);
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    fn detach_in<F: FnMut(&T) -> bool>(
        link: &mut Link<T>,
        hash: u64,
        eq: &mut F,
    ) -> Option<Box<HashNode<T>>> {
        let node = link.as_deref()?;
        if node.hash == hash && eq(&node.value) {
            let mut removed = link.take()?;
            *link = removed.next.take();
            return Some(removed);
        }
        Self::detach_in(&mut link.as_mut()?.next, hash, eq)
    }

    fn for_each<F: FnMut(&T) -> bool>(&self, visit: &mut F) -> bool {
        for slot in &self.slots {
            let mut cur = slot.as_deref();
            while let Some(node) = cur {
                if !visit(&node.value) {
                    return false;
                }
                cur = node.next.as_deref();
            }
        }
        true
    }
}

/// Progressive-rehash hash index: any key lives in exactly one of the two generations.
#[derive(Debug)]
pub struct HashIndex<T> {
    newer: HashTable<T>,
    older: Option<HashTable<T>>,
    migrate_pos: usize,
}

impl<T> Default for HashIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HashIndex<T> {
    /// Creates an index with no allocated buckets; the first insert allocates capacity 4.
    #[must_use]
    pub fn new() -> Self {
        Self {
            newer: HashTable::empty(),
            older: None,
            migrate_pos: 0,
        }
    }

    /// Finds the value whose stored hash equals `hash` and which satisfies `eq`.
    pub fn lookup<F: FnMut(&T) -> bool>(&mut self, hash: u64, mut eq: F) -> Option<&T> {
        self.advance_rehash();
        if self.newer.lookup(hash, &mut eq).is_some() {
            return self.newer.lookup(hash, &mut eq);
        }
        self.older.as_ref().and_then(|t| t.lookup(hash, &mut eq))
    }

    /// Mutable variant of [`HashIndex::lookup`].
    pub fn lookup_mut<F: FnMut(&T) -> bool>(&mut self, hash: u64, mut eq: F) -> Option<&mut T> {
        self.advance_rehash();
        if self.newer.lookup(hash, &mut eq).is_some() {
            return self.newer.lookup_mut(hash, &mut eq);
        }
        self.older.as_mut().and_then(|t| t.lookup_mut(hash, &mut eq))
    }

    /// Inserts a value under `hash`. The caller guarantees no equal key is already present.
    pub fn insert(&mut self, hash: u64, value: T) {
        if self.newer.slots.is_empty() {
            self.newer = HashTable::with_capacity(4);
        }
        self.newer.insert_node(Box::new(HashNode {
            hash,
            value,
            next: None,
        }));
        if self.older.is_none() {
            let threshold = (self.newer.mask as usize + 1) * MAX_LOAD_FACTOR;
            if self.newer.len >= threshold {
                self.start_rehash();
            }
        }
        self.advance_rehash();
    }

    /// Removes and returns the matching value, if present in either generation.
    pub fn remove<F: FnMut(&T) -> bool>(&mut self, hash: u64, mut eq: F) -> Option<T> {
        self.advance_rehash();
        if let Some(node) = self.newer.detach(hash, &mut eq) {
            return Some(node.value);
        }
        let node = self.older.as_mut()?.detach(hash, &mut eq)?;
        Some(node.value)
    }

    /// Number of live entries across both generations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.newer.len + self.older.as_ref().map_or(0, |t| t.len)
    }

    /// Whether the index holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a progressive rehash is currently in flight.
    #[must_use]
    pub fn is_migrating(&self) -> bool {
        self.older.is_some()
    }

    /// Visits every entry; the visitor returns `false` to stop early.
    ///
    /// Iteration performs no migration work, so it can run on a shared reference.
    pub fn for_each<F: FnMut(&T) -> bool>(&self, mut visit: F) {
        if !self.newer.for_each(&mut visit) {
            return;
        }
        if let Some(older) = &self.older {
            let _ = older.for_each(&mut visit);
        }
    }

    fn start_rehash(&mut self) {
        let capacity = (self.newer.mask as usize + 1) * 2;
        self.older = Some(std::mem::replace(
            &mut self.newer,
            HashTable::with_capacity(capacity),
        ));
        self.migrate_pos = 0;
    }

    /// Migrates up to [`REHASH_WORK`] entries from the old generation.
    fn advance_rehash(&mut self) {
        let Some(older) = self.older.as_mut() else {
            return;
        };
        let mut moved = 0;
        while moved < REHASH_WORK && older.len > 0 {
            match older.slots[self.migrate_pos].take() {
                Some(mut node) => {
                    older.slots[self.migrate_pos] = node.next.take();
                    older.len -= 1;
                    self.newer.insert_node(node);
                    moved += 1;
                }
                None => self.migrate_pos += 1,
            }
        }
        if older.len == 0 {
            self.older = None;
        }
    }
}
