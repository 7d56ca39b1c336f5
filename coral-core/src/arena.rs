//! Index-based slot arena backing the tree and keyspace entry tables.

/// Stable handle into an [`Arena`]. Slots are reused, so a handle is only meaningful while the
/// owning structure keeps it linked.
pub type SlotId = u32;

/// Flat storage with a free list and stable `u32` handles.
///
/// Structures that would otherwise link nodes with raw pointers store `SlotId`
/// back-references into an arena instead.
#[derive(Debug, Clone, Default)]
pub struct Arena<T> {
    slots: Vec<Option<T>>,
    free: Vec<SlotId>,
    len: usize,
}

impl<T> Arena<T> {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Stores `value` and returns its handle.
    pub fn insert(&mut self, value: T) -> SlotId {
        self.len += 1;
        if let Some(id) = self.free.pop() {
            self.slots[id as usize] = Some(value);
            return id;
        }
        let id = SlotId::try_from(self.slots.len()).expect("arena exceeds u32 slot space");
        self.slots.push(Some(value));
        id
    }

    /// Removes and returns the value stored under `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is vacant; callers only pass handles they still own.
    pub fn remove(&mut self, id: SlotId) -> T {
        let value = self.slots[id as usize]
            .take()
            .expect("arena slot removed twice");
        self.free.push(id);
        self.len -= 1;
        value
    }

    /// Shared access to the value under `id`.
    #[must_use]
    pub fn get(&self, id: SlotId) -> &T {
        self.slots[id as usize]
            .as_ref()
            .expect("arena slot is vacant")
    }

    /// Mutable access to the value under `id`.
    pub fn get_mut(&mut self, id: SlotId) -> &mut T {
        self.slots[id as usize]
            .as_mut()
            .expect("arena slot is vacant")
    }

    /// Number of live values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the arena holds no live values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::Arena;
    use googletest::prelude::*;
    use rstest::rstest;

    #[rstest]
    fn slots_are_reused_after_removal() {
        let mut arena = Arena::new();
        let first = arena.insert("a");
        let second = arena.insert("b");
        assert_that!(arena.remove(first), eq("a"));
        let third = arena.insert("c");
        assert_that!(third, eq(first));
        assert_that!(arena.len(), eq(2));
        assert_that!(*arena.get(second), eq("b"));
        assert_that!(*arena.get(third), eq("c"));
    }

    #[rstest]
    fn len_tracks_live_values() {
        let mut arena = Arena::new();
        let ids: Vec<_> = (0..16).map(|n| arena.insert(n)).collect();
        assert_that!(arena.len(), eq(16));
        for id in ids {
            let _ = arena.remove(id);
        }
        assert_that!(arena.is_empty(), eq(true));
    }
}
