//! Min-heap over expiration timestamps with owner back-references.
//!
//! Each slot carries its owner's id, and every slot movement reports the new array position
//! through a caller-supplied hook, so owners can cancel or reschedule any entry in O(log n)
//! without a separate position map.

/// One heap slot: an expiration deadline plus the owning entry's id.
#[derive(Debug, Clone, Copy)]
pub struct HeapSlot<O> {
    /// Deadline in monotonic milliseconds.
    pub expires_at_ms: u64,
    /// Owner whose stored position must track this slot.
    pub owner: O,
}

/// Binary min-heap keyed by `expires_at_ms`.
///
/// The `track(owner, position)` hook is invoked for every slot that lands at a new position,
/// including the final resting position of the sifted item itself.
#[derive(Debug, Default)]
pub struct BackPointerHeap<O: Copy> {
    items: Vec<HeapSlot<O>>,
}

impl<O: Copy> BackPointerHeap<O> {
    /// Creates an empty heap.
    #[must_use]
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Number of tracked deadlines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the heap holds no deadlines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The earliest deadline and its owner.
    #[must_use]
    pub fn peek(&self) -> Option<(u64, O)> {
        self.items.first().map(|slot| (slot.expires_at_ms, slot.owner))
    }

    /// The deadline and owner at `pos`. The caller holds a valid back-pointer.
    #[must_use]
    pub fn slot_at(&self, pos: usize) -> (u64, O) {
        let slot = &self.items[pos];
        (slot.expires_at_ms, slot.owner)
    }

    /// Schedules or reschedules a deadline.
    ///
    /// With `pos = None` the slot is appended and sifted up; otherwise the existing slot at
    /// `pos` is overwritten and resifted in whichever direction the new value requires.
    pub fn upsert<F: FnMut(O, usize)>(
        &mut self,
        pos: Option<usize>,
        expires_at_ms: u64,
        owner: O,
        track: &mut F,
    ) {
        let slot = HeapSlot {
            expires_at_ms,
            owner,
        };
        match pos {
            Some(p) => {
                self.items[p] = slot;
                self.resift(p, track);
            }
            None => {
                self.items.push(slot);
                self.sift_up(self.items.len() - 1, track);
            }
        }
    }

    /// Cancels the deadline at `pos` by swapping in the last slot and resifting it.
    pub fn remove<F: FnMut(O, usize)>(&mut self, pos: usize, track: &mut F) {
        let _ = self.items.swap_remove(pos);
        if pos < self.items.len() {
            self.resift(pos, track);
        }
    }

    fn resift<F: FnMut(O, usize)>(&mut self, pos: usize, track: &mut F) {
        if pos > 0 && self.items[(pos - 1) / 2].expires_at_ms > self.items[pos].expires_at_ms {
            self.sift_up(pos, track);
        } else {
            self.sift_down(pos, track);
        }
    }

    fn sift_up<F: FnMut(O, usize)>(&mut self, mut pos: usize, track: &mut F) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.items[parent].expires_at_ms <= self.items[pos].expires_at_ms {
                break;
            }
            self.items.swap(pos, parent);
            track(self.items[pos].owner, pos);
            pos = parent;
        }
        track(self.items[pos].owner, pos);
    }

    fn sift_down<F: FnMut(O, usize)>(&mut self, mut pos: usize, track: &mut F) {
        loop {
            let left = 2 * pos + 1;
            let right = left + 1;
            let mut smallest = pos;
            if left < self.items.len()
                && self.items[left].expires_at_ms < self.items[smallest].expires_at_ms
            {
                smallest = left;
            }
            if right < self.items.len()
                && self.items[right].expires_at_ms < self.items[smallest].expires_at_ms
            {
                smallest = right;
            }
            if smallest == pos {
                break;
            }
            self.items.swap(pos, smallest);
            track(self.items[pos].owner, pos);
            pos = smallest;
        }
        track(self.items[pos].owner, pos);
    }
}

#[cfg(test)]
mod tests {
    use super::BackPointerHeap;
    use googletest::prelude::*;
    use rstest::rstest;

    struct Harness {
        heap: BackPointerHeap<usize>,
        positions: Vec<Option<usize>>,
    }

    impl Harness {
        fn new(owners: usize) -> Self {
            Self {
                heap: BackPointerHeap::new(),
                positions: vec![None; owners],
            }
        }

        fn upsert(&mut self, owner: usize, deadline: u64) {
            let pos = self.positions[owner];
            let positions = &mut self.positions;
            self.heap
                .upsert(pos, deadline, owner, &mut |o, p| positions[o] = Some(p));
        }

        fn remove(&mut self, owner: usize) {
            let pos = self.positions[owner].expect("owner is scheduled");
            self.positions[owner] = None;
            let positions = &mut self.positions;
            self.heap.remove(pos, &mut |o, p| positions[o] = Some(p));
        }

        fn assert_consistent(&self) {
            // Heap property at every non-root slot.
            for pos in 1..self.heap.items.len() {
                let parent = (pos - 1) / 2;
                assert_that!(
                    self.heap.items[parent].expires_at_ms
                        <= self.heap.items[pos].expires_at_ms,
                    eq(true)
                );
            }
            // Every owner's stored index equals its true array position.
            for (pos, slot) in self.heap.items.iter().enumerate() {
                assert_that!(self.positions[slot.owner], eq(Some(pos)));
            }
            let scheduled = self.positions.iter().filter(|p| p.is_some()).count();
            assert_that!(scheduled, eq(self.heap.len()));
        }
    }

    #[rstest]
    fn upsert_and_remove_keep_back_pointers_accurate() {
        let mut h = Harness::new(64);
        for owner in 0..64 {
            h.upsert(owner, (owner as u64 * 37) % 101);
            h.assert_consistent();
        }
        // Reschedule every other owner in both directions.
        for owner in (0..64).step_by(2) {
            h.upsert(owner, if owner % 4 == 0 { 0 } else { 1000 + owner as u64 });
            h.assert_consistent();
        }
        for owner in 0..64 {
            h.remove(owner);
            h.assert_consistent();
        }
        assert_that!(h.heap.is_empty(), eq(true));
    }

    #[rstest]
    fn peek_returns_the_earliest_deadline() {
        let mut h = Harness::new(8);
        for (owner, deadline) in [(0, 50_u64), (1, 20), (2, 90), (3, 10), (4, 60)] {
            h.upsert(owner, deadline);
        }
        assert_that!(h.heap.peek(), eq(Some((10, 3))));
        h.remove(3);
        assert_that!(h.heap.peek(), eq(Some((20, 1))));
    }

    #[rstest]
    fn removing_the_last_slot_needs_no_resift() {
        let mut h = Harness::new(2);
        h.upsert(0, 5);
        h.upsert(1, 10);
        h.remove(1);
        h.assert_consistent();
        assert_that!(h.heap.peek(), eq(Some((5, 0))));
    }
}
