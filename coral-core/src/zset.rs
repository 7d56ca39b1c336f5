//! Sorted set: one member collection indexed twice.
//!
//! Members live inside the tree arena (score-ordered, the order-statistic AVL) while the hash
//! index stores node-id back-references keyed by member name, so lookups by name and scans by
//! rank are both cheap. A member is present in the tree iff it is present in the index.

use crate::avl::{NodeId, OrderStatisticAvl};
use crate::hash::{fnv1a_hash, HashIndex};
use std::cmp::Ordering;

/// One sorted-set member: the payload stored in each tree node.
#[derive(Debug, Clone)]
pub struct Member {
    /// Member name, compared byte-wise.
    pub name: Box<[u8]>,
    /// Ranking score.
    pub score: f64,
}

/// Returns whether `member` sorts strictly before the probe point `(score, name)`.
///
/// Total order: ascending score, ties broken by byte-wise name comparison (slice ordering,
/// which covers the shorter-name rule). Scores are never NaN; dispatch rejects them.
fn sorts_before(member: &Member, score: f64, name: &[u8]) -> bool {
    match member.score.partial_cmp(&score) {
        Some(Ordering::Less) => true,
        Some(Ordering::Greater) => false,
        _ => member.name.as_ref() < name,
    }
}

fn member_less(a: &Member, b: &Member) -> bool {
    sorts_before(a, b.score, &b.name)
}

/// Dual-indexed sorted set.
#[derive(Debug, Default)]
pub struct SortedSet {
    tree: OrderStatisticAvl<Member>,
    index: HashIndex<NodeId>,
}

impl SortedSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tree: OrderStatisticAvl::new(),
            index: HashIndex::new(),
        }
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Whether the set has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Adds a member or updates an existing member's score.
    ///
    /// Returns `true` when the member is new. A score update detaches the tree node and
    /// reinserts it at its new rank; both indexes stay in agreement throughout the call.
    pub fn insert(&mut self, name: &[u8], score: f64) -> bool {
        let hash = fnv1a_hash(name);
        if let Some(id) = self.lookup(name) {
            let mut member = self.tree.remove(id);
            member.score = score;
            let new_id = self.tree.insert(member, member_less);
            if new_id != id {
                let slot = self
                    .index
                    .lookup_mut(hash, |&stored| stored == id)
                    .expect("member present in tree is indexed by name");
                *slot = new_id;
            }
            return false;
        }
        let member = Member {
            name: name.into(),
            score,
        };
        let id = self.tree.insert(member, member_less);
        self.index.insert(hash, id);
        true
    }

    /// Finds a member's node by name.
    pub fn lookup(&mut self, name: &[u8]) -> Option<NodeId> {
        let tree = &self.tree;
        self.index
            .lookup(fnv1a_hash(name), |&id| tree.get(id).name.as_ref() == name)
            .copied()
    }

    /// Removes a member by name. Returns `true` when it was present.
    pub fn remove(&mut self, name: &[u8]) -> bool {
        let tree = &self.tree;
        let Some(id) = self
            .index
            .remove(fnv1a_hash(name), |&id| tree.get(id).name.as_ref() == name)
        else {
            return false;
        };
        let _ = self.tree.remove(id);
        true
    }

    /// First member at or after the `(score, name)` probe point in rank order.
    #[must_use]
    pub fn seek_at_or_after(&self, score: f64, name: &[u8]) -> Option<NodeId> {
        self.tree
            .first_at_or_after(|member| sorts_before(member, score, name))
    }

    /// Member `delta` rank positions away from `id`; `None` when out of range.
    #[must_use]
    pub fn offset(&self, id: NodeId, delta: i64) -> Option<NodeId> {
        self.tree.offset(id, delta)
    }

    /// Payload of the member at `id`.
    #[must_use]
    pub fn member(&self, id: NodeId) -> &Member {
        self.tree.get(id)
    }
}
