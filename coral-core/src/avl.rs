//! Order-statistic AVL tree over an arena, with parent back-references.
//!
//! Every structural change funnels through one iterative retrace ([`OrderStatisticAvl::fix`])
//! that recomputes height and subtree count and rotates wherever the balance factor reaches
//! ±2, so the invariants never apply partially. Subtree counts make rank-offset queries
//! O(log n), which is what sorted-set range scans are built on.

use crate::arena::{Arena, SlotId};

/// Handle to one tree node. Stable across rebalancing; freed on removal.
pub type NodeId = SlotId;

#[derive(Debug)]
struct AvlNode<T> {
    value: T,
    parent: Option<NodeId>,
    left: Option<NodeId>,
    right: Option<NodeId>,
    height: u32,
    count: u32,
}

/// Balanced BST augmented with subtree sizes.
#[derive(Debug)]
pub struct OrderStatisticAvl<T> {
    nodes: Arena<AvlNode<T>>,
    root: Option<NodeId>,
}

impl<T> Default for OrderStatisticAvl<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OrderStatisticAvl<T> {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: Arena::new(),
            root: None,
        }
    }

    /// Number of nodes in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Shared access to a node's value.
    #[must_use]
    pub fn get(&self, id: NodeId) -> &T {
        &self.nodes.get(id).value
    }

    /// Inserts `value`, ordering by `less`, and returns the new node's handle.
    ///
    /// Values comparing equal are placed in the right subtree, so insertion order is kept
    /// among duplicates.
    pub fn insert<F: FnMut(&T, &T) -> bool>(&mut self, value: T, mut less: F) -> NodeId {
        let id = self.nodes.insert(AvlNode {
            value,
            parent: None,
            left: None,
            right: None,
            height: 1,
            count: 1,
        });
        let Some(mut cur) = self.root else {
            self.root = Some(id);
            return id;
        };
        loop {
            let go_left = less(&self.nodes.get(id).value, &self.nodes.get(cur).value);
            let next = if go_left {
                self.nodes.get(cur).left
            } else {
                self.nodes.get(cur).right
            };
            match next {
                Some(n) => cur = n,
                None => {
                    if go_left {
                        self.nodes.get_mut(cur).left = Some(id);
                    } else {
                        self.nodes.get_mut(cur).right = Some(id);
                    }
                    self.nodes.get_mut(id).parent = Some(cur);
                    break;
                }
            }
        }
        self.root = Some(self.fix(id));
        id
    }

    /// Detaches `id` from the tree, rebalances, and returns the stored value.
    ///
    /// A node with two children swaps position with its in-order successor first, so every
    /// other node keeps its handle.
    pub fn remove(&mut self, id: NodeId) -> T {
        let (left, right) = {
            let node = self.nodes.get(id);
            (node.left, node.right)
        };
        if left.is_some() && right.is_some() {
            // In-order successor: leftmost node of the right subtree.
            let mut victim = right.expect("two-child node has a right child");
            while let Some(next) = self.nodes.get(victim).left {
                victim = next;
            }
            self.root = self.detach_easy(victim);
            self.transplant(id, victim);
        } else {
            self.root = self.detach_easy(id);
        }
        self.nodes.remove(id).value
    }

    /// Walks `delta` positions away from `id` in sorted order using subtree counts.
    ///
    /// Negative `delta` moves toward predecessors. Out of range returns `None`; callers treat
    /// that as exhausted iteration.
    #[must_use]
    pub fn offset(&self, id: NodeId, delta: i64) -> Option<NodeId> {
        let mut pos: i64 = 0;
        let mut cur = id;
        while pos != delta {
            let node = self.nodes.get(cur);
            let left_count = i64::from(self.count_of(node.left));
            let right_count = i64::from(self.count_of(node.right));
            if pos < delta && pos + right_count >= delta {
                // Target is inside the right subtree.
                cur = node.right.expect("non-zero count implies a child");
                pos += i64::from(self.count_of(self.nodes.get(cur).left)) + 1;
            } else if pos > delta && pos - left_count <= delta {
                // Target is inside the left subtree.
                cur = node.left.expect("non-zero count implies a child");
                pos -= i64::from(self.count_of(self.nodes.get(cur).right)) + 1;
            } else {
                let parent = node.parent?;
                if self.nodes.get(parent).right == Some(cur) {
                    pos -= left_count + 1;
                } else {
                    pos += right_count + 1;
                }
                cur = parent;
            }
        }
        Some(cur)
    }

    /// Finds the first node, in sorted order, for which `before` is false.
    ///
    /// `before(value)` must mean "value sorts strictly before the probe point".
    #[must_use]
    pub fn first_at_or_after<F: FnMut(&T) -> bool>(&self, mut before: F) -> Option<NodeId> {
        let mut found = None;
        let mut cur = self.root;
        while let Some(id) = cur {
            if before(&self.nodes.get(id).value) {
                cur = self.nodes.get(id).right;
            } else {
                found = Some(id);
                cur = self.nodes.get(id).left;
            }
        }
        found
    }

    fn height_of(&self, id: Option<NodeId>) -> u32 {
        id.map_or(0, |n| self.nodes.get(n).height)
    }

    fn count_of(&self, id: Option<NodeId>) -> u32 {
        id.map_or(0, |n| self.nodes.get(n).count)
    }

    fn refresh(&mut self, id: NodeId) {
        let (left, right) = {
            let node = self.nodes.get(id);
            (node.left, node.right)
        };
        let height = 1 + self.height_of(left).max(self.height_of(right));
        let count = 1 + self.count_of(left) + self.count_of(right);
        let node = self.nodes.get_mut(id);
        node.height = height;
        node.count = count;
    }

    fn rot_left(&mut self, id: NodeId) -> NodeId {
        let parent = self.nodes.get(id).parent;
        let new_root = self.nodes.get(id).right.expect("rot_left needs a right child");
        let inner = self.nodes.get(new_root).left;
        self.nodes.get_mut(id).right = inner;
        if let Some(i) = inner {
            self.nodes.get_mut(i).parent = Some(id);
        }
        self.nodes.get_mut(new_root).parent = parent;
        self.nodes.get_mut(new_root).left = Some(id);
        self.nodes.get_mut(id).parent = Some(new_root);
        self.refresh(id);
        self.refresh(new_root);
        new_root
    }

    fn rot_right(&mut self, id: NodeId) -> NodeId {
        let parent = self.nodes.get(id).parent;
        let new_root = self.nodes.get(id).left.expect("rot_right needs a left child");
        let inner = self.nodes.get(new_root).right;
        self.nodes.get_mut(id).left = inner;
        if let Some(i) = inner {
            self.nodes.get_mut(i).parent = Some(id);
        }
        self.nodes.get_mut(new_root).parent = parent;
        self.nodes.get_mut(new_root).right = Some(id);
        self.nodes.get_mut(id).parent = Some(new_root);
        self.refresh(id);
        self.refresh(new_root);
        new_root
    }

    fn fix_left(&mut self, id: NodeId) -> NodeId {
        let left = self.nodes.get(id).left.expect("left-heavy node has a left child");
        if self.height_of(self.nodes.get(left).left) < self.height_of(self.nodes.get(left).right) {
            let new_left = self.rot_left(left);
            self.nodes.get_mut(id).left = Some(new_left);
        }
        self.rot_right(id)
    }

    fn fix_right(&mut self, id: NodeId) -> NodeId {
        let right = self.nodes.get(id).right.expect("right-heavy node has a right child");
        if self.height_of(self.nodes.get(right).right)
            < self.height_of(self.nodes.get(right).left)
        {
            let new_right = self.rot_right(right);
            self.nodes.get_mut(id).right = Some(new_right);
        }
        self.rot_left(id)
    }

    /// Retraces from `id` to the root, restoring height/count and balance, and returns the
    /// (possibly new) root.
    fn fix(&mut self, mut id: NodeId) -> NodeId {
        loop {
            self.refresh(id);
            let parent = self.nodes.get(id).parent;
            let from_left = parent.map(|p| self.nodes.get(p).left == Some(id));
            let left_height = self.height_of(self.nodes.get(id).left);
            let right_height = self.height_of(self.nodes.get(id).right);
            let mut subtree = id;
            if left_height == right_height + 2 {
                subtree = self.fix_left(id);
            } else if left_height + 2 == right_height {
                subtree = self.fix_right(id);
            }
            match parent {
                None => return subtree,
                Some(p) => {
                    if from_left == Some(true) {
                        self.nodes.get_mut(p).left = Some(subtree);
                    } else {
                        self.nodes.get_mut(p).right = Some(subtree);
                    }
                    id = p;
                }
            }
        }
    }

    /// Unlinks a node with at most one child and returns the new tree root.
    fn detach_easy(&mut self, id: NodeId) -> Option<NodeId> {
        let (left, right, parent) = {
            let node = self.nodes.get(id);
            (node.left, node.right, node.parent)
        };
        debug_assert!(left.is_none() || right.is_none());
        let child = left.or(right);
        if let Some(c) = child {
            self.nodes.get_mut(c).parent = parent;
        }
        let Some(p) = parent else {
            return child;
        };
        if self.nodes.get(p).left == Some(id) {
            self.nodes.get_mut(p).left = child;
        } else {
            self.nodes.get_mut(p).right = child;
        }
        Some(self.fix(p))
    }

    /// Moves the already-detached `victim` into `id`'s current tree position.
    fn transplant(&mut self, id: NodeId, victim: NodeId) {
        let (parent, left, right, height, count) = {
            let node = self.nodes.get(id);
            (node.parent, node.left, node.right, node.height, node.count)
        };
        {
            let v = self.nodes.get_mut(victim);
            v.parent = parent;
            v.left = left;
            v.right = right;
            v.height = height;
            v.count = count;
        }
        if let Some(l) = left {
            self.nodes.get_mut(l).parent = Some(victim);
        }
        if let Some(r) = right {
            self.nodes.get_mut(r).parent = Some(victim);
        }
        match parent {
            None => self.root = Some(victim),
            Some(p) => {
                if self.nodes.get(p).left == Some(id) {
                    self.nodes.get_mut(p).left = Some(victim);
                } else {
                    self.nodes.get_mut(p).right = Some(victim);
                }
            }
        }
    }
}

#[cfg(test)]
impl<T> OrderStatisticAvl<T> {
    /// Validates balance, counts, and parent links everywhere; returns (height, count).
    fn validate_from(&self, id: Option<NodeId>, parent: Option<NodeId>) -> (u32, u32) {
        let Some(id) = id else {
            return (0, 0);
        };
        let node = self.nodes.get(id);
        assert_eq!(node.parent, parent, "parent back-reference out of date");
        let (lh, lc) = self.validate_from(node.left, Some(id));
        let (rh, rc) = self.validate_from(node.right, Some(id));
        assert!(lh.abs_diff(rh) <= 1, "balance factor exceeded at node {id}");
        assert_eq!(node.height, 1 + lh.max(rh), "stale height at node {id}");
        assert_eq!(node.count, 1 + lc + rc, "stale count at node {id}");
        (node.height, node.count)
    }

    fn assert_invariants(&self) {
        let (_, count) = self.validate_from(self.root, None);
        assert_eq!(count as usize, self.nodes.len());
    }

    fn in_order(&self) -> Vec<NodeId>
    where
        T: Clone,
    {
        let mut out = Vec::new();
        self.walk(self.root, &mut out);
        out
    }

    fn walk(&self, id: Option<NodeId>, out: &mut Vec<NodeId>) {
        let Some(id) = id else { return };
        self.walk(self.nodes.get(id).left, out);
        out.push(id);
        self.walk(self.nodes.get(id).right, out);
    }
}
