//! Intrusive idle-order list threaded through the reactor's connection map.
//!
//! Nodes stay inside the map; the list only stores keys and each node carries its own
//! prev/next links. Ordering invariant: head is the longest-idle node, tail the most
//! recently active one.

use std::collections::HashMap;
use std::hash::Hash;

/// Per-node list links, embedded in the node itself.
#[derive(Debug, Clone, Copy)]
pub(super) struct IdleLinks<K> {
    prev: Option<K>,
    next: Option<K>,
}

impl<K> Default for IdleLinks<K> {
    fn default() -> Self {
        Self {
            prev: None,
            next: None,
        }
    }
}

/// Implemented by map values that carry [`IdleLinks`].
pub(super) trait IdleNode<K> {
    fn idle_links(&self) -> &IdleLinks<K>;
    fn idle_links_mut(&mut self) -> &mut IdleLinks<K>;
}

/// Doubly-linked list of map keys in idle order.
#[derive(Debug)]
pub(super) struct IdleList<K> {
    head: Option<K>,
    tail: Option<K>,
}

impl<K: Copy + Eq + Hash> IdleList<K> {
    pub(super) fn new() -> Self {
        Self {
            head: None,
            tail: None,
        }
    }

    /// Longest-idle key, if any.
    pub(super) fn front(&self) -> Option<K> {
        self.head
    }

    /// Appends `key` as the most recently active node. The node must not already be linked.
    pub(super) fn push_back<N: IdleNode<K>>(&mut self, key: K, nodes: &mut HashMap<K, N>) {
        let old_tail = self.tail;
        {
            let links = nodes
                .get_mut(&key)
                .expect("pushed key is present in the node map")
                .idle_links_mut();
            links.prev = old_tail;
            links.next = None;
        }
        match old_tail {
            Some(tail) => {
                nodes
                    .get_mut(&tail)
                    .expect("list tail is present in the node map")
                    .idle_links_mut()
                    .next = Some(key);
            }
            None => self.head = Some(key),
        }
        self.tail = Some(key);
    }

    /// Unlinks `key` wherever it sits; a no-op for keys that are absent or unlinked.
    pub(super) fn detach<N: IdleNode<K>>(&mut self, key: K, nodes: &mut HashMap<K, N>) {
        let Some(node) = nodes.get_mut(&key) else {
            return;
        };
        let links = *node.idle_links();
        *node.idle_links_mut() = IdleLinks::default();

        match links.prev {
            Some(prev) => {
                nodes
                    .get_mut(&prev)
                    .expect("linked neighbor is present in the node map")
                    .idle_links_mut()
                    .next = links.next;
            }
            None => {
                if self.head == Some(key) {
                    self.head = links.next;
                }
            }
        }
        match links.next {
            Some(next) => {
                nodes
                    .get_mut(&next)
                    .expect("linked neighbor is present in the node map")
                    .idle_links_mut()
                    .prev = links.prev;
            }
            None => {
                if self.tail == Some(key) {
                    self.tail = links.prev;
                }
            }
        }
    }
}
