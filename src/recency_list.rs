//! RecencyList: doubly linked list over a generational arena.
//!
//! Nodes live in a `SlotMap` and link to each other by key, so a
//! [`NodeHandle`] stays valid while its node is moved around the list and
//! stops resolving once the node is removed. A handle to a removed node never
//! aliases a node inserted later, even when the arena reuses the slot.
//!
//! `front` is the most recently used end, `back` the least recently used.

use core::fmt;
use core::iter::FusedIterator;
use slotmap::{DefaultKey, SlotMap};

/// Stable reference to a list node.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeHandle(DefaultKey);

#[derive(Debug, Clone)]
struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<DefaultKey>,
    next: Option<DefaultKey>,
}

#[derive(Clone)]
pub struct RecencyList<K, V> {
    nodes: SlotMap<DefaultKey, Node<K, V>>,
    head: Option<DefaultKey>,
    tail: Option<DefaultKey>,
}

impl<K, V> Default for RecencyList<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> RecencyList<K, V> {
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            head: None,
            tail: None,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: SlotMap::with_capacity_and_key(capacity),
            head: None,
            tail: None,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, h: NodeHandle) -> bool {
        self.nodes.contains_key(h.0)
    }

    pub fn front(&self) -> Option<(&K, &V)> {
        self.head.and_then(|k| self.nodes.get(k)).map(|n| (&n.key, &n.value))
    }

    pub fn back(&self) -> Option<(&K, &V)> {
        self.tail.and_then(|k| self.nodes.get(k)).map(|n| (&n.key, &n.value))
    }

    pub fn front_handle(&self) -> Option<NodeHandle> {
        self.head.map(NodeHandle)
    }

    pub fn back_handle(&self) -> Option<NodeHandle> {
        self.tail.map(NodeHandle)
    }

    pub fn key(&self, h: NodeHandle) -> Option<&K> {
        self.nodes.get(h.0).map(|n| &n.key)
    }

    pub fn get(&self, h: NodeHandle) -> Option<(&K, &V)> {
        self.nodes.get(h.0).map(|n| (&n.key, &n.value))
    }

    pub fn get_mut(&mut self, h: NodeHandle) -> Option<&mut V> {
        self.nodes.get_mut(h.0).map(|n| &mut n.value)
    }

    pub fn push_front(&mut self, key: K, value: V) -> NodeHandle {
        let k = self.nodes.insert(Node {
            key,
            value,
            prev: None,
            next: None,
        });
        self.link_front(k);
        NodeHandle(k)
    }

    pub fn push_back(&mut self, key: K, value: V) -> NodeHandle {
        let k = self.nodes.insert(Node {
            key,
            value,
            prev: None,
            next: None,
        });
        self.link_back(k);
        NodeHandle(k)
    }

    pub fn pop_front(&mut self) -> Option<(K, V)> {
        let k = self.head?;
        self.remove(NodeHandle(k))
    }

    pub fn pop_back(&mut self) -> Option<(K, V)> {
        let k = self.tail?;
        self.remove(NodeHandle(k))
    }

    /// Unlink and release a node. `None` if the handle is stale.
    pub fn remove(&mut self, h: NodeHandle) -> Option<(K, V)> {
        if !self.nodes.contains_key(h.0) {
            return None;
        }
        self.unlink(h.0);
        self.nodes.remove(h.0).map(|n| (n.key, n.value))
    }

    /// Relink a node as the new front. False if the handle is stale.
    pub fn move_to_front(&mut self, h: NodeHandle) -> bool {
        if !self.nodes.contains_key(h.0) {
            return false;
        }
        if self.head != Some(h.0) {
            self.unlink(h.0);
            self.link_front(h.0);
        }
        true
    }

    /// Relink a node as the new back. False if the handle is stale.
    pub fn move_to_back(&mut self, h: NodeHandle) -> bool {
        if !self.nodes.contains_key(h.0) {
            return false;
        }
        if self.tail != Some(h.0) {
            self.unlink(h.0);
            self.link_back(h.0);
        }
        true
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.head = None;
        self.tail = None;
    }

    /// Front-to-back; `.rev()` walks back-to-front.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            nodes: &self.nodes,
            front: self.head,
            back: self.tail,
            remaining: self.nodes.len(),
        }
    }

    fn link_front(&mut self, k: DefaultKey) {
        let old_head = self.head;
        if let Some(n) = self.nodes.get_mut(k) {
            n.prev = None;
            n.next = old_head;
        }
        match old_head {
            Some(h) => {
                if let Some(n) = self.nodes.get_mut(h) {
                    n.prev = Some(k);
                }
            }
            None => self.tail = Some(k),
        }
        self.head = Some(k);
    }

    fn link_back(&mut self, k: DefaultKey) {
        let old_tail = self.tail;
        if let Some(n) = self.nodes.get_mut(k) {
            n.prev = old_tail;
            n.next = None;
        }
        match old_tail {
            Some(t) => {
                if let Some(n) = self.nodes.get_mut(t) {
                    n.next = Some(k);
                }
            }
            None => self.head = Some(k),
        }
        self.tail = Some(k);
    }

    /// Detach a node from its neighbours, patching head/tail. The node itself
    /// keeps stale links until it is relinked or removed.
    fn unlink(&mut self, k: DefaultKey) {
        let (prev, next) = match self.nodes.get(k) {
            Some(n) => (n.prev, n.next),
            None => return,
        };
        match prev {
            Some(p) => {
                if let Some(n) = self.nodes.get_mut(p) {
                    n.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(nx) => {
                if let Some(n) = self.nodes.get_mut(nx) {
                    n.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }
}

impl<K, V> fmt::Debug for RecencyList<K, V>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Bidirectional iterator following the node links.
pub struct Iter<'a, K, V> {
    nodes: &'a SlotMap<DefaultKey, Node<K, V>>,
    front: Option<DefaultKey>,
    back: Option<DefaultKey>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let n = self.nodes.get(self.front?)?;
        self.front = n.next;
        self.remaining -= 1;
        Some((&n.key, &n.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let n = self.nodes.get(self.back?)?;
        self.back = n.prev;
        self.remaining -= 1;
        Some((&n.key, &n.value))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<'a, K, V> IntoIterator for &'a RecencyList<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
