// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Recency list backing the store.
//!
//! Nodes live in a growable slab and link to each other by index, so promotion and eviction
//! never allocate once a slot has been recycled. The head is the most recently used entry and
//! the tail is the next eviction victim.

#![expect(
    clippy::cast_possible_truncation,
    reason = "NodeIndex is u32, which is sufficient for expected entry counts"
)]

/// Index of a node inside the slab.
pub type NodeIndex = u32;

/// Sentinel value indicating no node.
pub const NULL_INDEX: NodeIndex = NodeIndex::MAX;

#[derive(Debug)]
struct Node<K> {
    key: Option<K>,
    prev: NodeIndex,
    next: NodeIndex,
}

impl<K> Node<K> {
    const fn vacant(next: NodeIndex) -> Self {
        Self {
            key: None,
            prev: NULL_INDEX,
            next,
        }
    }
}

/// A doubly-linked recency list stored in a slab of index-linked nodes.
#[derive(Debug)]
pub struct RecencyList<K> {
    nodes: Vec<Node<K>>,
    head: NodeIndex,
    tail: NodeIndex,
    free_head: NodeIndex,
}

impl<K> Default for RecencyList<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> RecencyList<K> {
    /// Creates an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            nodes: Vec::new(),
            head: NULL_INDEX,
            tail: NULL_INDEX,
            free_head: NULL_INDEX,
        }
    }

    /// Returns the index of the least recently used node.
    #[must_use]
    pub fn back(&self) -> Option<NodeIndex> {
        (self.tail != NULL_INDEX).then_some(self.tail)
    }

    /// Returns the key stored at `idx`, if the slot is in use.
    #[must_use]
    pub fn key(&self, idx: NodeIndex) -> Option<&K> {
        self.nodes.get(idx as usize).and_then(|node| node.key.as_ref())
    }

    /// Links a new node holding `key` at the head and returns its index.
    pub fn push_front(&mut self, key: K) -> NodeIndex {
        let idx = self.alloc(key);
        self.link_front(idx);
        idx
    }

    /// Moves an in-use node to the head.
    pub fn move_to_front(&mut self, idx: NodeIndex) {
        if self.head == idx || self.key(idx).is_none() {
            return;
        }
        self.unlink(idx);
        self.link_front(idx);
    }

    /// Unlinks the node at `idx`, recycles its slot and returns its key.
    pub fn remove(&mut self, idx: NodeIndex) -> Option<K> {
        self.key(idx)?;
        self.unlink(idx);

        let node = &mut self.nodes[idx as usize];
        let key = node.key.take();
        node.prev = NULL_INDEX;
        node.next = self.free_head;
        self.free_head = idx;
        key
    }

    /// Unlinks the least recently used node and returns its key.
    pub fn pop_back(&mut self) -> Option<K> {
        let idx = self.back()?;
        self.remove(idx)
    }

    /// Iterates keys from most to least recently used.
    pub fn iter(&self) -> impl Iterator<Item = &K> {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            if cursor == NULL_INDEX {
                return None;
            }
            let node = &self.nodes[cursor as usize];
            cursor = node.next;
            node.key.as_ref()
        })
    }

    /// Drops every node and releases the slab.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    fn alloc(&mut self, key: K) -> NodeIndex {
        if self.free_head == NULL_INDEX {
            let idx = self.nodes.len() as NodeIndex;
            self.nodes.push(Node::vacant(NULL_INDEX));
            self.nodes[idx as usize].key = Some(key);
            return idx;
        }

        let idx = self.free_head;
        let node = &mut self.nodes[idx as usize];
        self.free_head = node.next;
        node.key = Some(key);
        node.next = NULL_INDEX;
        idx
    }

    fn link_front(&mut self, idx: NodeIndex) {
        let old_head = self.head;
        {
            let node = &mut self.nodes[idx as usize];
            node.prev = NULL_INDEX;
            node.next = old_head;
        }
        if old_head == NULL_INDEX {
            self.tail = idx;
        } else {
            self.nodes[old_head as usize].prev = idx;
        }
        self.head = idx;
    }

    fn unlink(&mut self, idx: NodeIndex) {
        let (prev, next) = {
            let node = &self.nodes[idx as usize];
            (node.prev, node.next)
        };

        if prev == NULL_INDEX {
            self.head = next;
        } else {
            self.nodes[prev as usize].next = next;
        }

        if next == NULL_INDEX {
            self.tail = prev;
        } else {
            self.nodes[next as usize].prev = prev;
        }
    }
}
