//! Cache of decoded trie nodes.
//!
//! Decoding a node costs one small read for its length prefix and another for
//! its body. Hot nodes near the root are decoded on every operation, so a trie
//! can keep decoded copies keyed by storage offset.
//!
//! # Design
//!
//! - The cache holds owned `Node` values; callers get clones and store the
//!   mutated node back after each operation
//! - A node that relocates is reported through `RelocationObserver` so the
//!   entry under its old offset never serves stale links
//! - Eviction is generational: when the cache is full it is emptied and
//!   starts over

use std::collections::HashMap;

use crate::trie::node::Node;

/// Receives relocation events from nodes.
pub trait RelocationObserver {
    /// A node moved from `old_offset` to `new_offset`.
    fn on_relocate(&mut self, old_offset: u64, new_offset: u64);
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub relocations: u64,
    pub evictions: u64,
}

/// Offset-keyed cache of decoded nodes.
#[derive(Debug)]
pub struct NodeCache {
    nodes: HashMap<u64, Node>,
    capacity: usize,
    stats: NodeCacheStats,
}

impl NodeCache {
    /// Create a cache holding at most `capacity` nodes (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            nodes: HashMap::with_capacity(capacity.min(1024)),
            capacity,
            stats: NodeCacheStats::default(),
        }
    }

    /// Look up the node at `offset`.
    pub fn get(&mut self, offset: u64) -> Option<&Node> {
        let node = self.nodes.get(&offset);
        if node.is_some() {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
        }
        node
    }

    /// Insert or replace the entry for the node's current offset.
    pub fn insert(&mut self, node: Node) {
        if self.nodes.len() >= self.capacity && !self.nodes.contains_key(&node.own_offset()) {
            tracing::trace!(evicted = self.nodes.len(), "node cache generation reset");
            self.nodes.clear();
            self.stats.evictions += 1;
        }
        self.nodes.insert(node.own_offset(), node);
    }

    /// Drop the entry at `offset`, if any.
    pub fn remove(&mut self, offset: u64) -> Option<Node> {
        self.nodes.remove(&offset)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub const fn stats(&self) -> NodeCacheStats {
        self.stats
    }
}

impl RelocationObserver for NodeCache {
    fn on_relocate(&mut self, old_offset: u64, new_offset: u64) {
        self.nodes.remove(&old_offset);
        self.stats.relocations += 1;
        tracing::trace!(old_offset, new_offset, "node cache saw relocation");
    }
}
