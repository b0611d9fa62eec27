// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Slot arena for tree nodes with batched preallocation and recycling.

use crate::types::PoolConfig;

/// Index of a node inside the pool arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct NodeIdx(u32);

impl NodeIdx {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "node arenas are bounded well below u32::MAX slots"
    )]
    pub(crate) const fn new(idx: usize) -> Self {
        Self(idx as u32)
    }

    pub(crate) const fn get(self) -> usize {
        self.0 as usize
    }
}

/// One cell of the partition tree.
///
/// `children` is empty for a leaf and holds `2^D` entries for an internal
/// node. `items` indexes into the tree's item snapshot. `last_checked`
/// remembers the token of the most recent query that visited this node, so
/// the ascent–descent traversal touches each node once per query.
#[derive(Clone, Debug, Default)]
pub(crate) struct Node {
    pub min: Vec<f64>,
    pub max: Vec<f64>,
    pub parent: Option<NodeIdx>,
    pub children: Vec<NodeIdx>,
    pub items: Vec<u32>,
    pub last_checked: Option<u64>,
    pub level: u32,
}

impl Node {
    /// Reset to an unlinked, empty leaf, keeping allocations.
    pub fn reset(&mut self) {
        self.min.clear();
        self.max.clear();
        self.parent = None;
        self.children.clear();
        self.items.clear();
        self.last_checked = None;
        self.level = 0;
    }
}

/// Arena of recyclable nodes.
///
/// Nodes are addressed by [`NodeIdx`]; released nodes go back on the free
/// list and keep their buffers, so steady-state updates allocate nothing.
#[derive(Debug)]
pub(crate) struct NodePool {
    nodes: Vec<Node>,
    free: Vec<NodeIdx>,
    increment: usize,
}

impl NodePool {
    pub fn new(config: PoolConfig) -> Self {
        let mut pool = Self {
            nodes: Vec::with_capacity(config.initial),
            free: Vec::with_capacity(config.initial),
            increment: config.increment.max(1),
        };
        pool.grow(config.initial);
        pool
    }

    fn grow(&mut self, count: usize) {
        for _ in 0..count {
            let idx = NodeIdx::new(self.nodes.len());
            self.nodes.push(Node::default());
            self.free.push(idx);
        }
    }

    /// Take a node from the pool, growing it when empty.
    pub fn acquire(&mut self) -> NodeIdx {
        if self.free.is_empty() {
            self.grow(self.increment);
        }
        self.free.pop().expect("pool grows before popping")
    }

    /// Return a node to the pool.
    pub fn release(&mut self, idx: NodeIdx) {
        self.nodes[idx.get()].reset();
        self.free.push(idx);
    }

    pub fn get(&self, idx: NodeIdx) -> &Node {
        &self.nodes[idx.get()]
    }

    pub fn get_mut(&mut self, idx: NodeIdx) -> &mut Node {
        &mut self.nodes[idx.get()]
    }

    /// Nodes currently held by the pool, free and live.
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes currently on the free list.
    pub fn available(&self) -> usize {
        self.free.len()
    }
}
