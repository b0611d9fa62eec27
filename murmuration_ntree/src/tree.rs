// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core tree implementation: build, incremental update, neighbor visitation.

use crate::pool::{NodeIdx, NodePool};
use crate::types::{NeighborSink, PoolConfig, TreeConfig};

struct TreeItem {
    slot: usize,
    pos: Vec<f64>,
}

/// Recursive partition of an axis-aligned box into `2^D` children per node.
///
/// Items are `(slot, position)` pairs snapshotted on every
/// [`update`](Self::update); the slot is the caller's identifier and is what
/// [`compute_neighbors`](Self::compute_neighbors) reports back through the
/// sink. Nodes live in a recycling pool so steady-state updates allocate
/// nothing.
///
/// An item belongs to the *first* child (axis-bit order, bit `d` selecting
/// the upper half of axis `d`) whose cell contains its position; positions
/// exactly on a cell midpoint resolve to the lower half.
pub struct NTree {
    dim: usize,
    min: Vec<f64>,
    max: Vec<f64>,
    config: TreeConfig,
    pool: NodePool,
    root: Option<NodeIdx>,
    items: Vec<TreeItem>,
    next_token: u64,
}

impl NTree {
    /// Create an empty tree over `[min, max]` with default configuration.
    pub fn new(min: Vec<f64>, max: Vec<f64>) -> Self {
        Self::with_config(min, max, TreeConfig::default(), PoolConfig::default())
    }

    /// Create an empty tree with explicit subdivision and pool knobs.
    pub fn with_config(
        min: Vec<f64>,
        max: Vec<f64>,
        config: TreeConfig,
        pool: PoolConfig,
    ) -> Self {
        assert_eq!(min.len(), max.len(), "bounds dimensions must match");
        assert!(!min.is_empty(), "dimension must be at least 1");
        Self {
            dim: min.len(),
            min,
            max,
            config,
            pool: NodePool::new(pool),
            root: None,
            items: Vec::new(),
            next_token: 0,
        }
    }

    /// Tree dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Minimum corner of the covered box.
    pub fn min(&self) -> &[f64] {
        &self.min
    }

    /// Maximum corner of the covered box.
    pub fn max(&self) -> &[f64] {
        &self.max
    }

    /// Subdivision configuration.
    pub fn config(&self) -> TreeConfig {
        self.config
    }

    /// Replace the covered box. The existing subdivision no longer matches
    /// the new cells, so the tree is cleared; the next update rebuilds it.
    pub fn resize(&mut self, min: Vec<f64>, max: Vec<f64>) {
        assert_eq!(min.len(), self.dim, "bounds dimensions must match");
        assert_eq!(max.len(), self.dim, "bounds dimensions must match");
        self.min = min;
        self.max = max;
        self.clear();
    }

    /// Drop the whole subdivision, returning every node to the pool.
    pub fn clear(&mut self) {
        if let Some(root) = self.root.take() {
            self.release_subtree(root);
        }
        self.items.clear();
    }

    /// True when no structure has been built yet.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.pool.capacity() - self.pool.available()
    }

    /// Rebuild or incrementally update the subdivision from an item snapshot.
    ///
    /// With no existing structure this is a fresh build. Otherwise the
    /// existing subdivision is kept where it is still warranted: item lists
    /// are re-filtered top-down, subtrees whose item count no longer calls
    /// for children collapse, and leaves that now hold enough items grow new
    /// children.
    pub fn update(&mut self, items: impl IntoIterator<Item = (usize, Vec<f64>)>) {
        self.items.clear();
        for (slot, pos) in items {
            debug_assert_eq!(pos.len(), self.dim, "item dimension must match tree");
            self.items.push(TreeItem { slot, pos });
        }
        #[allow(
            clippy::cast_possible_truncation,
            reason = "item snapshots are bounded well below u32::MAX"
        )]
        let ids: Vec<u32> = (0..self.items.len() as u32).collect();

        match self.root {
            None => {
                let root = self.pool.acquire();
                let node = self.pool.get_mut(root);
                node.min = self.min.clone();
                node.max = self.max.clone();
                node.parent = None;
                node.level = 0;
                node.last_checked = None;
                node.items = ids;
                self.root = Some(root);
                self.build_node(root);
            }
            Some(root) => {
                {
                    let node = self.pool.get_mut(root);
                    node.items = ids;
                    node.last_checked = None;
                }
                if self.pool.get(root).children.is_empty() {
                    self.build_node(root);
                } else {
                    self.update_node(root);
                }
            }
        }
    }

    /// Run the neighbor pass for a set of query items.
    ///
    /// Each query is carried down to the leaf containing its position, then
    /// searched outward along the ascent–descent protocol: a node is visited
    /// at most once per query (each query marks nodes with a token unique
    /// across passes), the search prunes nodes disjoint from the query box,
    /// stops ascending once the box is fully inside the current node, and
    /// short-circuits when the sink reports the query full. Every item whose
    /// position lies in the query box is offered exactly once.
    pub fn compute_neighbors<S: NeighborSink>(
        &mut self,
        queries: &[(usize, Vec<f64>)],
        sink: &mut S,
    ) {
        let Some(root) = self.root else {
            return;
        };
        let active: Vec<usize> = (0..queries.len()).collect();
        self.descend(root, queries, active, sink);
    }

    /// Visit every leaf with its box and resident item slots.
    pub fn visit_leaves(&self, mut visit: impl FnMut(&[f64], &[f64], &[usize])) {
        let Some(root) = self.root else {
            return;
        };
        let mut stack = vec![root];
        let mut slots = Vec::new();
        while let Some(idx) = stack.pop() {
            let node = self.pool.get(idx);
            if node.children.is_empty() {
                slots.clear();
                slots.extend(node.items.iter().map(|&id| self.items[id as usize].slot));
                visit(&node.min, &node.max, &slots);
            } else {
                stack.extend(node.children.iter().copied());
            }
        }
    }

    // --- structure ---

    fn should_split(&self, count: usize, level: u32) -> bool {
        count > 1
            && (self.config.max_depth < 0 || i64::from(level) < i64::from(self.config.max_depth))
            && (self.config.min_item_count < 0
                || count as i64 > i64::from(self.config.min_item_count))
    }

    fn centre_of(min: &[f64], max: &[f64]) -> Vec<f64> {
        min.iter().zip(max).map(|(a, b)| (a + b) * 0.5).collect()
    }

    /// Child cell number for a position: bit `d` set when the position is in
    /// the upper half of axis `d`. Midpoint ties take the lower half, which
    /// is the first containing child in axis-bit order.
    fn child_for(centre: &[f64], pos: &[f64]) -> usize {
        let mut nr = 0_usize;
        for (d, (c, p)) in centre.iter().zip(pos).enumerate() {
            if p > c {
                nr |= 1 << d;
            }
        }
        nr
    }

    /// Create the `2^D` children of a node and distribute its items, then
    /// recurse while subdivision is warranted.
    fn build_node(&mut self, idx: NodeIdx) {
        let (count, level) = {
            let node = self.pool.get(idx);
            (node.items.len(), node.level)
        };
        if !self.should_split(count, level) {
            return;
        }

        let (node_min, node_max, item_ids) = {
            let node = self.pool.get(idx);
            (node.min.clone(), node.max.clone(), node.items.clone())
        };
        let centre = Self::centre_of(&node_min, &node_max);
        let child_count = 1_usize << self.dim;

        let mut children = Vec::with_capacity(child_count);
        for nr in 0..child_count {
            let child = self.pool.acquire();
            let node = self.pool.get_mut(child);
            node.min = Vec::with_capacity(self.dim);
            node.max = Vec::with_capacity(self.dim);
            for d in 0..self.dim {
                if nr & (1 << d) != 0 {
                    node.min.push(centre[d]);
                    node.max.push(node_max[d]);
                } else {
                    node.min.push(node_min[d]);
                    node.max.push(centre[d]);
                }
            }
            node.parent = Some(idx);
            node.level = level + 1;
            node.last_checked = None;
            children.push(child);
        }

        let mut groups: Vec<Vec<u32>> = vec![Vec::new(); child_count];
        for id in item_ids {
            let nr = Self::child_for(&centre, &self.items[id as usize].pos);
            groups[nr].push(id);
        }
        for (child, group) in children.iter().zip(groups) {
            self.pool.get_mut(*child).items = group;
        }
        self.pool.get_mut(idx).children = children.clone();

        for child in children {
            self.build_node(child);
        }
    }

    /// Re-filter an internal node's items into its existing children,
    /// collapsing or growing subtrees as the new counts demand.
    fn update_node(&mut self, idx: NodeIdx) {
        let (count, level, children) = {
            let node = self.pool.get(idx);
            (node.items.len(), node.level, node.children.clone())
        };

        if !self.should_split(count, level) {
            for child in children {
                self.release_subtree(child);
            }
            self.pool.get_mut(idx).children.clear();
            return;
        }

        let (node_min, node_max, item_ids) = {
            let node = self.pool.get(idx);
            (node.min.clone(), node.max.clone(), node.items.clone())
        };
        let centre = Self::centre_of(&node_min, &node_max);

        let mut groups: Vec<Vec<u32>> = vec![Vec::new(); children.len()];
        for id in item_ids {
            let nr = Self::child_for(&centre, &self.items[id as usize].pos);
            groups[nr].push(id);
        }
        for (child, group) in children.iter().zip(groups) {
            let node = self.pool.get_mut(*child);
            node.items = group;
            node.last_checked = None;
        }

        for child in children {
            if self.pool.get(child).children.is_empty() {
                self.build_node(child);
            } else {
                self.update_node(child);
            }
        }
    }

    fn release_subtree(&mut self, idx: NodeIdx) {
        let children = self.pool.get(idx).children.clone();
        for child in children {
            self.release_subtree(child);
        }
        self.pool.release(idx);
    }

    // --- neighbor pass ---

    /// Carry query items down to the leaves containing their positions and
    /// start the outward search there.
    fn descend<S: NeighborSink>(
        &mut self,
        idx: NodeIdx,
        queries: &[(usize, Vec<f64>)],
        active: Vec<usize>,
        sink: &mut S,
    ) {
        let children = self.pool.get(idx).children.clone();

        if children.is_empty() {
            let mut qmin = vec![0.0; self.dim];
            let mut qmax = vec![0.0; self.dim];
            for qi in active {
                let (slot, pos) = &queries[qi];
                let radius = sink.radius(*slot);
                if radius >= 0.0 {
                    for d in 0..self.dim {
                        qmin[d] = pos[d] - radius;
                        qmax[d] = pos[d] + radius;
                    }
                } else {
                    qmin.fill(f64::NEG_INFINITY);
                    qmax.fill(f64::INFINITY);
                }
                let token = self.next_token;
                self.next_token += 1;
                sink.begin(*slot);
                self.search(idx, token, *slot, &qmin, &qmax, sink);
            }
            return;
        }

        let (node_min, node_max) = {
            let node = self.pool.get(idx);
            (node.min.clone(), node.max.clone())
        };
        let centre = Self::centre_of(&node_min, &node_max);
        let mut groups: Vec<Vec<usize>> = vec![Vec::new(); children.len()];
        for qi in active {
            let nr = Self::child_for(&centre, &queries[qi].1);
            groups[nr].push(qi);
        }
        for (child, group) in children.into_iter().zip(groups) {
            if !group.is_empty() {
                self.descend(child, queries, group, sink);
            }
        }
    }

    /// One query's outward search from a node: offer leaf residents, spread
    /// into unchecked children, then ascend unless the query box is already
    /// fully contained here.
    fn search<S: NeighborSink>(
        &mut self,
        idx: NodeIdx,
        token: u64,
        q_slot: usize,
        qmin: &[f64],
        qmax: &[f64],
        sink: &mut S,
    ) {
        {
            let node = self.pool.get_mut(idx);
            if node.last_checked == Some(token) {
                return;
            }
            node.last_checked = Some(token);
        }

        if sink.is_full(q_slot) {
            return;
        }

        let (overlaps, contained) = {
            let node = self.pool.get(idx);
            let mut overlaps = true;
            let mut contained = true;
            for d in 0..self.dim {
                if qmax[d] < node.min[d] || qmin[d] > node.max[d] {
                    overlaps = false;
                    break;
                }
            }
            for d in 0..self.dim {
                if qmin[d] < node.min[d] || qmax[d] > node.max[d] {
                    contained = false;
                    break;
                }
            }
            (overlaps, contained)
        };
        if !overlaps {
            return;
        }

        let (children, parent) = {
            let node = self.pool.get(idx);
            (node.children.clone(), node.parent)
        };

        if children.is_empty() {
            let item_ids = self.pool.get(idx).items.clone();
            for id in item_ids {
                let slot = self.items[id as usize].slot;
                if slot != q_slot {
                    sink.offer(q_slot, slot);
                }
            }
        } else {
            for child in children {
                if self.pool.get(child).last_checked != Some(token) {
                    self.search(child, token, q_slot, qmin, qmax, sink);
                }
            }
        }

        if let Some(parent) = parent
            && self.pool.get(parent).last_checked != Some(token)
            && !contained
        {
            self.search(parent, token, q_slot, qmin, qmax, sink);
        }
    }
}

impl core::fmt::Debug for NTree {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NTree")
            .field("dim", &self.dim)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("items", &self.items.len())
            .field("nodes", &self.node_count())
            .finish_non_exhaustive()
    }
}
