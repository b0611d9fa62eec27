// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the partition tree: configuration knobs and the neighbor sink.

/// Subdivision limits for [`NTree`](crate::NTree).
///
/// A node subdivides only while its item count is above 1, its level is below
/// `max_depth` (when non-negative), and its item count exceeds
/// `min_item_count` (when non-negative). Negative values disable the limit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TreeConfig {
    /// Maximum node level; the root is level 0. Negative disables the limit.
    pub max_depth: i32,
    /// A node with at most this many items stays a leaf. Negative disables
    /// the limit.
    pub min_item_count: i32,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            min_item_count: -1,
        }
    }
}

/// Growth policy for the node pool.
///
/// The pool preallocates `initial` nodes and grows by `increment` whenever it
/// runs dry. Purely a performance knob; tree behavior does not depend on it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Nodes allocated up front.
    pub initial: usize,
    /// Nodes added per refill.
    pub increment: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial: 1000,
            increment: 100,
        }
    }
}

/// Receiver for neighbor candidates discovered by
/// [`NTree::compute_neighbors`](crate::NTree::compute_neighbors).
///
/// The tree identifies items by the `slot` the caller registered them under.
/// For each query item the tree calls [`begin`](Self::begin) once, then
/// [`offer`](Self::offer) for every co-located candidate inside the query
/// box. [`is_full`](Self::is_full) short-circuits the traversal;
/// [`radius`](Self::radius) sizes the query box (negative means unbounded).
pub trait NeighborSink {
    /// A query item's neighbor pass starts; clear its previous results.
    fn begin(&mut self, slot: usize);

    /// Search radius for a query item. Negative extends the query box to the
    /// whole domain.
    fn radius(&self, slot: usize) -> f64;

    /// True when the item accepts no further candidates.
    fn is_full(&self, slot: usize) -> bool;

    /// A candidate inside the query box. Acceptance is the sink's business.
    fn offer(&mut self, slot: usize, candidate: usize);
}
