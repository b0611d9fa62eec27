// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Murmuration NTree: a pooled, recursive 2^D spatial partition tree.
//!
//! Murmuration NTree is a reusable building block for radius-bounded
//! neighborhood queries over moving point sets of any dimension.
//!
//! - Partitions an axis-aligned box into `2^D` children per node, stopping on
//!   item count, depth, or a minimum-population knob ([`TreeConfig`]).
//! - Updates incrementally: an existing subdivision is re-filtered in place,
//!   collapsing subtrees that no longer warrant children and growing new ones
//!   where the population calls for it.
//! - Serves neighbor queries through an ascent–descent traversal that visits
//!   every node at most once per query and offers every item inside the query
//!   box exactly once, reporting candidates through a [`NeighborSink`].
//! - Recycles nodes through a preallocated pool ([`PoolConfig`]); steady-state
//!   updates allocate nothing.
//!
//! The tree stores `(slot, position)` snapshots and knows nothing about what
//! a slot means; admission, radii, and capacity policies belong to the sink.
//!
//! # Example
//!
//! ```rust
//! use murmuration_ntree::{NTree, NeighborSink};
//!
//! struct Collect(Vec<(usize, usize)>);
//!
//! impl NeighborSink for Collect {
//!     fn begin(&mut self, _slot: usize) {}
//!     fn radius(&self, _slot: usize) -> f64 {
//!         0.6
//!     }
//!     fn is_full(&self, _slot: usize) -> bool {
//!         false
//!     }
//!     fn offer(&mut self, slot: usize, candidate: usize) {
//!         self.0.push((slot, candidate));
//!     }
//! }
//!
//! let mut tree = NTree::new(vec![0.0, 0.0], vec![1.0, 1.0]);
//! let items = vec![(0, vec![0.2, 0.2]), (1, vec![0.8, 0.8])];
//! tree.update(items.clone());
//!
//! let mut sink = Collect(Vec::new());
//! tree.compute_neighbors(&items, &mut sink);
//! assert!(sink.0.contains(&(0, 1)) && sink.0.contains(&(1, 0)));
//! ```

mod pool;
pub mod tree;
pub mod types;

pub use tree::NTree;
pub use types::{NeighborSink, PoolConfig, TreeConfig};
