// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Space algorithm abstraction and the bundled strategies.
//!
//! An algorithm turns a space's visible set into an index structure and its
//! neighbor-capable set into neighbor lists, always routing candidates
//! through each object's admission policy. Strategies are pluggable behind
//! [`SpaceAlgorithm`] so spaces can swap indexing without API churn:
//!
//! - [`PermanentNeighborsAlgorithm`](permanent::PermanentNeighborsAlgorithm):
//!   client-authored topology, distances refreshed per tick.
//! - [`NTreeAlgorithm`](ntree::NTreeAlgorithm): recursive `2^D` partition
//!   tree with pooled nodes.
//! - [`KdTreeAlgorithm`](kdtree::KdTreeAlgorithm) /
//!   [`AnnAlgorithm`](kdtree::AnnAlgorithm): median-split point index, exact
//!   radius search or approximate k-nearest.
//! - [`RTreeAlgorithm`](rtree::RTreeAlgorithm): packed rectangle tree over
//!   shape bounding boxes (3-D only).
//! - [`GridAlgorithm`](grid::GridAlgorithm): dense vector field with six
//!   neighbor modes and five write-back modes.

pub mod grid;
pub mod kdtree;
pub mod ntree;
pub mod permanent;
pub mod rtree;

use nalgebra::DVector;

use crate::error::SpaceError;
use crate::object::{ObjectId, ObjectStore};

/// Shared bounds header carried by every algorithm.
///
/// Bounded algorithms fix `[min, max]` at construction; unbounded ones start
/// degenerate and are grown by the space to contain every proxy each tick.
#[derive(Clone, Debug)]
pub struct AlgorithmBounds {
    fixed: bool,
    min: DVector<f64>,
    max: DVector<f64>,
}

impl AlgorithmBounds {
    /// Bounds that expand to the population each tick.
    pub fn unbounded(dim: usize) -> Self {
        assert!(dim >= 1, "dimension must be at least 1");
        Self {
            fixed: false,
            min: DVector::zeros(dim),
            max: DVector::zeros(dim),
        }
    }

    /// Construction-fixed bounds.
    pub fn bounded(min: DVector<f64>, max: DVector<f64>) -> Result<Self, SpaceError> {
        if min.len() != max.len() {
            return Err(SpaceError::DimensionMismatch {
                expected: min.len(),
                found: max.len(),
            });
        }
        for axis in 0..min.len() {
            if min[axis] > max[axis] {
                return Err(SpaceError::InvalidBounds {
                    axis,
                    min: min[axis],
                    max: max[axis],
                });
            }
        }
        Ok(Self {
            fixed: true,
            min,
            max,
        })
    }

    /// Whether the bounds are construction-fixed.
    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    /// Dimension of the bounds.
    pub fn dim(&self) -> usize {
        self.min.len()
    }

    /// Minimum corner.
    pub fn min(&self) -> &DVector<f64> {
        &self.min
    }

    /// Maximum corner.
    pub fn max(&self) -> &DVector<f64> {
        &self.max
    }

    /// Replace the bounds. Fixed bounds reject the call; dimensions must
    /// match and no axis may invert.
    pub fn resize(&mut self, min: DVector<f64>, max: DVector<f64>) -> Result<(), SpaceError> {
        if self.fixed {
            return Err(SpaceError::FixedBounds);
        }
        if min.len() != self.min.len() {
            return Err(SpaceError::DimensionMismatch {
                expected: self.min.len(),
                found: min.len(),
            });
        }
        if max.len() != self.max.len() {
            return Err(SpaceError::DimensionMismatch {
                expected: self.max.len(),
                found: max.len(),
            });
        }
        for axis in 0..min.len() {
            if min[axis] > max[axis] {
                return Err(SpaceError::InvalidBounds {
                    axis,
                    min: min[axis],
                    max: max[axis],
                });
            }
        }
        self.min = min;
        self.max = max;
        Ok(())
    }
}

/// Pluggable indexing strategy of a space.
///
/// The space drives two phases per tick, structure strictly before
/// neighbors. Both receive the object store and the owning space's name so
/// candidates can be routed through the right per-space admission policy.
pub trait SpaceAlgorithm {
    /// Human-readable strategy name.
    fn label(&self) -> &'static str;

    /// The shared bounds header.
    fn bounds(&self) -> &AlgorithmBounds;

    /// Mutable bounds header, for resize plumbing.
    fn bounds_mut(&mut self) -> &mut AlgorithmBounds;

    /// Replace the bounds. Strategies with derived state override this to
    /// invalidate it.
    fn resize(&mut self, min: DVector<f64>, max: DVector<f64>) -> Result<(), SpaceError> {
        self.bounds_mut().resize(min, max)
    }

    /// Rebuild or incrementally update the index over the visible set.
    fn update_structure(
        &mut self,
        store: &mut ObjectStore,
        space: &str,
        visible: &[ObjectId],
    ) -> Result<(), SpaceError>;

    /// Recompute neighbor lists for the neighbor-capable set.
    fn update_neighbors(
        &mut self,
        store: &mut ObjectStore,
        space: &str,
        capable: &[ObjectId],
    ) -> Result<(), SpaceError>;

    /// Concrete-type escape hatch for callers that need strategy-specific
    /// state (for example a grid's field) behind `dyn SpaceAlgorithm`.
    fn as_any(&self) -> &dyn core::any::Any;

    /// Mutable counterpart of [`as_any`](Self::as_any).
    fn as_any_mut(&mut self) -> &mut dyn core::any::Any;
}
