// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Client-authored topology with per-tick distance refresh.

use nalgebra::DVector;

use crate::algorithms::{AlgorithmBounds, SpaceAlgorithm};
use crate::error::SpaceError;
use crate::object::{ObjectId, ObjectStore};

/// Keeps whatever relations the client authored and only refreshes their
/// distance and direction from current positions each tick.
///
/// The structure phase is a no-op. A relation whose target has been destroyed
/// is a lookup failure and surfaces as an error.
#[derive(Debug)]
pub struct PermanentNeighborsAlgorithm {
    bounds: AlgorithmBounds,
}

impl PermanentNeighborsAlgorithm {
    /// Unbounded variant for N dimensions.
    pub fn new(dim: usize) -> Self {
        Self {
            bounds: AlgorithmBounds::unbounded(dim),
        }
    }

    /// Bounded variant.
    pub fn bounded(min: DVector<f64>, max: DVector<f64>) -> Result<Self, SpaceError> {
        Ok(Self {
            bounds: AlgorithmBounds::bounded(min, max)?,
        })
    }
}

impl SpaceAlgorithm for PermanentNeighborsAlgorithm {
    fn label(&self) -> &'static str {
        "permanent neighbors"
    }

    fn bounds(&self) -> &AlgorithmBounds {
        &self.bounds
    }

    fn bounds_mut(&mut self) -> &mut AlgorithmBounds {
        &mut self.bounds
    }

    fn update_structure(
        &mut self,
        _store: &mut ObjectStore,
        _space: &str,
        _visible: &[ObjectId],
    ) -> Result<(), SpaceError> {
        Ok(())
    }

    fn update_neighbors(
        &mut self,
        store: &mut ObjectStore,
        space: &str,
        capable: &[ObjectId],
    ) -> Result<(), SpaceError> {
        for &id in capable {
            let object = store.object(id)?;
            let source_pos = object.position().clone_owned();
            let targets: Vec<ObjectId> = object
                .neighbor_group(space)?
                .relations()
                .iter()
                .map(|r| r.target())
                .collect();

            for (index, target) in targets.into_iter().enumerate() {
                let direction = store.object(target)?.position() - &source_pos;
                let distance = direction.norm();
                let group = store.object_mut(id)?.neighbor_group_mut(space)?;
                let relation = &mut group.relations_mut()[index];
                relation.set_direction(direction)?;
                relation.set_distance(distance);
            }
            // Refreshing distances in place can break the order invariant.
            store
                .object_mut(id)?
                .neighbor_group_mut(space)?
                .sort_by_distance();
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn core::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
        self
    }
}
