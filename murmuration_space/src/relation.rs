// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Directed neighbor relation records.

use nalgebra::DVector;

use crate::error::SpaceError;
use crate::object::ObjectId;

/// One directed neighbor record `source → target`.
///
/// `direction` points from the source's position to the target's and
/// `distance` is its norm. `value` equals `direction` unless the producing
/// algorithm overrides it (grid modes store cell values there).
#[derive(Clone, Debug)]
pub struct NeighborRelation {
    source: ObjectId,
    target: ObjectId,
    value: DVector<f64>,
    direction: DVector<f64>,
    distance: f64,
}

impl NeighborRelation {
    /// Create a relation with `value` defaulting to `direction`.
    pub fn new(
        source: ObjectId,
        target: ObjectId,
        distance: f64,
        direction: DVector<f64>,
    ) -> Result<Self, SpaceError> {
        if source == target {
            return Err(SpaceError::SelfNeighbor);
        }
        Ok(Self {
            source,
            target,
            value: direction.clone(),
            direction,
            distance,
        })
    }

    /// Create a relation carrying an explicit value.
    pub fn with_value(
        source: ObjectId,
        target: ObjectId,
        value: DVector<f64>,
        direction: DVector<f64>,
        distance: f64,
    ) -> Result<Self, SpaceError> {
        if source == target {
            return Err(SpaceError::SelfNeighbor);
        }
        Ok(Self {
            source,
            target,
            value,
            direction,
            distance,
        })
    }

    /// Owning object.
    pub fn source(&self) -> ObjectId {
        self.source
    }

    /// Neighbor object.
    pub fn target(&self) -> ObjectId {
        self.target
    }

    /// Application value carried by the relation.
    pub fn value(&self) -> &DVector<f64> {
        &self.value
    }

    /// Vector from source to target.
    pub fn direction(&self) -> &DVector<f64> {
        &self.direction
    }

    /// Distance from source to target.
    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// Replace the value; its dimension must not change.
    pub fn set_value(&mut self, value: DVector<f64>) -> Result<(), SpaceError> {
        if value.len() != self.value.len() {
            return Err(SpaceError::DimensionMismatch {
                expected: self.value.len(),
                found: value.len(),
            });
        }
        self.value = value;
        Ok(())
    }

    /// Replace the direction; its dimension must not change.
    pub fn set_direction(&mut self, direction: DVector<f64>) -> Result<(), SpaceError> {
        if direction.len() != self.direction.len() {
            return Err(SpaceError::DimensionMismatch {
                expected: self.direction.len(),
                found: direction.len(),
            });
        }
        self.direction = direction;
        Ok(())
    }

    /// Replace the distance.
    pub fn set_distance(&mut self, distance: f64) {
        self.distance = distance;
    }
}
