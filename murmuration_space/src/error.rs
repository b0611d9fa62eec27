// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error type for the neighborhood engine.
//!
//! Every operation either completes or surfaces one of these variants,
//! annotated with the quantities that disagreed. Failures inside an update
//! tick are wrapped in [`SpaceError::UpdatePhase`] with the space name and
//! phase attached; the original cause stays reachable through
//! `std::error::Error::source`.

use thiserror::Error;

use murmuration_field::FieldError;

/// Failures surfaced by spaces, objects, algorithms, and the manager.
#[derive(Debug, Error)]
pub enum SpaceError {
    /// A position, direction, or value disagreed with a bound dimension.
    #[error("dimension {found} does not match required dimension {expected}")]
    DimensionMismatch {
        /// Required dimension.
        expected: usize,
        /// Observed dimension.
        found: usize,
    },

    /// No space registered under this name.
    #[error("space `{0}` not found")]
    SpaceNotFound(String),

    /// A space with this name is already registered.
    #[error("space `{0}` already registered")]
    DuplicateSpace(String),

    /// The object has no proxy in the named space.
    #[error("object not stored in space `{space}`")]
    ObjectNotInSpace {
        /// Space that was searched.
        space: String,
    },

    /// The object already has a proxy in the named space.
    #[error("object already stored in space `{space}`")]
    DuplicateObject {
        /// Space the object was added to twice.
        space: String,
    },

    /// The object carries no neighbor group for the named space.
    #[error("object has no neighbor group for space `{space}`")]
    GroupNotFound {
        /// Space name used for the lookup.
        space: String,
    },

    /// A stale or never-issued object handle was dereferenced.
    #[error("stale or unknown object handle")]
    ObjectNotFound,

    /// The object still participates in spaces and cannot be destroyed.
    #[error("object still participates in {count} space(s)")]
    ObjectInSpaces {
        /// Number of spaces still holding the object.
        count: usize,
    },

    /// The operation needs an admission policy but the group has none.
    #[error("object cannot have neighbors in this space")]
    NoPolicy,

    /// An indexed accessor ran past the end of a sequence.
    #[error("index {index} exceeds length {len}")]
    IndexOutOfRange {
        /// Supplied index.
        index: usize,
        /// Sequence length.
        len: usize,
    },

    /// Resize was called on an algorithm with construction-fixed bounds.
    #[error("bounds are fixed and cannot be resized")]
    FixedBounds,

    /// Bounds were inverted on an axis.
    #[error("on axis {axis}, minimum {min} exceeds maximum {max}")]
    InvalidBounds {
        /// Offending axis.
        axis: usize,
        /// Supplied minimum.
        min: f64,
        /// Supplied maximum.
        max: f64,
    },

    /// The selected configuration does not support this dimension.
    #[error("{operation} is not supported at dimension {dim}")]
    UnsupportedDimension {
        /// Operation or mode that rejected the dimension.
        operation: &'static str,
        /// Offending dimension.
        dim: usize,
    },

    /// A relation would point from an object to itself.
    #[error("relation source and target are the same object")]
    SelfNeighbor,

    /// The operation requires a shape-carrying object.
    #[error("object does not carry a shape")]
    NotAShape,

    /// The shape transform is singular and cannot be inverted.
    #[error("shape transform is singular (zero scale?)")]
    SingularTransform,

    /// A failure inside an update tick, annotated with its space and phase.
    #[error("failed to {phase} in space `{space}`")]
    UpdatePhase {
        /// Space whose update failed.
        space: String,
        /// Phase that raised the inner error.
        phase: &'static str,
        /// Original cause.
        #[source]
        source: Box<SpaceError>,
    },

    /// A grid or field operation failed.
    #[error(transparent)]
    Field(#[from] FieldError),
}

impl SpaceError {
    /// Wrap an error with the space name and update phase that raised it.
    pub(crate) fn in_phase(self, space: &str, phase: &'static str) -> Self {
        Self::UpdatePhase {
            space: space.to_owned(),
            phase,
            source: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn phase_wrapping_keeps_the_cause() {
        let inner = SpaceError::DimensionMismatch {
            expected: 3,
            found: 2,
        };
        let wrapped = inner.in_phase("flock", "update structure");
        assert_eq!(
            wrapped.to_string(),
            "failed to update structure in space `flock`"
        );
        let source = wrapped.source().expect("cause must stay attached");
        assert_eq!(
            source.to_string(),
            "dimension 2 does not match required dimension 3"
        );
    }
}
