// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error type shared by fields and grids.

use thiserror::Error;

/// Failures surfaced by [`VectorField`](crate::VectorField) and
/// [`SpaceGrid`](crate::SpaceGrid) accessors.
///
/// Every variant carries the observed and required quantities so callers can
/// report the mismatch without re-deriving it.
#[derive(Debug, Error)]
pub enum FieldError {
    /// A value slice had the wrong length for this field.
    #[error("value dimension {found} does not match required dimension {expected}")]
    ValueDimension {
        /// Required per-cell value length.
        expected: usize,
        /// Length of the supplied value.
        found: usize,
    },

    /// An index array (or position) had the wrong number of axes.
    #[error("index dimension {found} does not match field dimension {expected}")]
    IndexDimension {
        /// Number of field axes.
        expected: usize,
        /// Number of supplied components.
        found: usize,
    },

    /// A flat cell index was out of range.
    #[error("cell index {index} exceeds cell count {count}")]
    CellOutOfRange {
        /// Supplied flat index.
        index: usize,
        /// Number of cells in the field.
        count: usize,
    },

    /// A per-axis cell index was out of range.
    #[error("index {index} on axis {axis} exceeds subdivision count {size}")]
    AxisOutOfRange {
        /// Axis the index applies to.
        axis: usize,
        /// Supplied index on that axis.
        index: usize,
        /// Subdivision count on that axis.
        size: usize,
    },

    /// A field or grid was constructed with a zero-cell axis.
    #[error("subdivision count on axis {axis} must be at least 1")]
    EmptyAxis {
        /// Offending axis.
        axis: usize,
    },

    /// Grid bounds were inverted or degenerate on an axis.
    #[error("on axis {axis}, minimum {min} is not below maximum {max}")]
    InvalidBounds {
        /// Offending axis.
        axis: usize,
        /// Supplied minimum.
        min: f64,
        /// Supplied maximum.
        max: f64,
    },

    /// Two fields that must agree in shape did not.
    #[error("field size {found:?} does not match required size {expected:?}")]
    SizeMismatch {
        /// Required subdivision counts.
        expected: Vec<usize>,
        /// Observed subdivision counts.
        found: Vec<usize>,
    },
}
