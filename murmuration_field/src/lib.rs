// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Murmuration Field: dense N-dimensional vector fields with world-mapped access.
//!
//! Murmuration Field is the storage substrate for grid-based neighborhood
//! computation.
//!
//! - [`VectorField`]: a flat-stored N-dimensional lattice of fixed-length
//!   `f64` values with reads and writes by flat index, per-axis index, or
//!   real-valued coordinate (multi-linear interpolation and splatting).
//! - [`SpaceGrid`]: a `VectorField` mapped onto an axis-aligned world box,
//!   converting world positions to cells (floor, clamped), to real-valued
//!   lattice coordinates, and back to cell centres or lattice vertices.
//! - [`IndexWalk`]: an explicit, bounded odometer over inclusive index boxes,
//!   in storage order.
//!
//! The crate is deliberately free of any spatial-engine types; higher layers
//! decide what the per-cell vectors mean.
//!
//! # Example
//!
//! ```rust
//! use murmuration_field::{GridValueSetMode, SpaceGrid};
//!
//! // A 4×4 scalar grid over the unit square.
//! let mut grid = SpaceGrid::new(1, &[4, 4], &[0.0, 0.0], &[1.0, 1.0]).unwrap();
//!
//! // Write interpolated mass near the centre, then read it back.
//! grid.add_value(&[0.5, 0.5], &[1.0], GridValueSetMode::Interpol).unwrap();
//! let mut out = [0.0];
//! grid.sample(&[0.5, 0.5], &mut out).unwrap();
//! assert!(out[0] > 0.0);
//!
//! // Cell lookup floors and clamps.
//! assert_eq!(grid.position_to_cell(&[0.1, 0.95]).unwrap(), vec![0, 3]);
//! ```
//!
//! ### Float semantics
//!
//! Coordinates are assumed finite (no NaNs). Out-of-range positions clamp to
//! the lattice rather than erroring; dimension mismatches always error.

pub mod error;
pub mod field;
pub mod grid;

pub use error::FieldError;
pub use field::{IndexWalk, VectorField};
pub use grid::{GridValueSetMode, SpaceGrid};
