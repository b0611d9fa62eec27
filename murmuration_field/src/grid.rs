// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! World-bounds-mapped grid over a [`VectorField`].

use crate::error::FieldError;
use crate::field::VectorField;

/// How a world-position write lands in the lattice.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GridValueSetMode {
    /// Write only the cell containing the position.
    Nearest,
    /// Distribute the write over the bracketing cells by interpolation weight.
    Interpol,
}

/// An axis-aligned world box `[min, max]` partitioned into a cartesian cell
/// lattice, each cell holding a fixed-length value vector.
///
/// Two index conventions coexist, both taken from the sampling rules of the
/// field it wraps:
/// - *Cells*: integer indices obtained by flooring
///   `(p - min) / (max - min) · n`, clamped to `[0, n - 1]`. A cell's
///   representative position is its centre.
/// - *Vertices*: the interpolation lattice, where vertex `g` sits at
///   `min + g · (max - min) / (n - 1)`. Real-valued grid coordinates and all
///   interpolated reads and writes live in this space.
#[derive(Clone)]
pub struct SpaceGrid {
    grid_dim: usize,
    value_dim: usize,
    min: Vec<f64>,
    max: Vec<f64>,
    scale: Vec<f64>,
    field: VectorField,
}

impl SpaceGrid {
    /// Create a zero-filled grid.
    pub fn new(
        value_dim: usize,
        subdivisions: &[usize],
        min: &[f64],
        max: &[f64],
    ) -> Result<Self, FieldError> {
        let grid_dim = subdivisions.len();
        if min.len() != grid_dim {
            return Err(FieldError::IndexDimension {
                expected: grid_dim,
                found: min.len(),
            });
        }
        if max.len() != grid_dim {
            return Err(FieldError::IndexDimension {
                expected: grid_dim,
                found: max.len(),
            });
        }
        let field = VectorField::new(subdivisions, value_dim)?;
        let scale = Self::position_scale(subdivisions, min, max)?;
        Ok(Self {
            grid_dim,
            value_dim,
            min: min.to_vec(),
            max: max.to_vec(),
            scale,
            field,
        })
    }

    /// Wrap an existing field in world bounds.
    pub fn from_field(field: VectorField, min: &[f64], max: &[f64]) -> Result<Self, FieldError> {
        let grid_dim = field.dim();
        if min.len() != grid_dim {
            return Err(FieldError::IndexDimension {
                expected: grid_dim,
                found: min.len(),
            });
        }
        if max.len() != grid_dim {
            return Err(FieldError::IndexDimension {
                expected: grid_dim,
                found: max.len(),
            });
        }
        let scale = Self::position_scale(field.size(), min, max)?;
        Ok(Self {
            grid_dim,
            value_dim: field.value_dim(),
            min: min.to_vec(),
            max: max.to_vec(),
            scale,
            field,
        })
    }

    fn position_scale(size: &[usize], min: &[f64], max: &[f64]) -> Result<Vec<f64>, FieldError> {
        let mut scale = Vec::with_capacity(size.len());
        for axis in 0..size.len() {
            if !(min[axis] < max[axis]) {
                return Err(FieldError::InvalidBounds {
                    axis,
                    min: min[axis],
                    max: max[axis],
                });
            }
            scale.push((size[axis].saturating_sub(1)) as f64 / (max[axis] - min[axis]));
        }
        Ok(scale)
    }

    /// Number of grid axes.
    pub fn dim(&self) -> usize {
        self.grid_dim
    }

    /// Per-cell value length.
    pub fn value_dim(&self) -> usize {
        self.value_dim
    }

    /// Subdivision counts per axis.
    pub fn subdivisions(&self) -> &[usize] {
        self.field.size()
    }

    /// Minimum world corner.
    pub fn min(&self) -> &[f64] {
        &self.min
    }

    /// Maximum world corner.
    pub fn max(&self) -> &[f64] {
        &self.max
    }

    /// Underlying field.
    pub fn field(&self) -> &VectorField {
        &self.field
    }

    /// Mutable access to the underlying field, for shared consumers.
    pub fn field_mut(&mut self) -> &mut VectorField {
        &mut self.field
    }

    /// Move the world box, keeping the lattice.
    pub fn set_bounds(&mut self, min: &[f64], max: &[f64]) -> Result<(), FieldError> {
        if min.len() != self.grid_dim {
            return Err(FieldError::IndexDimension {
                expected: self.grid_dim,
                found: min.len(),
            });
        }
        if max.len() != self.grid_dim {
            return Err(FieldError::IndexDimension {
                expected: self.grid_dim,
                found: max.len(),
            });
        }
        self.scale = Self::position_scale(self.field.size(), min, max)?;
        self.min = min.to_vec();
        self.max = max.to_vec();
        Ok(())
    }

    /// Cell index containing a world position, floor-clamped to the lattice.
    pub fn position_to_cell(&self, position: &[f64]) -> Result<Vec<usize>, FieldError> {
        self.check_position(position)?;
        let size = self.field.size();
        let mut index = vec![0_usize; self.grid_dim];
        for axis in 0..self.grid_dim {
            index[axis] = self.cell_on_axis(axis, position[axis], size[axis]);
        }
        Ok(index)
    }

    /// Flat cell index containing a world position.
    pub fn position_to_flat(&self, position: &[f64]) -> Result<usize, FieldError> {
        let index = self.position_to_cell(position)?;
        self.field.flat_index(&index)
    }

    /// Real-valued vertex coordinate of a world position, clamped to
    /// `[0, n - 1]` per axis.
    pub fn position_to_coord(&self, position: &[f64]) -> Result<Vec<f64>, FieldError> {
        self.check_position(position)?;
        let size = self.field.size();
        let mut coord = vec![0.0_f64; self.grid_dim];
        for axis in 0..self.grid_dim {
            let top = (size[axis] - 1) as f64;
            coord[axis] = ((position[axis] - self.min[axis]) * self.scale[axis]).clamp(0.0, top);
        }
        Ok(coord)
    }

    /// World position of a cell centre.
    pub fn cell_to_position(&self, index: &[usize]) -> Result<Vec<f64>, FieldError> {
        self.field.flat_index(index)?;
        let size = self.field.size();
        let mut position = vec![0.0_f64; self.grid_dim];
        for axis in 0..self.grid_dim {
            position[axis] = self.min[axis]
                + (index[axis] as f64 + 0.5) * (self.max[axis] - self.min[axis])
                    / size[axis] as f64;
        }
        Ok(position)
    }

    /// World position of the centre of a real-valued cell coordinate.
    pub fn coord_to_centre(&self, coord: &[f64]) -> Result<Vec<f64>, FieldError> {
        if coord.len() != self.grid_dim {
            return Err(FieldError::IndexDimension {
                expected: self.grid_dim,
                found: coord.len(),
            });
        }
        let size = self.field.size();
        let mut position = vec![0.0_f64; self.grid_dim];
        for axis in 0..self.grid_dim {
            position[axis] = self.min[axis]
                + (coord[axis] + 0.5) * (self.max[axis] - self.min[axis]) / size[axis] as f64;
        }
        Ok(position)
    }

    /// World position of an interpolation-lattice vertex.
    pub fn vertex_to_position(&self, vertex: &[usize]) -> Result<Vec<f64>, FieldError> {
        self.field.flat_index(vertex)?;
        let size = self.field.size();
        let mut position = vec![0.0_f64; self.grid_dim];
        for axis in 0..self.grid_dim {
            let span = (size[axis].saturating_sub(1)).max(1) as f64;
            position[axis] = self.min[axis]
                + vertex[axis] as f64 * (self.max[axis] - self.min[axis]) / span;
        }
        Ok(position)
    }

    /// World position of the cell at a flat index (centre).
    pub fn flat_to_position(&self, flat: usize) -> Result<Vec<f64>, FieldError> {
        let index = self.field.axis_index(flat)?;
        self.cell_to_position(&index)
    }

    /// Value of the cell containing a world position.
    pub fn value_at_position(&self, position: &[f64]) -> Result<&[f64], FieldError> {
        let flat = self.position_to_flat(position)?;
        self.field.value(flat)
    }

    /// Interpolated value at a world position.
    pub fn sample(&self, position: &[f64], out: &mut [f64]) -> Result<(), FieldError> {
        let coord = self.position_to_coord(position)?;
        self.field.sample(&coord, out)
    }

    /// Overwrite the lattice at a world position.
    pub fn set_value(
        &mut self,
        position: &[f64],
        value: &[f64],
        mode: GridValueSetMode,
    ) -> Result<(), FieldError> {
        match mode {
            GridValueSetMode::Nearest => {
                let flat = self.position_to_flat(position)?;
                self.field.set(flat, value)
            }
            GridValueSetMode::Interpol => {
                let coord = self.position_to_coord(position)?;
                self.field.splat_set(&coord, value)
            }
        }
    }

    /// Add to the lattice at a world position.
    pub fn add_value(
        &mut self,
        position: &[f64],
        value: &[f64],
        mode: GridValueSetMode,
    ) -> Result<(), FieldError> {
        match mode {
            GridValueSetMode::Nearest => {
                let flat = self.position_to_flat(position)?;
                self.field.add(flat, value)
            }
            GridValueSetMode::Interpol => {
                let coord = self.position_to_coord(position)?;
                self.field.splat_add(&coord, value)
            }
        }
    }

    /// Overwrite every cell.
    pub fn fill(&mut self, value: &[f64]) -> Result<(), FieldError> {
        self.field.fill(value)
    }

    fn cell_on_axis(&self, axis: usize, p: f64, n: usize) -> usize {
        if p <= self.min[axis] {
            return 0;
        }
        if p >= self.max[axis] {
            return n - 1;
        }
        let t = (p - self.min[axis]) / (self.max[axis] - self.min[axis]) * n as f64;
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "t is within (0, n) here"
        )]
        let cell = t as usize;
        cell.min(n - 1)
    }

    fn check_position(&self, position: &[f64]) -> Result<(), FieldError> {
        if position.len() != self.grid_dim {
            return Err(FieldError::IndexDimension {
                expected: self.grid_dim,
                found: position.len(),
            });
        }
        Ok(())
    }
}

impl core::fmt::Debug for SpaceGrid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SpaceGrid")
            .field("grid_dim", &self.grid_dim)
            .field("value_dim", &self.value_dim)
            .field("subdivisions", &self.field.size())
            .field("min", &self.min)
            .field("max", &self.max)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_2x2() -> SpaceGrid {
        let mut grid = SpaceGrid::new(2, &[2, 2], &[0.0, 0.0], &[1.0, 1.0]).unwrap();
        grid.field_mut().set_at(&[0, 0], &[5.0, 0.0]).unwrap();
        grid.field_mut().set_at(&[1, 1], &[0.0, 7.0]).unwrap();
        grid
    }

    #[test]
    fn position_to_cell_floors_and_clamps() {
        let grid = grid_2x2();
        assert_eq!(grid.position_to_cell(&[0.1, 0.1]).unwrap(), vec![0, 0]);
        assert_eq!(grid.position_to_cell(&[0.6, 0.4]).unwrap(), vec![1, 0]);
        // At and beyond the bounds the index clamps to the lattice.
        assert_eq!(grid.position_to_cell(&[-3.0, 2.0]).unwrap(), vec![0, 1]);
        assert_eq!(grid.position_to_cell(&[1.0, 1.0]).unwrap(), vec![1, 1]);
    }

    #[test]
    fn cell_value_lookup_matches_containing_cell() {
        let grid = grid_2x2();
        assert_eq!(grid.value_at_position(&[0.1, 0.1]).unwrap(), &[5.0, 0.0]);
        assert_eq!(grid.value_at_position(&[0.9, 0.9]).unwrap(), &[0.0, 7.0]);
    }

    #[test]
    fn cell_centres() {
        let grid = SpaceGrid::new(1, &[4, 2], &[0.0, -1.0], &[4.0, 1.0]).unwrap();
        assert_eq!(grid.cell_to_position(&[0, 0]).unwrap(), vec![0.5, -0.5]);
        assert_eq!(grid.cell_to_position(&[3, 1]).unwrap(), vec![3.5, 0.5]);
    }

    #[test]
    fn vertex_lattice_spans_bounds() {
        let grid = SpaceGrid::new(1, &[3], &[0.0], &[2.0]).unwrap();
        assert_eq!(grid.vertex_to_position(&[0]).unwrap(), vec![0.0]);
        assert_eq!(grid.vertex_to_position(&[1]).unwrap(), vec![1.0]);
        assert_eq!(grid.vertex_to_position(&[2]).unwrap(), vec![2.0]);

        let coord = grid.position_to_coord(&[1.5]).unwrap();
        assert!((coord[0] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn interpolated_sample_at_bounds_matches_edge_cells() {
        let mut grid = SpaceGrid::new(1, &[2], &[0.0], &[1.0]).unwrap();
        grid.field_mut().set_at(&[0], &[1.0]).unwrap();
        grid.field_mut().set_at(&[1], &[3.0]).unwrap();

        let mut out = [0.0];
        grid.sample(&[0.0], &mut out).unwrap();
        assert!((out[0] - 1.0).abs() < 1e-12);
        grid.sample(&[1.0], &mut out).unwrap();
        assert!((out[0] - 3.0).abs() < 1e-12);
        grid.sample(&[0.5], &mut out).unwrap();
        assert!((out[0] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn set_value_modes() {
        let mut grid = SpaceGrid::new(1, &[2], &[0.0], &[1.0]).unwrap();
        grid.set_value(&[0.9], &[4.0], GridValueSetMode::Nearest)
            .unwrap();
        assert_eq!(grid.field().value_at(&[1]).unwrap(), &[4.0]);

        grid.fill(&[0.0]).unwrap();
        grid.add_value(&[0.25], &[4.0], GridValueSetMode::Interpol)
            .unwrap();
        assert!((grid.field().value_at(&[0]).unwrap()[0] - 3.0).abs() < 1e-12);
        assert!((grid.field().value_at(&[1]).unwrap()[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn invalid_bounds_are_rejected() {
        assert!(matches!(
            SpaceGrid::new(1, &[2], &[1.0], &[0.0]),
            Err(FieldError::InvalidBounds { axis: 0, .. })
        ));
        let mut grid = SpaceGrid::new(1, &[2, 2], &[0.0, 0.0], &[1.0, 1.0]).unwrap();
        assert!(grid.set_bounds(&[0.0, 0.0], &[1.0, 0.0]).is_err());
        assert!(grid.position_to_cell(&[0.5]).is_err());
    }
}
