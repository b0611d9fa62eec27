// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dense N-dimensional vector field with flat storage and interpolated access.

use crate::error::FieldError;

/// Dense field of fixed-length `f64` values over an N-dimensional cell lattice.
///
/// Cells are stored in one flat buffer, axis 0 fastest. A field of size
/// `[n_0, …, n_{D-1}]` with value length `V` holds `n_0 · … · n_{D-1}` cells
/// and `V` floats per cell.
///
/// Reads and writes exist at three granularities:
/// - by flat cell index ([`value`](Self::value), [`set`](Self::set), [`add`](Self::add)),
/// - by per-axis cell index ([`value_at`](Self::value_at), [`set_at`](Self::set_at), [`add_at`](Self::add_at)),
/// - at a real-valued lattice coordinate with multi-linear weighting
///   ([`sample`](Self::sample), [`splat_set`](Self::splat_set), [`splat_add`](Self::splat_add)).
#[derive(Clone)]
pub struct VectorField {
    size: Vec<usize>,
    offsets: Vec<usize>,
    value_dim: usize,
    data: Vec<f64>,
}

impl VectorField {
    /// Create a zero-filled field.
    ///
    /// `size` lists the subdivision count per axis (each at least 1),
    /// `value_dim` the per-cell value length.
    pub fn new(size: &[usize], value_dim: usize) -> Result<Self, FieldError> {
        let mut offsets = Vec::with_capacity(size.len());
        let mut count = 1_usize;
        for (axis, &n) in size.iter().enumerate() {
            if n == 0 {
                return Err(FieldError::EmptyAxis { axis });
            }
            offsets.push(count);
            count *= n;
        }
        Ok(Self {
            size: size.to_vec(),
            offsets,
            value_dim,
            data: vec![0.0; count * value_dim],
        })
    }

    /// Number of field axes.
    pub fn dim(&self) -> usize {
        self.size.len()
    }

    /// Per-cell value length.
    pub fn value_dim(&self) -> usize {
        self.value_dim
    }

    /// Subdivision counts per axis.
    pub fn size(&self) -> &[usize] {
        &self.size
    }

    /// Flat-index stride per axis (axis 0 fastest).
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Total number of cells.
    pub fn cell_count(&self) -> usize {
        self.data.len() / self.value_dim.max(1)
    }

    /// Raw storage, cell-major, `value_dim` floats per cell.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Mutable raw storage.
    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Convert a per-axis index to its flat cell index.
    pub fn flat_index(&self, index: &[usize]) -> Result<usize, FieldError> {
        self.check_index(index)?;
        Ok(index
            .iter()
            .zip(&self.offsets)
            .map(|(i, o)| i * o)
            .sum())
    }

    /// Convert a flat cell index back to per-axis indices.
    pub fn axis_index(&self, mut flat: usize) -> Result<Vec<usize>, FieldError> {
        if flat >= self.cell_count() {
            return Err(FieldError::CellOutOfRange {
                index: flat,
                count: self.cell_count(),
            });
        }
        let mut index = vec![0; self.size.len()];
        for (axis, &n) in self.size.iter().enumerate() {
            index[axis] = flat % n;
            flat /= n;
        }
        Ok(index)
    }

    /// Value slice of the cell at a flat index.
    pub fn value(&self, flat: usize) -> Result<&[f64], FieldError> {
        if flat >= self.cell_count() {
            return Err(FieldError::CellOutOfRange {
                index: flat,
                count: self.cell_count(),
            });
        }
        let start = flat * self.value_dim;
        Ok(&self.data[start..start + self.value_dim])
    }

    /// Value slice of the cell at a per-axis index.
    pub fn value_at(&self, index: &[usize]) -> Result<&[f64], FieldError> {
        let flat = self.flat_index(index)?;
        self.value(flat)
    }

    /// Overwrite the cell at a flat index.
    pub fn set(&mut self, flat: usize, value: &[f64]) -> Result<(), FieldError> {
        self.check_value(value)?;
        if flat >= self.cell_count() {
            return Err(FieldError::CellOutOfRange {
                index: flat,
                count: self.cell_count(),
            });
        }
        let start = flat * self.value_dim;
        self.data[start..start + self.value_dim].copy_from_slice(value);
        Ok(())
    }

    /// Add to the cell at a flat index.
    pub fn add(&mut self, flat: usize, value: &[f64]) -> Result<(), FieldError> {
        self.check_value(value)?;
        if flat >= self.cell_count() {
            return Err(FieldError::CellOutOfRange {
                index: flat,
                count: self.cell_count(),
            });
        }
        let start = flat * self.value_dim;
        for (slot, v) in self.data[start..start + self.value_dim]
            .iter_mut()
            .zip(value)
        {
            *slot += v;
        }
        Ok(())
    }

    /// Overwrite the cell at a per-axis index.
    pub fn set_at(&mut self, index: &[usize], value: &[f64]) -> Result<(), FieldError> {
        let flat = self.flat_index(index)?;
        self.set(flat, value)
    }

    /// Add to the cell at a per-axis index.
    pub fn add_at(&mut self, index: &[usize], value: &[f64]) -> Result<(), FieldError> {
        let flat = self.flat_index(index)?;
        self.add(flat, value)
    }

    /// Overwrite every cell with `value`.
    pub fn fill(&mut self, value: &[f64]) -> Result<(), FieldError> {
        self.check_value(value)?;
        for chunk in self.data.chunks_exact_mut(self.value_dim) {
            chunk.copy_from_slice(value);
        }
        Ok(())
    }

    /// Add `value` to every cell.
    pub fn add_all(&mut self, value: &[f64]) -> Result<(), FieldError> {
        self.check_value(value)?;
        for chunk in self.data.chunks_exact_mut(self.value_dim) {
            for (slot, v) in chunk.iter_mut().zip(value) {
                *slot += v;
            }
        }
        Ok(())
    }

    /// Multi-linear sample at a real-valued lattice coordinate.
    ///
    /// `coord` lives in lattice space: component `i` ranges over
    /// `[0, size[i] - 1]` and is clamped to it. The result is the weighted
    /// blend of the `2^D` bracketing cells, written into `out`.
    pub fn sample(&self, coord: &[f64], out: &mut [f64]) -> Result<(), FieldError> {
        self.check_coord(coord)?;
        self.check_value(out)?;
        out.fill(0.0);
        self.for_each_corner(coord, |field, flat, weight| {
            let start = flat * field.value_dim;
            for (slot, v) in out.iter_mut().zip(&field.data[start..start + field.value_dim]) {
                *slot += weight * v;
            }
        });
        Ok(())
    }

    /// Weighted overwrite of the `2^D` cells bracketing `coord`.
    ///
    /// Each bracketing cell receives `value` scaled by its interpolation
    /// weight, replacing the previous content.
    pub fn splat_set(&mut self, coord: &[f64], value: &[f64]) -> Result<(), FieldError> {
        self.check_coord(coord)?;
        self.check_value(value)?;
        let mut writes: Vec<(usize, f64)> = Vec::with_capacity(1 << self.dim());
        self.for_each_corner(coord, |_, flat, weight| writes.push((flat, weight)));
        for (flat, weight) in writes {
            let start = flat * self.value_dim;
            for (slot, v) in self.data[start..start + self.value_dim].iter_mut().zip(value) {
                *slot = weight * v;
            }
        }
        Ok(())
    }

    /// Weighted additive write to the `2^D` cells bracketing `coord`.
    pub fn splat_add(&mut self, coord: &[f64], value: &[f64]) -> Result<(), FieldError> {
        self.check_coord(coord)?;
        self.check_value(value)?;
        let mut writes: Vec<(usize, f64)> = Vec::with_capacity(1 << self.dim());
        self.for_each_corner(coord, |_, flat, weight| writes.push((flat, weight)));
        for (flat, weight) in writes {
            let start = flat * self.value_dim;
            for (slot, v) in self.data[start..start + self.value_dim].iter_mut().zip(value) {
                *slot += weight * v;
            }
        }
        Ok(())
    }

    /// Visit the `2^D` bracketing cells of `coord` with their weights.
    ///
    /// `coord` components are clamped to `[0, n - 1]` first; corner indices
    /// saturate at the upper lattice edge so weights still sum to one.
    fn for_each_corner(&self, coord: &[f64], mut visit: impl FnMut(&Self, usize, f64)) {
        let dim = self.dim();
        let mut base = vec![0_usize; dim];
        let mut frac = vec![0.0_f64; dim];
        for axis in 0..dim {
            let top = (self.size[axis] - 1) as f64;
            let c = coord[axis].clamp(0.0, top);
            let floor = c.floor();
            #[allow(
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss,
                reason = "clamped to [0, n - 1] above"
            )]
            {
                base[axis] = floor as usize;
            }
            frac[axis] = c - floor;
        }
        for mask in 0..(1_usize << dim) {
            let mut flat = 0_usize;
            let mut weight = 1.0_f64;
            for axis in 0..dim {
                let upper = mask & (1 << axis) != 0;
                let idx = if upper {
                    (base[axis] + 1).min(self.size[axis] - 1)
                } else {
                    base[axis]
                };
                weight *= if upper { frac[axis] } else { 1.0 - frac[axis] };
                flat += idx * self.offsets[axis];
            }
            if weight != 0.0 {
                visit(self, flat, weight);
            }
        }
    }

    fn check_value(&self, value: &[f64]) -> Result<(), FieldError> {
        if value.len() != self.value_dim {
            return Err(FieldError::ValueDimension {
                expected: self.value_dim,
                found: value.len(),
            });
        }
        Ok(())
    }

    fn check_coord(&self, coord: &[f64]) -> Result<(), FieldError> {
        if coord.len() != self.size.len() {
            return Err(FieldError::IndexDimension {
                expected: self.size.len(),
                found: coord.len(),
            });
        }
        Ok(())
    }

    fn check_index(&self, index: &[usize]) -> Result<(), FieldError> {
        if index.len() != self.size.len() {
            return Err(FieldError::IndexDimension {
                expected: self.size.len(),
                found: index.len(),
            });
        }
        for (axis, (&i, &n)) in index.iter().zip(&self.size).enumerate() {
            if i >= n {
                return Err(FieldError::AxisOutOfRange {
                    axis,
                    index: i,
                    size: n,
                });
            }
        }
        Ok(())
    }
}

impl core::fmt::Debug for VectorField {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VectorField")
            .field("size", &self.size)
            .field("value_dim", &self.value_dim)
            .field("cells", &self.cell_count())
            .finish_non_exhaustive()
    }
}

/// Odometer over an inclusive N-dimensional index box.
///
/// Yields every per-axis index from `start` to `end` (both inclusive), axis 0
/// advancing fastest, matching the flat storage order of [`VectorField`].
/// Replaces multi-condition nested loops with one explicit, bounded walk.
#[derive(Clone, Debug)]
pub struct IndexWalk {
    start: Vec<usize>,
    end: Vec<usize>,
    current: Vec<usize>,
    done: bool,
}

impl IndexWalk {
    /// Walk `start..=end` per axis. Empty on any inverted axis.
    pub fn new(start: &[usize], end: &[usize]) -> Self {
        debug_assert_eq!(start.len(), end.len(), "axis counts must match");
        let done = start.is_empty() || start.iter().zip(end).any(|(s, e)| s > e);
        Self {
            start: start.to_vec(),
            end: end.to_vec(),
            current: start.to_vec(),
            done,
        }
    }

    /// Number of cells the walk covers.
    pub fn len(&self) -> usize {
        if self.start.iter().zip(&self.end).any(|(s, e)| s > e) {
            return 0;
        }
        self.start
            .iter()
            .zip(&self.end)
            .map(|(s, e)| e - s + 1)
            .product()
    }

    /// True when the walk covers no cells.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Iterator for IndexWalk {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let out = self.current.clone();
        let mut axis = 0;
        loop {
            if axis == self.current.len() {
                self.done = true;
                break;
            }
            if self.current[axis] < self.end[axis] {
                self.current[axis] += 1;
                break;
            }
            self.current[axis] = self.start[axis];
            axis += 1;
        }
        Some(out)
    }
}
