// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dense-field algorithm: synthetic neighbors sampled from a grid, with
//! optional write-back of neighbor values into the cells.

use nalgebra::DVector;

use murmuration_field::{GridValueSetMode, IndexWalk, SpaceGrid};

use crate::algorithms::{AlgorithmBounds, SpaceAlgorithm};
use crate::error::SpaceError;
use crate::object::{ObjectId, ObjectStore, SpaceObject};
use crate::relation::NeighborRelation;

/// How cell values become synthetic neighbors.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GridNeighborMode {
    /// One neighbor at the object's position carrying the containing cell's
    /// value.
    CellLocation,
    /// One neighbor per lattice corner bracketing the object's position,
    /// carrying that corner's value.
    GridLocation,
    /// One neighbor at the object's position carrying the interpolated value.
    AvgLocation,
    /// One neighbor at the value-weighted centroid of the cells within the
    /// search radius. Dimensions 2 and 3 only.
    AvgRegion,
    /// Up to `cap` neighbors at the cells with the largest value magnitude
    /// within the search radius, emitted by descending magnitude.
    PeakSearch,
    /// Like `AvgRegion` over the whole scan box, any dimension.
    CentroidSearch,
}

/// How stored neighbor values write back into the grid during the structure
/// phase.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GridUpdateMode {
    /// No write-back.
    NoUpdate,
    /// Clear the grid, then overwrite each relation's containing cell.
    NearestReplace,
    /// Add each relation's value to its containing cell.
    NearestAdd,
    /// Clear the grid, then splat each relation's value by interpolation.
    AvgReplace,
    /// Splat each relation's value additively.
    AvgAdd,
}

/// Samples a [`SpaceGrid`] into synthetic neighbor relations.
///
/// The neighbor targets the algorithm fabricates live in the object store;
/// the algorithm owns them and replaces the whole set every tick. Objects
/// positioned outside the grid bounds are skipped silently.
pub struct GridAlgorithm {
    bounds: AlgorithmBounds,
    grid: SpaceGrid,
    neighbor_mode: GridNeighborMode,
    update_mode: GridUpdateMode,
    scratch: Vec<ObjectId>,
}

impl GridAlgorithm {
    /// Create the algorithm around a freshly zeroed grid.
    pub fn new(
        value_dim: usize,
        subdivisions: &[usize],
        min: DVector<f64>,
        max: DVector<f64>,
        neighbor_mode: GridNeighborMode,
        update_mode: GridUpdateMode,
    ) -> Result<Self, SpaceError> {
        let grid = SpaceGrid::new(value_dim, subdivisions, min.as_slice(), max.as_slice())?;
        Self::from_grid(grid, neighbor_mode, update_mode)
    }

    /// Wrap an existing grid (for fields shared with other consumers).
    pub fn from_grid(
        grid: SpaceGrid,
        neighbor_mode: GridNeighborMode,
        update_mode: GridUpdateMode,
    ) -> Result<Self, SpaceError> {
        if neighbor_mode == GridNeighborMode::AvgRegion && !matches!(grid.dim(), 2 | 3) {
            return Err(SpaceError::UnsupportedDimension {
                operation: "AvgRegion neighbor mode",
                dim: grid.dim(),
            });
        }
        let bounds = AlgorithmBounds::bounded(
            DVector::from_row_slice(grid.min()),
            DVector::from_row_slice(grid.max()),
        )?;
        Ok(Self {
            bounds,
            grid,
            neighbor_mode,
            update_mode,
            scratch: Vec::new(),
        })
    }

    /// The backing grid.
    pub fn grid(&self) -> &SpaceGrid {
        &self.grid
    }

    /// Mutable access to the backing grid (for seeding values or sharing the
    /// field with other consumers between ticks).
    pub fn grid_mut(&mut self) -> &mut SpaceGrid {
        &mut self.grid
    }

    /// Replace the backing grid; its shape must match.
    pub fn set_grid(&mut self, grid: SpaceGrid) -> Result<(), SpaceError> {
        if grid.dim() != self.grid.dim() {
            return Err(SpaceError::DimensionMismatch {
                expected: self.grid.dim(),
                found: grid.dim(),
            });
        }
        if grid.value_dim() != self.grid.value_dim() {
            return Err(SpaceError::DimensionMismatch {
                expected: self.grid.value_dim(),
                found: grid.value_dim(),
            });
        }
        self.grid = grid;
        Ok(())
    }

    /// Selected neighbor mode.
    pub fn neighbor_mode(&self) -> GridNeighborMode {
        self.neighbor_mode
    }

    /// Selected write-back mode.
    pub fn update_mode(&self) -> GridUpdateMode {
        self.update_mode
    }

    /// Fabricate a target object at `position` and offer the relation to the
    /// source's admission policy.
    fn spawn_and_offer(
        &mut self,
        store: &mut ObjectStore,
        space: &str,
        source: ObjectId,
        position: DVector<f64>,
        value: DVector<f64>,
        direction: DVector<f64>,
        distance: f64,
    ) -> Result<bool, SpaceError> {
        let target = store.insert(SpaceObject::at(position));
        self.scratch.push(target);
        let relation = NeighborRelation::with_value(source, target, value, direction, distance)?;
        store.insert_relation(source, space, relation)
    }

    /// Inclusive cell box covered by `position ± radius`; the whole grid on
    /// an unbounded radius.
    fn scan_box(
        &self,
        position: &DVector<f64>,
        radius: f64,
    ) -> Result<(Vec<usize>, Vec<usize>), SpaceError> {
        if radius < 0.0 {
            let start = vec![0; self.grid.dim()];
            let end: Vec<usize> = self.grid.subdivisions().iter().map(|n| n - 1).collect();
            return Ok((start, end));
        }
        let low = position.add_scalar(-radius);
        let high = position.add_scalar(radius);
        let start = self.grid.position_to_cell(low.as_slice())?;
        let end = self.grid.position_to_cell(high.as_slice())?;
        Ok((start, end))
    }

    /// Shared body of `AvgRegion` and `CentroidSearch`: one neighbor at the
    /// value-weighted centroid of the scanned cells, carrying their mean.
    fn centroid_scan(
        &mut self,
        store: &mut ObjectStore,
        space: &str,
        source: ObjectId,
        position: &DVector<f64>,
        radius: f64,
    ) -> Result<(), SpaceError> {
        let dim = self.grid.dim();
        let value_dim = self.grid.value_dim();
        let (start, end) = self.scan_box(position, radius)?;

        let mut value_sum = vec![0.0; value_dim];
        let mut weighted = vec![0.0; dim];
        let mut total = 0.0;
        let mut count = 0_usize;
        for index in IndexWalk::new(&start, &end) {
            let cell = self.grid.field().value_at(&index)?;
            for (sum, v) in value_sum.iter_mut().zip(cell) {
                *sum += v;
            }
            let cell_sum: f64 = cell.iter().sum();
            total += cell_sum;
            for d in 0..dim {
                weighted[d] += index[d] as f64 * cell_sum;
            }
            count += 1;
        }
        if total <= 0.0 {
            return Ok(());
        }

        let centroid: Vec<f64> = weighted.iter().map(|w| w / total).collect();
        let target_pos = DVector::from_vec(self.grid.coord_to_centre(&centroid)?);
        let mean = DVector::from_vec(
            value_sum
                .iter()
                .map(|v| v / count as f64)
                .collect::<Vec<f64>>(),
        );
        let direction = &target_pos - position;
        let distance = direction.norm();
        self.spawn_and_offer(store, space, source, target_pos, mean, direction, distance)?;
        Ok(())
    }

    fn peak_search(
        &mut self,
        store: &mut ObjectStore,
        space: &str,
        source: ObjectId,
        position: &DVector<f64>,
        radius: f64,
        cap: i32,
    ) -> Result<(), SpaceError> {
        let dim = self.grid.dim();
        let subdivisions = self.grid.subdivisions().to_vec();

        // Cell reach per axis so the query sphere is covered.
        let (start, end) = if radius < 0.0 {
            self.scan_box(position, radius)?
        } else {
            let centre_cell = self.grid.position_to_cell(position.as_slice())?;
            let mut start = vec![0_usize; dim];
            let mut end = vec![0_usize; dim];
            for d in 0..dim {
                let cell_size =
                    (self.grid.max()[d] - self.grid.min()[d]) / subdivisions[d] as f64;
                let reach = ((radius - 0.5 * cell_size) / cell_size).ceil().max(0.0);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    reason = "clamped non-negative and bounded by the lattice"
                )]
                let reach = reach as usize;
                start[d] = centre_cell[d].saturating_sub(reach);
                end[d] = (centre_cell[d] + reach).min(subdivisions[d] - 1);
            }
            (start, end)
        };

        let mut ranked: Vec<(f64, Vec<usize>)> = Vec::new();
        for index in IndexWalk::new(&start, &end) {
            let cell = self.grid.field().value_at(&index)?;
            let magnitude = cell.iter().map(|v| v * v).sum::<f64>().sqrt();
            ranked.push((magnitude, index));
        }
        ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(core::cmp::Ordering::Equal));
        if cap >= 0 {
            ranked.truncate(cap as usize);
        }

        for (_, index) in ranked {
            let target_pos = DVector::from_vec(self.grid.cell_to_position(&index)?);
            let value = DVector::from_row_slice(self.grid.field().value_at(&index)?);
            let direction = &target_pos - position;
            let distance = direction.norm();
            self.spawn_and_offer(store, space, source, target_pos, value, direction, distance)?;
        }
        Ok(())
    }

    fn grid_location(
        &mut self,
        store: &mut ObjectStore,
        space: &str,
        source: ObjectId,
        position: &DVector<f64>,
    ) -> Result<(), SpaceError> {
        let dim = self.grid.dim();
        let subdivisions = self.grid.subdivisions().to_vec();
        let coord = self.grid.position_to_coord(position.as_slice())?;

        for mask in 0..(1_usize << dim) {
            let mut vertex = vec![0_usize; dim];
            for d in 0..dim {
                let c = if mask & (1 << d) != 0 {
                    coord[d].ceil()
                } else {
                    coord[d].floor()
                };
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    reason = "coords are clamped to the lattice"
                )]
                let c = c as usize;
                vertex[d] = c.min(subdivisions[d] - 1);
            }
            let target_pos = DVector::from_vec(self.grid.vertex_to_position(&vertex)?);
            let value = DVector::from_row_slice(self.grid.field().value_at(&vertex)?);
            let direction = &target_pos - position;
            let distance = direction.norm();
            self.spawn_and_offer(store, space, source, target_pos, value, direction, distance)?;
        }
        Ok(())
    }
}

impl SpaceAlgorithm for GridAlgorithm {
    fn label(&self) -> &'static str {
        "grid"
    }

    fn bounds(&self) -> &AlgorithmBounds {
        &self.bounds
    }

    fn bounds_mut(&mut self) -> &mut AlgorithmBounds {
        &mut self.bounds
    }

    /// Write stored neighbor values back into the cells.
    fn update_structure(
        &mut self,
        store: &mut ObjectStore,
        space: &str,
        visible: &[ObjectId],
    ) -> Result<(), SpaceError> {
        if self.update_mode == GridUpdateMode::NoUpdate {
            return Ok(());
        }
        if matches!(
            self.update_mode,
            GridUpdateMode::NearestReplace | GridUpdateMode::AvgReplace
        ) {
            let zeros = vec![0.0; self.grid.value_dim()];
            self.grid.fill(&zeros)?;
        }

        for &id in visible {
            let object = store.object(id)?;
            let group = object.neighbor_group(space)?;
            if !group.can_have_neighbors() {
                continue;
            }
            let stored: Vec<(ObjectId, Vec<f64>)> = group
                .relations()
                .iter()
                .map(|r| (r.target(), r.value().as_slice().to_vec()))
                .collect();

            for (target, value) in stored {
                let target_pos = store.object(target)?.position().clone_owned();
                match self.update_mode {
                    GridUpdateMode::NearestReplace => {
                        let flat = self.grid.position_to_flat(target_pos.as_slice())?;
                        self.grid.field_mut().set(flat, &value)?;
                    }
                    GridUpdateMode::NearestAdd => {
                        let flat = self.grid.position_to_flat(target_pos.as_slice())?;
                        self.grid.field_mut().add(flat, &value)?;
                    }
                    GridUpdateMode::AvgReplace => {
                        self.grid.set_value(
                            target_pos.as_slice(),
                            &value,
                            GridValueSetMode::Interpol,
                        )?;
                    }
                    GridUpdateMode::AvgAdd => {
                        self.grid.add_value(
                            target_pos.as_slice(),
                            &value,
                            GridValueSetMode::Interpol,
                        )?;
                    }
                    GridUpdateMode::NoUpdate => {}
                }
            }
        }
        Ok(())
    }

    fn update_neighbors(
        &mut self,
        store: &mut ObjectStore,
        space: &str,
        capable: &[ObjectId],
    ) -> Result<(), SpaceError> {
        let dim = self.grid.dim();

        for &id in capable {
            store.clear_neighbors(id, space)?;
        }
        // The previous tick's fabricated targets die with their relations.
        for id in core::mem::take(&mut self.scratch) {
            store.remove(id)?;
        }

        for &id in capable {
            let object = store.object(id)?;
            let position = object.position().clone_owned();
            let policy = *object
                .neighbor_group(space)?
                .policy()
                .ok_or(SpaceError::NoPolicy)?;

            let outside = (0..dim).any(|d| {
                position[d] < self.grid.min()[d] || position[d] > self.grid.max()[d]
            });
            if outside {
                continue;
            }

            match self.neighbor_mode {
                GridNeighborMode::CellLocation => {
                    let value = DVector::from_row_slice(
                        self.grid.value_at_position(position.as_slice())?,
                    );
                    self.spawn_and_offer(
                        store,
                        space,
                        id,
                        position.clone_owned(),
                        value,
                        DVector::zeros(dim),
                        0.0,
                    )?;
                }
                GridNeighborMode::AvgLocation => {
                    let mut value = vec![0.0; self.grid.value_dim()];
                    self.grid.sample(position.as_slice(), &mut value)?;
                    self.spawn_and_offer(
                        store,
                        space,
                        id,
                        position.clone_owned(),
                        DVector::from_vec(value),
                        DVector::zeros(dim),
                        0.0,
                    )?;
                }
                GridNeighborMode::AvgRegion | GridNeighborMode::CentroidSearch => {
                    self.centroid_scan(store, space, id, &position, policy.radius)?;
                }
                GridNeighborMode::GridLocation => {
                    self.grid_location(store, space, id, &position)?;
                }
                GridNeighborMode::PeakSearch => {
                    self.peak_search(store, space, id, &position, policy.radius, policy.cap)?;
                }
            }
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

impl core::fmt::Debug for GridAlgorithm {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GridAlgorithm")
            .field("grid", &self.grid)
            .field("neighbor_mode", &self.neighbor_mode)
            .field("update_mode", &self.update_mode)
            .field("scratch", &self.scratch.len())
            .finish_non_exhaustive()
    }
}
