// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Median-split point index and the two algorithms built on it: exact
//! radius search and approximate k-nearest.

use nalgebra::DVector;

use crate::algorithms::{AlgorithmBounds, SpaceAlgorithm};
use crate::error::SpaceError;
use crate::object::{ObjectId, ObjectStore};
use crate::relation::NeighborRelation;

const LEAF_SIZE: usize = 16;

#[derive(Clone, Copy, Debug)]
struct KdNode {
    // Leaf when left == u32::MAX; then order[start..end] are its points.
    left: u32,
    right: u32,
    start: u32,
    end: u32,
    split_val: f64,
    axis: u32,
}

/// Rebuilt-per-tick k-d index over a flat point snapshot.
///
/// Nodes carry their bounding box for pruning; leaves hold up to
/// [`LEAF_SIZE`] points. The box of each node is stored out-of-line in
/// `boxes`, `2 * dim` floats per node.
#[derive(Debug, Default)]
struct KdIndex {
    dim: usize,
    nodes: Vec<KdNode>,
    boxes: Vec<f64>,
    order: Vec<usize>,
    points: Vec<f64>,
}

impl KdIndex {
    fn build(dim: usize, points: Vec<f64>) -> Self {
        let count = points.len() / dim;
        let mut index = Self {
            dim,
            nodes: Vec::new(),
            boxes: Vec::new(),
            order: (0..count).collect(),
            points,
        };
        if count > 0 {
            index.nodes.reserve(count / LEAF_SIZE * 2 + 1);
            index.build_range(0, count);
        }
        index
    }

    fn point(&self, idx: usize) -> &[f64] {
        &self.points[idx * self.dim..(idx + 1) * self.dim]
    }

    fn len(&self) -> usize {
        self.points.len() / self.dim.max(1)
    }

    fn push_node(&mut self, node: KdNode, min: &[f64], max: &[f64]) -> u32 {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "node counts are bounded well below u32::MAX"
        )]
        let idx = self.nodes.len() as u32;
        self.nodes.push(node);
        self.boxes.extend_from_slice(min);
        self.boxes.extend_from_slice(max);
        idx
    }

    fn node_box(&self, node: u32) -> (&[f64], &[f64]) {
        let at = node as usize * 2 * self.dim;
        (
            &self.boxes[at..at + self.dim],
            &self.boxes[at + self.dim..at + 2 * self.dim],
        )
    }

    /// Build `order[start..end]`, returning the subtree root. The root of
    /// the whole tree is the last node pushed.
    fn build_range(&mut self, start: usize, end: usize) -> u32 {
        let count = end - start;

        let mut min = vec![f64::INFINITY; self.dim];
        let mut max = vec![f64::NEG_INFINITY; self.dim];
        for &idx in &self.order[start..end] {
            for d in 0..self.dim {
                let v = self.points[idx * self.dim + d];
                if v < min[d] {
                    min[d] = v;
                }
                if v > max[d] {
                    max[d] = v;
                }
            }
        }

        if count <= LEAF_SIZE {
            #[allow(
                clippy::cast_possible_truncation,
                reason = "point counts are bounded well below u32::MAX"
            )]
            let node = KdNode {
                left: u32::MAX,
                right: u32::MAX,
                start: start as u32,
                end: end as u32,
                split_val: 0.0,
                axis: 0,
            };
            return self.push_node(node, &min, &max);
        }

        // Split the widest axis at the median.
        let mut axis = 0;
        for d in 1..self.dim {
            if max[d] - min[d] > max[axis] - min[axis] {
                axis = d;
            }
        }
        let mid = start + count / 2;
        let dim = self.dim;
        let points = core::mem::take(&mut self.points);
        let _ = self.order[start..end].select_nth_unstable_by(count / 2, |&a, &b| {
            points[a * dim + axis]
                .partial_cmp(&points[b * dim + axis])
                .unwrap_or(core::cmp::Ordering::Equal)
        });
        self.points = points;
        let split_val = self.points[self.order[mid] * self.dim + axis];

        let left = self.build_range(start, mid);
        let right = self.build_range(mid, end);
        #[allow(
            clippy::cast_possible_truncation,
            reason = "axis index is bounded by the dimension"
        )]
        let node = KdNode {
            left,
            right,
            start: 0,
            end: 0,
            split_val,
            axis: axis as u32,
        };
        self.push_node(node, &min, &max)
    }

    fn box_distance_sq(&self, node: u32, query: &[f64]) -> f64 {
        let (min, max) = self.node_box(node);
        let mut d2 = 0.0;
        for d in 0..self.dim {
            let v = query[d];
            if v < min[d] {
                d2 += (min[d] - v) * (min[d] - v);
            } else if v > max[d] {
                d2 += (v - max[d]) * (v - max[d]);
            }
        }
        d2
    }

    /// Visit every point within `radius` of `query` (all points when the
    /// radius is negative). The visitor returns `false` to stop the search.
    fn for_each_within(
        &self,
        query: &[f64],
        radius: f64,
        visit: &mut impl FnMut(usize, f64) -> bool,
    ) {
        if self.nodes.is_empty() {
            return;
        }
        #[allow(
            clippy::cast_possible_truncation,
            reason = "node counts are bounded well below u32::MAX"
        )]
        let root = (self.nodes.len() - 1) as u32;
        let limit_sq = if radius >= 0.0 {
            radius * radius
        } else {
            f64::INFINITY
        };
        self.within_recursive(root, query, limit_sq, visit);
    }

    fn within_recursive(
        &self,
        node: u32,
        query: &[f64],
        limit_sq: f64,
        visit: &mut impl FnMut(usize, f64) -> bool,
    ) -> bool {
        if self.box_distance_sq(node, query) > limit_sq {
            return true;
        }
        let n = self.nodes[node as usize];
        if n.left == u32::MAX {
            for &idx in &self.order[n.start as usize..n.end as usize] {
                let d2: f64 = self
                    .point(idx)
                    .iter()
                    .zip(query)
                    .map(|(p, q)| (p - q) * (p - q))
                    .sum();
                if d2 <= limit_sq && !visit(idx, d2.sqrt()) {
                    return false;
                }
            }
            return true;
        }
        let diff = query[n.axis as usize] - n.split_val;
        let (near, far) = if diff <= 0.0 {
            (n.left, n.right)
        } else {
            (n.right, n.left)
        };
        self.within_recursive(near, query, limit_sq, visit)
            && self.within_recursive(far, query, limit_sq, visit)
    }

    /// The `k` nearest points to `query`, ascending by distance.
    ///
    /// `epsilon > 0` makes the search approximate: a subtree is skipped when
    /// its box is no closer than `worst / (1 + epsilon)`, so each returned
    /// distance is within a factor `1 + epsilon` of the true k-th distance.
    fn nearest_n(&self, query: &[f64], k: usize, epsilon: f64) -> Vec<(f64, usize)> {
        let mut found: Vec<(f64, usize)> = Vec::with_capacity(k + 1);
        if self.nodes.is_empty() || k == 0 {
            return found;
        }
        #[allow(
            clippy::cast_possible_truncation,
            reason = "node counts are bounded well below u32::MAX"
        )]
        let root = (self.nodes.len() - 1) as u32;
        let shrink = 1.0 / ((1.0 + epsilon) * (1.0 + epsilon));
        self.nearest_recursive(root, query, k, shrink, &mut found);
        for entry in &mut found {
            entry.0 = entry.0.sqrt();
        }
        found
    }

    fn nearest_recursive(
        &self,
        node: u32,
        query: &[f64],
        k: usize,
        shrink: f64,
        found: &mut Vec<(f64, usize)>,
    ) {
        if found.len() == k {
            let worst = found[k - 1].0;
            if self.box_distance_sq(node, query) > worst * shrink {
                return;
            }
        }
        let n = self.nodes[node as usize];
        if n.left == u32::MAX {
            for &idx in &self.order[n.start as usize..n.end as usize] {
                let d2: f64 = self
                    .point(idx)
                    .iter()
                    .zip(query)
                    .map(|(p, q)| (p - q) * (p - q))
                    .sum();
                if found.len() == k && d2 >= found[k - 1].0 {
                    continue;
                }
                let at = found.partition_point(|&(fd2, _)| fd2 <= d2);
                found.insert(at, (d2, idx));
                if found.len() > k {
                    found.pop();
                }
            }
            return;
        }
        let diff = query[n.axis as usize] - n.split_val;
        let (near, far) = if diff <= 0.0 {
            (n.left, n.right)
        } else {
            (n.right, n.left)
        };
        self.nearest_recursive(near, query, k, shrink, found);
        self.nearest_recursive(far, query, k, shrink, found);
    }
}

/// Snapshot the visible set into a flat point buffer plus slot map.
fn snapshot(
    store: &ObjectStore,
    dim: usize,
    visible: &[ObjectId],
) -> Result<(Vec<f64>, Vec<ObjectId>), SpaceError> {
    let mut points = Vec::with_capacity(visible.len() * dim);
    let mut slots = Vec::with_capacity(visible.len());
    for &id in visible {
        let object = store.object(id)?;
        if object.dim() != dim {
            return Err(SpaceError::DimensionMismatch {
                expected: dim,
                found: object.dim(),
            });
        }
        points.extend_from_slice(object.position().as_slice());
        slots.push(id);
    }
    Ok((points, slots))
}

/// Exact radius search over a per-tick k-d index.
///
/// The structure phase rebuilds the index from the visible set; the neighbor
/// phase runs one radius query per capable object and routes every hit other
/// than the object itself through its admission policy.
#[derive(Debug)]
pub struct KdTreeAlgorithm {
    bounds: AlgorithmBounds,
    index: KdIndex,
    slots: Vec<ObjectId>,
}

impl KdTreeAlgorithm {
    /// Unbounded variant for N dimensions.
    pub fn new(dim: usize) -> Self {
        Self {
            bounds: AlgorithmBounds::unbounded(dim),
            index: KdIndex::default(),
            slots: Vec::new(),
        }
    }

    /// Bounded variant.
    pub fn bounded(min: DVector<f64>, max: DVector<f64>) -> Result<Self, SpaceError> {
        Ok(Self {
            bounds: AlgorithmBounds::bounded(min, max)?,
            index: KdIndex::default(),
            slots: Vec::new(),
        })
    }
}

impl SpaceAlgorithm for KdTreeAlgorithm {
    fn label(&self) -> &'static str {
        "kd-tree"
    }

    fn bounds(&self) -> &AlgorithmBounds {
        &self.bounds
    }

    fn bounds_mut(&mut self) -> &mut AlgorithmBounds {
        &mut self.bounds
    }

    fn update_structure(
        &mut self,
        store: &mut ObjectStore,
        _space: &str,
        visible: &[ObjectId],
    ) -> Result<(), SpaceError> {
        let dim = self.bounds.dim();
        let (points, slots) = snapshot(store, dim, visible)?;
        self.index = KdIndex::build(dim, points);
        self.slots = slots;
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
            let radius = object
                .neighbor_group(space)?
                .policy()
                .ok_or(SpaceError::NoPolicy)?
                .radius;
            let query = object.position().clone_owned();

            store.clear_neighbors(id, space)?;

            let mut failure = None;
            self.index
                .for_each_within(query.as_slice(), radius, &mut |idx, distance| {
                    let target = self.slots[idx];
                    if target == id {
                        return true;
                    }
                    let direction =
                        DVector::from_row_slice(self.index.point(idx)) - &query;
                    let relation = match NeighborRelation::new(id, target, distance, direction)
                    {
                        Ok(r) => r,
                        Err(e) => {
                            failure = Some(e);
                            return false;
                        }
                    };
                    match store.insert_relation(id, space, relation) {
                        Ok(_) => {}
                        Err(e) => {
                            failure = Some(e);
                            return false;
                        }
                    }
                    // Keep searching until the list stops accepting.
                    !store
                        .object(id)
                        .is_ok_and(|o| o.neighbor_group(space).is_ok_and(|g| g.is_full()))
                });
            if let Some(e) = failure {
                return Err(e);
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

/// Approximate k-nearest over the same index.
///
/// Per capable object the search asks for one candidate more than the cap
/// (the object itself is usually among the hits), skips self explicitly,
/// stops at the policy radius, and feeds the rest through the admission
/// policy. `epsilon` trades accuracy for pruning.
#[derive(Debug)]
pub struct AnnAlgorithm {
    bounds: AlgorithmBounds,
    epsilon: f64,
    index: KdIndex,
    slots: Vec<ObjectId>,
}

impl AnnAlgorithm {
    /// Unbounded variant with the default `epsilon` of 0.1.
    pub fn new(dim: usize) -> Self {
        Self {
            bounds: AlgorithmBounds::unbounded(dim),
            epsilon: 0.1,
            index: KdIndex::default(),
            slots: Vec::new(),
        }
    }

    /// Bounded variant with the default `epsilon`.
    pub fn bounded(min: DVector<f64>, max: DVector<f64>) -> Result<Self, SpaceError> {
        Ok(Self {
            bounds: AlgorithmBounds::bounded(min, max)?,
            epsilon: 0.1,
            index: KdIndex::default(),
            slots: Vec::new(),
        })
    }

    /// Override the approximation factor (0 searches exactly).
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon.max(0.0);
        self
    }

    /// Current approximation factor.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }
}

impl SpaceAlgorithm for AnnAlgorithm {
    fn label(&self) -> &'static str {
        "approximate nearest neighbors"
    }

    fn bounds(&self) -> &AlgorithmBounds {
        &self.bounds
    }

    fn bounds_mut(&mut self) -> &mut AlgorithmBounds {
        &mut self.bounds
    }

    fn update_structure(
        &mut self,
        store: &mut ObjectStore,
        _space: &str,
        visible: &[ObjectId],
    ) -> Result<(), SpaceError> {
        let dim = self.bounds.dim();
        let (points, slots) = snapshot(store, dim, visible)?;
        self.index = KdIndex::build(dim, points);
        self.slots = slots;
        Ok(())
    }

    fn update_neighbors(
        &mut self,
        store: &mut ObjectStore,
        space: &str,
        capable: &[ObjectId],
    ) -> Result<(), SpaceError> {
        let population = self.index.len();
        for &id in capable {
            let object = store.object(id)?;
            let policy = *object
                .neighbor_group(space)?
                .policy()
                .ok_or(SpaceError::NoPolicy)?;
            let query = object.position().clone_owned();

            store.clear_neighbors(id, space)?;
            if population == 0 {
                continue;
            }

            let wanted = if policy.cap < 0 {
                population
            } else {
                (policy.cap as usize).min(population.saturating_sub(1)) + 1
            };
            let found = self.index.nearest_n(query.as_slice(), wanted, self.epsilon);

            for (distance, idx) in found {
                let target = self.slots[idx];
                if target == id {
                    continue;
                }
                if policy.radius >= 0.0 && distance > policy.radius {
                    break;
                }
                let direction = DVector::from_row_slice(self.index.point(idx)) - &query;
                let relation = NeighborRelation::new(id, target, distance, direction)?;
                store.insert_relation(id, space, relation)?;
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
