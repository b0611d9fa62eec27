// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Packed rectangle tree over shape bounding boxes (3-D only).

use nalgebra::{DVector, Point3, Vector3};

use crate::algorithms::{AlgorithmBounds, SpaceAlgorithm};
use crate::error::SpaceError;
use crate::geometry::Aabb3;
use crate::object::{ObjectId, ObjectStore};
use crate::relation::NeighborRelation;

/// How the r-tree resolves a candidate's distance.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RTreeClosestPointMode {
    /// Distance to the candidate shape's world bounding box.
    ClosestPointAabb,
    /// Distance to the candidate shape's surface via its geometry.
    ClosestPointShape,
}

#[derive(Clone, Debug)]
enum RChild {
    Node(usize),
    Item { slot: usize, bbox: Aabb3 },
}

#[derive(Clone, Debug)]
struct RNode {
    bbox: Aabb3,
    children: Vec<RChild>,
}

/// STR-packed rectangle tree, rebuilt in bulk every tick.
///
/// Entries are sorted by centroid along x, sliced, sorted along y inside
/// each slice, sliced again, then sorted along z and chunked into leaves;
/// the same pass repeats over node boxes until a single root remains.
#[derive(Debug, Default)]
struct RTree3 {
    arena: Vec<RNode>,
    root: Option<usize>,
}

const MAX_CHILDREN: usize = 8;

fn centroid(bbox: &Aabb3) -> Point3<f64> {
    Point3::new(
        0.5 * (bbox.min.x + bbox.max.x),
        0.5 * (bbox.min.y + bbox.max.y),
        0.5 * (bbox.min.z + bbox.max.z),
    )
}

/// Slice items into groups of at most `MAX_CHILDREN` by three nested
/// centroid sorts (x, then y, then z).
fn str_chunks<T: Clone>(items: &mut [T], bbox_of: impl Fn(&T) -> Aabb3) -> Vec<Vec<T>> {
    let n = items.len();
    let num_groups = n.div_ceil(MAX_CHILDREN);
    let mut g = 1_usize;
    while g * g * g < num_groups {
        g += 1;
    }

    let sort_axis = |slice: &mut [T], axis: usize, bbox_of: &dyn Fn(&T) -> Aabb3| {
        slice.sort_by(|a, b| {
            centroid(&bbox_of(a))[axis]
                .partial_cmp(&centroid(&bbox_of(b))[axis])
                .unwrap_or(core::cmp::Ordering::Equal)
        });
    };

    let mut out = Vec::with_capacity(num_groups);
    sort_axis(items, 0, &bbox_of);
    let slab = n.div_ceil(g).max(1);
    for x_slice in items.chunks_mut(slab) {
        sort_axis(x_slice, 1, &bbox_of);
        let run = x_slice.len().div_ceil(g).max(1);
        for y_slice in x_slice.chunks_mut(run) {
            sort_axis(y_slice, 2, &bbox_of);
            for chunk in y_slice.chunks(MAX_CHILDREN) {
                out.push(chunk.to_vec());
            }
        }
    }
    out
}

impl RTree3 {
    fn bulk_build(mut entries: Vec<(usize, Aabb3)>) -> Self {
        let mut tree = Self::default();
        if entries.is_empty() {
            return tree;
        }

        // Leaf level.
        let mut level: Vec<usize> = Vec::new();
        for group in str_chunks(&mut entries, |(_, bbox)| *bbox) {
            let children: Vec<RChild> = group
                .into_iter()
                .map(|(slot, bbox)| RChild::Item { slot, bbox })
                .collect();
            level.push(tree.push_node(children));
        }

        // Promote until everything fits under one root.
        while level.len() > MAX_CHILDREN {
            let arena_boxes: Vec<Aabb3> = level.iter().map(|&i| tree.arena[i].bbox).collect();
            let mut pairs: Vec<(usize, Aabb3)> =
                level.iter().copied().zip(arena_boxes).collect();
            let mut next = Vec::new();
            for group in str_chunks(&mut pairs, |(_, bbox)| *bbox) {
                let children: Vec<RChild> =
                    group.into_iter().map(|(idx, _)| RChild::Node(idx)).collect();
                next.push(tree.push_node(children));
            }
            level = next;
        }

        tree.root = Some(if level.len() == 1 {
            level[0]
        } else {
            let children: Vec<RChild> = level.into_iter().map(RChild::Node).collect();
            tree.push_node(children)
        });
        tree
    }

    fn push_node(&mut self, children: Vec<RChild>) -> usize {
        let bbox = self.children_bbox(&children);
        let idx = self.arena.len();
        self.arena.push(RNode { bbox, children });
        idx
    }

    fn children_bbox(&self, children: &[RChild]) -> Aabb3 {
        let mut it = children.iter().map(|c| match c {
            RChild::Node(i) => self.arena[*i].bbox,
            RChild::Item { bbox, .. } => *bbox,
        });
        let first = it
            .next()
            .unwrap_or(Aabb3::new(Point3::origin(), Point3::origin()));
        it.fold(first, |acc, b| acc.union(&b))
    }

    /// Visit every stored item whose box intersects `query`.
    fn search(&self, query: &Aabb3, visit: &mut impl FnMut(usize, &Aabb3)) {
        if let Some(root) = self.root {
            self.search_node(root, query, visit);
        }
    }

    fn search_node(&self, idx: usize, query: &Aabb3, visit: &mut impl FnMut(usize, &Aabb3)) {
        let node = &self.arena[idx];
        if !node.bbox.intersects(query) {
            return;
        }
        for child in &node.children {
            match child {
                RChild::Node(i) => self.search_node(*i, query, visit),
                RChild::Item { slot, bbox } => {
                    if bbox.intersects(query) {
                        visit(*slot, bbox);
                    }
                }
            }
        }
    }
}

/// Rectangle index keyed on shape world AABBs; dimension 3 only.
///
/// Shapes enter the structure with their world bounding box; point objects
/// enter with the cube spanned by their neighbor radius, so shapes can find
/// them, but only shape candidates are ever offered as neighbors. Candidate
/// distance follows the [`RTreeClosestPointMode`].
pub struct RTreeAlgorithm {
    bounds: AlgorithmBounds,
    mode: RTreeClosestPointMode,
    tree: RTree3,
    roster: Vec<ObjectId>,
    is_shape: Vec<bool>,
}

impl RTreeAlgorithm {
    /// Bounded 3-D variant.
    pub fn new(
        min: Vector3<f64>,
        max: Vector3<f64>,
        mode: RTreeClosestPointMode,
    ) -> Result<Self, SpaceError> {
        Ok(Self {
            bounds: AlgorithmBounds::bounded(
                DVector::from_row_slice(min.as_slice()),
                DVector::from_row_slice(max.as_slice()),
            )?,
            mode,
            tree: RTree3::default(),
            roster: Vec::new(),
            is_shape: Vec::new(),
        })
    }

    /// Current closest-point mode.
    pub fn mode(&self) -> RTreeClosestPointMode {
        self.mode
    }

    /// Switch the closest-point mode.
    pub fn set_mode(&mut self, mode: RTreeClosestPointMode) {
        self.mode = mode;
    }

    fn position3(position: &DVector<f64>) -> Point3<f64> {
        Point3::new(position[0], position[1], position[2])
    }

    fn check_dim(&self, store: &ObjectStore, ids: &[ObjectId]) -> Result<(), SpaceError> {
        for &id in ids {
            let dim = store.object(id)?.dim();
            if dim != 3 {
                return Err(SpaceError::UnsupportedDimension {
                    operation: "r-tree indexing",
                    dim,
                });
            }
        }
        Ok(())
    }

    /// Query box for one object: its world AABB when it is a shape, the
    /// radius cube otherwise (the whole domain on an unbounded radius).
    fn query_box(
        &self,
        store: &mut ObjectStore,
        space: &str,
        id: ObjectId,
    ) -> Result<Aabb3, SpaceError> {
        if store.object(id)?.is_shape() {
            return store.object_mut(id)?.world_aabb();
        }
        let object = store.object(id)?;
        let centre = Self::position3(object.position());
        let radius = object
            .neighbor_group(space)
            .ok()
            .and_then(|g| g.policy().map(|p| p.radius))
            .unwrap_or(0.0);
        if radius < 0.0 {
            let (min, max) = (self.bounds.min(), self.bounds.max());
            return Ok(Aabb3::new(
                Point3::new(min[0], min[1], min[2]),
                Point3::new(max[0], max[1], max[2]),
            ));
        }
        Ok(Aabb3::around(centre, radius))
    }
}

impl SpaceAlgorithm for RTreeAlgorithm {
    fn label(&self) -> &'static str {
        "r-tree"
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
        space: &str,
        visible: &[ObjectId],
    ) -> Result<(), SpaceError> {
        self.check_dim(store, visible)?;
        self.roster.clear();
        self.is_shape.clear();
        let mut entries = Vec::with_capacity(visible.len());
        for &id in visible {
            let bbox = self.query_box(store, space, id)?;
            let slot = self.roster.len();
            self.roster.push(id);
            self.is_shape.push(store.object(id)?.is_shape());
            entries.push((slot, bbox));
        }
        self.tree = RTree3::bulk_build(entries);
        Ok(())
    }

    fn update_neighbors(
        &mut self,
        store: &mut ObjectStore,
        space: &str,
        capable: &[ObjectId],
    ) -> Result<(), SpaceError> {
        self.check_dim(store, capable)?;
        for &id in capable {
            store.clear_neighbors(id, space)?;
            let query = self.query_box(store, space, id)?;
            let position = Self::position3(store.object(id)?.position());

            let mut hits: Vec<(usize, Aabb3)> = Vec::new();
            self.tree.search(&query, &mut |slot, bbox| {
                hits.push((slot, *bbox));
            });

            for (slot, bbox) in hits {
                let target = self.roster[slot];
                if target == id || !self.is_shape[slot] {
                    continue;
                }
                let closest = match self.mode {
                    RTreeClosestPointMode::ClosestPointAabb => bbox.closest_point(&position),
                    RTreeClosestPointMode::ClosestPointShape => {
                        store.object_mut(target)?.closest_point(&position)?
                    }
                };
                let offset = closest - position;
                let relation = NeighborRelation::new(
                    id,
                    target,
                    offset.norm(),
                    DVector::from_row_slice(offset.as_slice()),
                )?;
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

impl core::fmt::Debug for RTreeAlgorithm {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RTreeAlgorithm")
            .field("bounds", &self.bounds)
            .field("mode", &self.mode)
            .field("entries", &self.roster.len())
            .finish_non_exhaustive()
    }
}
