// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Space objects and the generational store that owns them.

use indexmap::IndexMap;
use nalgebra::{DVector, Point3, UnitQuaternion, Vector3};

use crate::error::SpaceError;
use crate::geometry::{Aabb3, Geometry};
use crate::group::NeighborGroup;
use crate::relation::NeighborRelation;
use crate::shape::Shape;

/// Generational handle for objects in an [`ObjectStore`].
///
/// A handle consists of a slot index and a generation counter. Removing an
/// object frees its slot; reusing the slot bumps the generation, so stale
/// handles are detected instead of aliasing a different live object.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u32, u32);

impl ObjectId {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "object stores are bounded well below u32::MAX slots"
    )]
    const fn new(idx: usize, generation: u32) -> Self {
        Self(idx as u32, generation)
    }

    const fn idx(self) -> usize {
        self.0 as usize
    }

    #[cfg(test)]
    pub(crate) const fn test_id(idx: u32) -> Self {
        Self(idx, 1)
    }
}

/// A point (or shape anchor) in N-space.
///
/// An object carries a fixed dimension, a position of that dimension, a
/// registry of per-space neighbor groups keyed by space name, and optionally
/// a [`Shape`] part (always 3-D). The dimension never changes after creation.
pub struct SpaceObject {
    serial: u64,
    dim: usize,
    position: DVector<f64>,
    groups: IndexMap<String, NeighborGroup>,
    shape: Option<Shape>,
}

impl SpaceObject {
    /// Create an object at the origin of an N-dimensional space.
    pub fn new(dim: usize) -> Self {
        assert!(dim >= 1, "dimension must be at least 1");
        Self {
            serial: 0,
            dim,
            position: DVector::zeros(dim),
            groups: IndexMap::new(),
            shape: None,
        }
    }

    /// Create an object at a position; the dimension is the position's.
    pub fn at(position: DVector<f64>) -> Self {
        assert!(!position.is_empty(), "dimension must be at least 1");
        Self {
            serial: 0,
            dim: position.len(),
            position,
            groups: IndexMap::new(),
            shape: None,
        }
    }

    /// Create a 3-D object carrying a geometry with an identity transform.
    pub fn with_shape(geometry: Box<dyn Geometry>) -> Self {
        Self {
            serial: 0,
            dim: 3,
            position: DVector::zeros(3),
            groups: IndexMap::new(),
            shape: Some(Shape::new(geometry)),
        }
    }

    /// Monotonically assigned unique id; never reused.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Dimension, fixed at creation.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Current position.
    pub fn position(&self) -> &DVector<f64> {
        &self.position
    }

    /// Replace the position.
    pub fn set_position(&mut self, position: DVector<f64>) -> Result<(), SpaceError> {
        if position.len() != self.dim {
            return Err(SpaceError::DimensionMismatch {
                expected: self.dim,
                found: position.len(),
            });
        }
        self.position = position;
        if let Some(shape) = &mut self.shape {
            shape.mark_transform_changed();
        }
        Ok(())
    }

    /// Move the position by a delta.
    pub fn change_position(&mut self, delta: &DVector<f64>) -> Result<(), SpaceError> {
        if delta.len() != self.dim {
            return Err(SpaceError::DimensionMismatch {
                expected: self.dim,
                found: delta.len(),
            });
        }
        self.position += delta;
        if let Some(shape) = &mut self.shape {
            shape.mark_transform_changed();
        }
        Ok(())
    }

    // --- neighbor registry ---

    /// Space names this object participates in, in join order.
    pub fn space_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Number of spaces this object participates in.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// True when the object has a neighbor group for the named space.
    pub fn in_space(&self, space: &str) -> bool {
        self.groups.contains_key(space)
    }

    /// Neighbor group for the named space.
    pub fn neighbor_group(&self, space: &str) -> Result<&NeighborGroup, SpaceError> {
        self.groups.get(space).ok_or_else(|| SpaceError::GroupNotFound {
            space: space.to_owned(),
        })
    }

    /// Mutable neighbor group for the named space.
    pub(crate) fn neighbor_group_mut(
        &mut self,
        space: &str,
    ) -> Result<&mut NeighborGroup, SpaceError> {
        self.groups.get_mut(space).ok_or_else(|| SpaceError::GroupNotFound {
            space: space.to_owned(),
        })
    }

    /// Sorted relations in the named space.
    pub fn neighbors(&self, space: &str) -> Result<&[NeighborRelation], SpaceError> {
        Ok(self.neighbor_group(space)?.relations())
    }

    /// Visibility in the named space.
    pub fn visible(&self, space: &str) -> Result<bool, SpaceError> {
        Ok(self.neighbor_group(space)?.visible())
    }

    /// Set visibility in every space the object participates in.
    pub fn set_visible(&mut self, visible: bool) {
        for group in self.groups.values_mut() {
            group.set_visible(visible);
        }
    }

    /// Set visibility in one space.
    pub fn set_visible_in(&mut self, space: &str, visible: bool) -> Result<(), SpaceError> {
        self.neighbor_group_mut(space)?.set_visible(visible);
        Ok(())
    }

    /// Whether the object can have neighbors in the named space.
    pub fn can_have_neighbors(&self, space: &str) -> Result<bool, SpaceError> {
        Ok(self.neighbor_group(space)?.can_have_neighbors())
    }

    pub(crate) fn attach_group(&mut self, group: NeighborGroup) {
        self.groups.insert(group.space().to_owned(), group);
    }

    pub(crate) fn detach_group(&mut self, space: &str) -> Option<NeighborGroup> {
        self.groups.shift_remove(space)
    }

    // --- shape part ---

    /// The shape part, if this object carries one.
    pub fn shape(&self) -> Option<&Shape> {
        self.shape.as_ref()
    }

    /// True when this object carries a shape.
    pub fn is_shape(&self) -> bool {
        self.shape.is_some()
    }

    fn shape_mut(&mut self) -> Result<&mut Shape, SpaceError> {
        self.shape.as_mut().ok_or(SpaceError::NotAShape)
    }

    /// Shape part plus its translation (the object position). Checks the
    /// shape before touching position components, so non-shape objects of
    /// any dimension get a clean error.
    fn shape_parts(&mut self) -> Result<(&mut Shape, Vector3<f64>), SpaceError> {
        let shape = self.shape.as_mut().ok_or(SpaceError::NotAShape)?;
        let translation = Vector3::new(self.position[0], self.position[1], self.position[2]);
        Ok((shape, translation))
    }

    /// Orientation of the shape part.
    pub fn orientation(&self) -> Result<UnitQuaternion<f64>, SpaceError> {
        Ok(self.shape.as_ref().ok_or(SpaceError::NotAShape)?.orientation())
    }

    /// Set the shape orientation.
    pub fn set_orientation(&mut self, orientation: UnitQuaternion<f64>) -> Result<(), SpaceError> {
        self.shape_mut()?.set_orientation(orientation);
        Ok(())
    }

    /// Per-axis scale of the shape part.
    pub fn scale(&self) -> Result<Vector3<f64>, SpaceError> {
        Ok(self.shape.as_ref().ok_or(SpaceError::NotAShape)?.scale())
    }

    /// Set the shape scale.
    pub fn set_scale(&mut self, scale: Vector3<f64>) -> Result<(), SpaceError> {
        self.shape_mut()?.set_scale(scale);
        Ok(())
    }

    /// Replace the shape geometry.
    pub fn set_geometry(&mut self, geometry: Box<dyn Geometry>) -> Result<(), SpaceError> {
        self.shape_mut()?.set_geometry(geometry);
        Ok(())
    }

    /// Flag the geometry as mutated so cached bounds refresh on next read.
    pub fn mark_geometry_changed(&mut self) -> Result<(), SpaceError> {
        self.shape_mut()?.mark_geometry_changed();
        Ok(())
    }

    /// World-space bounding box of the shape.
    pub fn world_aabb(&mut self) -> Result<Aabb3, SpaceError> {
        let (shape, translation) = self.shape_parts()?;
        shape.world_aabb(translation)
    }

    /// Object-space bounding box of the shape.
    pub fn object_aabb(&mut self) -> Result<Aabb3, SpaceError> {
        let (shape, translation) = self.shape_parts()?;
        shape.object_aabb(translation)
    }

    /// Closest point on the shape surface, in world coordinates.
    pub fn closest_point(&mut self, world: &Point3<f64>) -> Result<Point3<f64>, SpaceError> {
        let (shape, translation) = self.shape_parts()?;
        shape.closest_point(translation, world)
    }

    /// Transform a world point into the shape's object space.
    pub fn world_to_object(&mut self, world: &Point3<f64>) -> Result<Point3<f64>, SpaceError> {
        let (shape, translation) = self.shape_parts()?;
        shape.world_to_object(translation, world)
    }

    /// Transform an object-space point into world space.
    pub fn object_to_world(&mut self, object: &Point3<f64>) -> Result<Point3<f64>, SpaceError> {
        let (shape, translation) = self.shape_parts()?;
        shape.object_to_world(translation, object)
    }
}

impl core::fmt::Debug for SpaceObject {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SpaceObject")
            .field("serial", &self.serial)
            .field("dim", &self.dim)
            .field("position", &self.position.as_slice())
            .field("groups", &self.groups.len())
            .field("shape", &self.shape.is_some())
            .finish_non_exhaustive()
    }
}

/// Arena owning every [`SpaceObject`].
///
/// Slots are reused through a free list; each reuse bumps the slot's
/// generation so outstanding [`ObjectId`]s to the removed object turn stale
/// rather than pointing at the newcomer. Serial numbers are assigned
/// monotonically on insert and never reused.
#[derive(Default)]
pub struct ObjectStore {
    slots: Vec<Option<SpaceObject>>,
    generations: Vec<u32>,
    free: Vec<usize>,
    next_serial: u64,
}

impl ObjectStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object, assigning its serial. Returns its handle.
    pub fn insert(&mut self, mut object: SpaceObject) -> ObjectId {
        object.serial = self.next_serial;
        self.next_serial += 1;
        if let Some(idx) = self.free.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.slots[idx] = Some(object);
            ObjectId::new(idx, generation)
        } else {
            let generation = 1_u32;
            self.slots.push(Some(object));
            self.generations.push(generation);
            ObjectId::new(self.slots.len() - 1, generation)
        }
    }

    /// Remove an object that has left all its spaces.
    ///
    /// Removal while neighbor groups remain is a lifecycle error: the spaces
    /// still hold proxies for the object. Remove it from its spaces first.
    pub fn remove(&mut self, id: ObjectId) -> Result<SpaceObject, SpaceError> {
        let object = self.object(id)?;
        let count = object.group_count();
        if count > 0 {
            return Err(SpaceError::ObjectInSpaces { count });
        }
        let removed = self.slots[id.idx()].take();
        self.free.push(id.idx());
        removed.ok_or(SpaceError::ObjectNotFound)
    }

    /// True when the handle refers to a live object.
    pub fn is_alive(&self, id: ObjectId) -> bool {
        self.slots
            .get(id.idx())
            .is_some_and(|slot| slot.is_some() && self.generations[id.idx()] == id.1)
    }

    /// The object behind a handle, if live.
    pub fn get(&self, id: ObjectId) -> Option<&SpaceObject> {
        if !self.is_alive(id) {
            return None;
        }
        self.slots[id.idx()].as_ref()
    }

    /// Mutable access to the object behind a handle, if live.
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SpaceObject> {
        if !self.is_alive(id) {
            return None;
        }
        self.slots[id.idx()].as_mut()
    }

    /// The object behind a handle, or a lookup error.
    pub fn object(&self, id: ObjectId) -> Result<&SpaceObject, SpaceError> {
        self.get(id).ok_or(SpaceError::ObjectNotFound)
    }

    /// Mutable object behind a handle, or a lookup error.
    pub fn object_mut(&mut self, id: ObjectId) -> Result<&mut SpaceObject, SpaceError> {
        self.get_mut(id).ok_or(SpaceError::ObjectNotFound)
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// True when no objects are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // --- client-side neighbor authoring ---

    /// Author a relation `source → target`, computing distance and direction
    /// from current positions. Returns whether the admission policy kept it.
    pub fn add_neighbor(
        &mut self,
        source: ObjectId,
        space: &str,
        target: ObjectId,
    ) -> Result<bool, SpaceError> {
        if source == target {
            return Err(SpaceError::SelfNeighbor);
        }
        let source_pos = self.object(source)?.position().clone_owned();
        let target_obj = self.object(target)?;
        if target_obj.dim() != source_pos.len() {
            return Err(SpaceError::DimensionMismatch {
                expected: source_pos.len(),
                found: target_obj.dim(),
            });
        }
        let direction = target_obj.position() - &source_pos;
        let distance = direction.norm();
        self.insert_relation(
            source,
            space,
            NeighborRelation::new(source, target, distance, direction)?,
        )
    }

    /// Author a relation with caller-supplied distance and direction.
    pub fn add_neighbor_with(
        &mut self,
        source: ObjectId,
        space: &str,
        target: ObjectId,
        distance: f64,
        direction: DVector<f64>,
    ) -> Result<bool, SpaceError> {
        let dim = self.object(source)?.dim();
        if direction.len() != dim {
            return Err(SpaceError::DimensionMismatch {
                expected: dim,
                found: direction.len(),
            });
        }
        self.object(target)?;
        self.insert_relation(
            source,
            space,
            NeighborRelation::new(source, target, distance, direction)?,
        )
    }

    /// Route a finished relation through the source's admission policy.
    pub(crate) fn insert_relation(
        &mut self,
        source: ObjectId,
        space: &str,
        relation: NeighborRelation,
    ) -> Result<bool, SpaceError> {
        let group = self.object_mut(source)?.neighbor_group_mut(space)?;
        if group.policy().is_none() {
            return Err(SpaceError::NoPolicy);
        }
        Ok(group.offer(relation))
    }

    /// Remove every relation `source → target` in the named space.
    pub fn remove_neighbor(
        &mut self,
        source: ObjectId,
        space: &str,
        target: ObjectId,
    ) -> Result<(), SpaceError> {
        self.object_mut(source)?
            .neighbor_group_mut(space)?
            .remove_target(target);
        Ok(())
    }

    /// Remove the relation at `index` in the named space.
    pub fn remove_neighbor_at(
        &mut self,
        source: ObjectId,
        space: &str,
        index: usize,
    ) -> Result<(), SpaceError> {
        self.object_mut(source)?
            .neighbor_group_mut(space)?
            .remove_at(index)
    }

    /// Clear the source's neighbor list in the named space.
    pub fn clear_neighbors(&mut self, source: ObjectId, space: &str) -> Result<(), SpaceError> {
        self.object_mut(source)?.neighbor_group_mut(space)?.clear();
        Ok(())
    }

    /// Clear the source's neighbor lists in every space.
    pub fn clear_all_neighbors(&mut self, source: ObjectId) -> Result<(), SpaceError> {
        let object = self.object_mut(source)?;
        let names: Vec<String> = object.space_names().map(str::to_owned).collect();
        for name in names {
            object.neighbor_group_mut(&name)?.clear();
        }
        Ok(())
    }
}

impl core::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("slots", &self.slots.len())
            .field("alive", &self.len())
            .field("free", &self.free.len())
            .finish_non_exhaustive()
    }
}
