// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shape part of a space object: geometry, TRS transform, cached bounds.

use nalgebra::{Matrix4, Point3, UnitQuaternion, Vector3};

use crate::error::SpaceError;
use crate::geometry::{Aabb3, Geometry};

/// Per-shape dirty state.
#[derive(Copy, Clone, Debug, Default)]
struct Dirty {
    transform: bool,
    geometry: bool,
}

/// Geometry with a translate–rotate–scale transform and cached derived data.
///
/// The translation is the owning object's position and is passed in by the
/// object on every read; orientation and scale live here. Any read that
/// consults the caches refreshes them first:
/// 1. with the transform dirty, the object↔world matrices are rebuilt and
///    both bounding boxes recomputed;
/// 2. with only the geometry dirty, just the bounding boxes recompute.
///
/// The world box bounds all eight transformed corners of the object box, so
/// it stays conservative under rotation.
pub struct Shape {
    geometry: Box<dyn Geometry>,
    orientation: UnitQuaternion<f64>,
    scale: Vector3<f64>,
    object_to_world: Matrix4<f64>,
    world_to_object: Matrix4<f64>,
    object_aabb: Aabb3,
    world_aabb: Aabb3,
    dirty: Dirty,
}

impl Shape {
    pub(crate) fn new(geometry: Box<dyn Geometry>) -> Self {
        let bounds = geometry.bounds();
        Self {
            geometry,
            orientation: UnitQuaternion::identity(),
            scale: Vector3::repeat(1.0),
            object_to_world: Matrix4::identity(),
            world_to_object: Matrix4::identity(),
            object_aabb: bounds,
            world_aabb: bounds,
            dirty: Dirty {
                transform: true,
                geometry: true,
            },
        }
    }

    /// The wrapped geometry.
    pub fn geometry(&self) -> &dyn Geometry {
        self.geometry.as_ref()
    }

    pub(crate) fn set_geometry(&mut self, geometry: Box<dyn Geometry>) {
        self.geometry = geometry;
        self.dirty.geometry = true;
    }

    /// Current orientation.
    pub fn orientation(&self) -> UnitQuaternion<f64> {
        self.orientation
    }

    pub(crate) fn set_orientation(&mut self, orientation: UnitQuaternion<f64>) {
        self.orientation = orientation;
        self.dirty.transform = true;
    }

    /// Current per-axis scale.
    pub fn scale(&self) -> Vector3<f64> {
        self.scale
    }

    pub(crate) fn set_scale(&mut self, scale: Vector3<f64>) {
        self.scale = scale;
        self.dirty.transform = true;
    }

    pub(crate) fn mark_transform_changed(&mut self) {
        self.dirty.transform = true;
    }

    pub(crate) fn mark_geometry_changed(&mut self) {
        self.dirty.geometry = true;
    }

    /// World-space bounding box.
    pub(crate) fn world_aabb(&mut self, translation: Vector3<f64>) -> Result<Aabb3, SpaceError> {
        self.refresh(translation)?;
        Ok(self.world_aabb)
    }

    /// Object-space bounding box.
    pub(crate) fn object_aabb(&mut self, translation: Vector3<f64>) -> Result<Aabb3, SpaceError> {
        self.refresh(translation)?;
        Ok(self.object_aabb)
    }

    /// Closest point on the geometry to a world-space reference, in world
    /// coordinates.
    pub(crate) fn closest_point(
        &mut self,
        translation: Vector3<f64>,
        world: &Point3<f64>,
    ) -> Result<Point3<f64>, SpaceError> {
        self.refresh(translation)?;
        let object_ref = self.world_to_object.transform_point(world);
        let object_closest = self.geometry.closest_point(&object_ref);
        Ok(self.object_to_world.transform_point(&object_closest))
    }

    pub(crate) fn world_to_object(
        &mut self,
        translation: Vector3<f64>,
        world: &Point3<f64>,
    ) -> Result<Point3<f64>, SpaceError> {
        self.refresh(translation)?;
        Ok(self.world_to_object.transform_point(world))
    }

    pub(crate) fn object_to_world(
        &mut self,
        translation: Vector3<f64>,
        object: &Point3<f64>,
    ) -> Result<Point3<f64>, SpaceError> {
        self.refresh(translation)?;
        Ok(self.object_to_world.transform_point(object))
    }

    /// Bring caches up to date. Transform changes rebuild the matrices and
    /// both boxes; geometry changes rebuild only the boxes.
    fn refresh(&mut self, translation: Vector3<f64>) -> Result<(), SpaceError> {
        if self.dirty.transform {
            self.object_to_world = Matrix4::new_translation(&translation)
                * self.orientation.to_homogeneous()
                * Matrix4::new_nonuniform_scaling(&self.scale);
            self.world_to_object = self
                .object_to_world
                .try_inverse()
                .ok_or(SpaceError::SingularTransform)?;
            self.refresh_aabbs();
            self.dirty.transform = false;
            self.dirty.geometry = false;
        } else if self.dirty.geometry {
            self.refresh_aabbs();
            self.dirty.geometry = false;
        }
        Ok(())
    }

    fn refresh_aabbs(&mut self) {
        self.object_aabb = self.geometry.bounds();
        let mut corners = [Point3::origin(); 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            *corner = self.object_to_world.transform_point(&self.object_aabb.corner(i));
        }
        self.world_aabb = Aabb3::from_points(&corners);
    }

    #[cfg(test)]
    fn is_dirty(&self) -> bool {
        self.dirty.transform || self.dirty.geometry
    }
}

impl core::fmt::Debug for Shape {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Shape")
            .field("orientation", &self.orientation)
            .field("scale", &self.scale.as_slice())
            .field("transform_dirty", &self.dirty.transform)
            .field("geometry_dirty", &self.dirty.geometry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Cuboid, LineSegment};
    use crate::object::{ObjectStore, SpaceObject};
    use core::f64::consts::FRAC_PI_2;
    use nalgebra::DVector;

    fn unit_line() -> Box<dyn Geometry> {
        Box::new(LineSegment::new(
            Point3::origin(),
            Point3::new(1.0, 0.0, 0.0),
        ))
    }

    #[test]
    fn closest_point_round_trips_through_the_transform() {
        let mut store = ObjectStore::new();
        let id = store.insert(SpaceObject::with_shape(unit_line()));
        let shape = store.object_mut(id).unwrap();
        shape
            .set_position(DVector::from_vec(vec![0.0, 0.5, 0.0]))
            .unwrap();

        let result = shape
            .closest_point(&Point3::new(0.5, 1.0, 0.0))
            .unwrap();
        assert!((result - Point3::new(0.5, 0.5, 0.0)).norm() < 1e-5);
    }

    #[test]
    fn transform_laws_hold() {
        let mut store = ObjectStore::new();
        let id = store.insert(SpaceObject::with_shape(unit_line()));
        let object = store.object_mut(id).unwrap();
        object
            .set_position(DVector::from_vec(vec![1.0, 2.0, 3.0]))
            .unwrap();
        object
            .set_orientation(UnitQuaternion::from_axis_angle(
                &Vector3::z_axis(),
                FRAC_PI_2,
            ))
            .unwrap();
        object.set_scale(Vector3::new(2.0, 1.0, 0.5)).unwrap();

        let p = Point3::new(0.3, -0.7, 1.1);
        let round_trip = {
            let obj_p = object.world_to_object(&p).unwrap();
            object.object_to_world(&obj_p).unwrap()
        };
        assert!((round_trip - p).norm() < 1e-4);
    }

    #[test]
    fn world_aabb_is_conservative_under_rotation() {
        let mut store = ObjectStore::new();
        let id = store.insert(SpaceObject::with_shape(Box::new(Cuboid::new(
            Point3::new(-1.0, -0.1, -0.1),
            Point3::new(1.0, 0.1, 0.1),
        ))));
        let object = store.object_mut(id).unwrap();
        object
            .set_orientation(UnitQuaternion::from_axis_angle(
                &Vector3::z_axis(),
                core::f64::consts::FRAC_PI_4,
            ))
            .unwrap();

        let aabb = object.world_aabb().unwrap();
        let expected = (2.0_f64.sqrt() / 2.0) * (1.0 + 0.1);
        assert!((aabb.max.x - expected).abs() < 1e-9);
        assert!((aabb.max.y - expected).abs() < 1e-9);
        assert!((aabb.max.z - 0.1).abs() < 1e-12);
    }

    #[test]
    fn caches_refresh_exactly_when_dirty() {
        let mut store = ObjectStore::new();
        let id = store.insert(SpaceObject::with_shape(unit_line()));
        let object = store.object_mut(id).unwrap();

        let _ = object.world_aabb().unwrap();
        assert!(!object.shape().unwrap().is_dirty());

        // Clean reads stay clean.
        let _ = object.closest_point(&Point3::origin()).unwrap();
        assert!(!object.shape().unwrap().is_dirty());

        // A position write dirties the transform; the next read cleans it.
        object
            .set_position(DVector::from_vec(vec![5.0, 0.0, 0.0]))
            .unwrap();
        assert!(object.shape().unwrap().is_dirty());
        let aabb = object.world_aabb().unwrap();
        assert_eq!(aabb.min.x, 5.0);
        assert!(!object.shape().unwrap().is_dirty());

        // Geometry replacement refreshes bounds without touching matrices.
        object
            .set_geometry(Box::new(LineSegment::new(
                Point3::origin(),
                Point3::new(0.0, 2.0, 0.0),
            )))
            .unwrap();
        assert!(object.shape().unwrap().is_dirty());
        let aabb = object.world_aabb().unwrap();
        assert_eq!(aabb.max.y, 2.0);
    }

    #[test]
    fn zero_scale_is_a_singular_transform() {
        let mut store = ObjectStore::new();
        let id = store.insert(SpaceObject::with_shape(unit_line()));
        let object = store.object_mut(id).unwrap();
        object.set_scale(Vector3::new(0.0, 1.0, 1.0)).unwrap();
        assert!(matches!(
            object.world_aabb(),
            Err(SpaceError::SingularTransform)
        ));
    }
}
