// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Geometry capability consumed by shapes, plus a few concrete primitives.

use nalgebra::{Point3, Vector3};

/// Axis-aligned box in 3-D.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb3 {
    /// Minimum corner.
    pub min: Point3<f64>,
    /// Maximum corner.
    pub max: Point3<f64>,
}

impl Aabb3 {
    /// Box from two corners (assumed ordered).
    pub const fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    /// Smallest box containing a non-empty point set.
    pub fn from_points(points: &[Point3<f64>]) -> Self {
        debug_assert!(!points.is_empty(), "point set must be non-empty");
        let mut min = points[0];
        let mut max = points[0];
        for p in &points[1..] {
            for axis in 0..3 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
            }
        }
        Self { min, max }
    }

    /// Cube of half-extent `r` around a centre.
    pub fn around(centre: Point3<f64>, r: f64) -> Self {
        Self {
            min: centre - Vector3::repeat(r),
            max: centre + Vector3::repeat(r),
        }
    }

    /// Corner `i` (bit per axis, bit set selecting the maximum).
    pub fn corner(&self, i: usize) -> Point3<f64> {
        Point3::new(
            if i & 1 != 0 { self.max.x } else { self.min.x },
            if i & 2 != 0 { self.max.y } else { self.min.y },
            if i & 4 != 0 { self.max.z } else { self.min.z },
        )
    }

    /// Union with another box.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: Point3::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            max: Point3::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        }
    }

    /// True when the boxes overlap (boundaries included).
    pub fn intersects(&self, other: &Self) -> bool {
        (0..3).all(|a| self.min[a] <= other.max[a] && self.max[a] >= other.min[a])
    }

    /// True when the point lies inside or on the boundary.
    pub fn contains(&self, p: &Point3<f64>) -> bool {
        (0..3).all(|a| self.min[a] <= p[a] && p[a] <= self.max[a])
    }

    /// Closest point of the solid box to `p` (p itself when inside).
    pub fn closest_point(&self, p: &Point3<f64>) -> Point3<f64> {
        Point3::new(
            p.x.clamp(self.min.x, self.max.x),
            p.y.clamp(self.min.y, self.max.y),
            p.z.clamp(self.min.z, self.max.z),
        )
    }

    /// Surface area.
    pub fn area(&self) -> f64 {
        let d = self.max - self.min;
        let (x, y, z) = (d.x.max(0.0), d.y.max(0.0), d.z.max(0.0));
        2.0 * (x * y + y * z + z * x)
    }
}

/// Closed-form geometry consumed by shapes: object-space bounds and
/// closest-point queries. Implementations live outside the engine; the
/// primitives below cover shape construction in tests and demos.
pub trait Geometry: core::fmt::Debug + Send + Sync {
    /// Object-space bounding box.
    fn bounds(&self) -> Aabb3;

    /// Closest point of the geometry to `p`, in object space.
    fn closest_point(&self, p: &Point3<f64>) -> Point3<f64>;
}

/// Straight segment between two points.
#[derive(Copy, Clone, Debug)]
pub struct LineSegment {
    /// Segment start.
    pub start: Point3<f64>,
    /// Segment end.
    pub end: Point3<f64>,
}

impl LineSegment {
    /// Segment from `start` to `end`.
    pub const fn new(start: Point3<f64>, end: Point3<f64>) -> Self {
        Self { start, end }
    }
}

impl Geometry for LineSegment {
    fn bounds(&self) -> Aabb3 {
        Aabb3::from_points(&[self.start, self.end])
    }

    fn closest_point(&self, p: &Point3<f64>) -> Point3<f64> {
        let axis = self.end - self.start;
        let len_sq = axis.norm_squared();
        if len_sq == 0.0 {
            return self.start;
        }
        let t = ((p - self.start).dot(&axis) / len_sq).clamp(0.0, 1.0);
        self.start + axis * t
    }
}

/// Solid axis-aligned cuboid.
#[derive(Copy, Clone, Debug)]
pub struct Cuboid {
    /// Minimum corner.
    pub min: Point3<f64>,
    /// Maximum corner.
    pub max: Point3<f64>,
}

impl Cuboid {
    /// Cuboid from two corners (assumed ordered).
    pub const fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }
}

impl Geometry for Cuboid {
    fn bounds(&self) -> Aabb3 {
        Aabb3::new(self.min, self.max)
    }

    fn closest_point(&self, p: &Point3<f64>) -> Point3<f64> {
        Aabb3::new(self.min, self.max).closest_point(p)
    }
}

/// Solid sphere.
#[derive(Copy, Clone, Debug)]
pub struct Sphere {
    /// Centre.
    pub centre: Point3<f64>,
    /// Radius.
    pub radius: f64,
}

impl Sphere {
    /// Sphere around a centre.
    pub const fn new(centre: Point3<f64>, radius: f64) -> Self {
        Self { centre, radius }
    }
}

impl Geometry for Sphere {
    fn bounds(&self) -> Aabb3 {
        Aabb3::around(self.centre, self.radius)
    }

    fn closest_point(&self, p: &Point3<f64>) -> Point3<f64> {
        let offset = p - self.centre;
        let dist = offset.norm();
        if dist <= self.radius {
            return *p;
        }
        self.centre + offset * (self.radius / dist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aabb_union_and_intersection() {
        let a = Aabb3::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        let b = Aabb3::new(Point3::new(0.5, 0.5, 0.5), Point3::new(2.0, 2.0, 2.0));
        let u = a.union(&b);
        assert_eq!(u.min, Point3::origin());
        assert_eq!(u.max, Point3::new(2.0, 2.0, 2.0));
        assert!(a.intersects(&b));

        let c = Aabb3::new(Point3::new(3.0, 0.0, 0.0), Point3::new(4.0, 1.0, 1.0));
        assert!(!a.intersects(&c));
        // Shared boundary counts as intersecting.
        let d = Aabb3::new(Point3::new(1.0, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
        assert!(a.intersects(&d));
    }

    #[test]
    fn line_closest_point_clamps_to_endpoints() {
        let line = LineSegment::new(Point3::origin(), Point3::new(1.0, 0.0, 0.0));
        let mid = line.closest_point(&Point3::new(0.5, 1.0, 0.0));
        assert_eq!(mid, Point3::new(0.5, 0.0, 0.0));
        let before = line.closest_point(&Point3::new(-2.0, 0.0, 0.0));
        assert_eq!(before, Point3::origin());
        let after = line.closest_point(&Point3::new(5.0, 3.0, 0.0));
        assert_eq!(after, Point3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn cuboid_closest_point_is_clamp() {
        let cuboid = Cuboid::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        assert_eq!(
            cuboid.closest_point(&Point3::new(2.0, 0.5, -1.0)),
            Point3::new(1.0, 0.5, 0.0)
        );
        // Inside the solid the point is its own closest point.
        let inside = Point3::new(0.3, 0.3, 0.3);
        assert_eq!(cuboid.closest_point(&inside), inside);
    }

    #[test]
    fn sphere_closest_point_projects_to_surface() {
        let sphere = Sphere::new(Point3::origin(), 1.0);
        let p = sphere.closest_point(&Point3::new(2.0, 0.0, 0.0));
        assert!((p - Point3::new(1.0, 0.0, 0.0)).norm() < 1e-12);
        let inside = Point3::new(0.2, 0.0, 0.0);
        assert_eq!(sphere.closest_point(&inside), inside);
    }
}
