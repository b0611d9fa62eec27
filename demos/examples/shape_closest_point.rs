// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shapes and closest points.
//!
//! Place a line shape in the world, query its closest point directly, then
//! let an r-tree space compute shape neighbors for a probe object.
//!
//! Run:
//! - `cargo run -p murmuration_examples --example shape_closest_point`

use murmuration_space::algorithms::rtree::{RTreeAlgorithm, RTreeClosestPointMode};
use murmuration_space::{
    AdmissionPolicy, LineSegment, ObjectStore, Space, SpaceObject,
};
use nalgebra::{DVector, Point3, Vector3};

fn main() {
    let mut store = ObjectStore::new();

    // A unit line along x, lifted half a unit along y.
    let line = store.insert(SpaceObject::with_shape(Box::new(LineSegment::new(
        Point3::origin(),
        Point3::new(1.0, 0.0, 0.0),
    ))));
    store
        .object_mut(line)
        .expect("live object")
        .set_position(DVector::from_vec(vec![0.0, 0.5, 0.0]))
        .expect("dimension matches");

    let closest = store
        .object_mut(line)
        .expect("live object")
        .closest_point(&Point3::new(0.5, 1.0, 0.0))
        .expect("shape query");
    println!("closest point on the placed line: {closest}");

    // An r-tree space measuring distances to shape surfaces.
    let algorithm = RTreeAlgorithm::new(
        Vector3::new(-10.0, -10.0, -10.0),
        Vector3::new(10.0, 10.0, 10.0),
        RTreeClosestPointMode::ClosestPointShape,
    )
    .expect("bounds are well formed");
    let mut space = Space::new("shapes", algorithm);

    space
        .add_object(&mut store, line, true, None)
        .expect("shape joins the space");
    let probe = store.insert(SpaceObject::at(DVector::from_vec(vec![0.5, 2.0, 0.0])));
    space
        .add_object(
            &mut store,
            probe,
            true,
            Some(AdmissionPolicy {
                radius: 5.0,
                cap: 2,
                replace_farther: false,
            }),
        )
        .expect("probe joins the space");

    space.update(&mut store).expect("tick succeeds");

    for relation in store
        .object(probe)
        .expect("live object")
        .neighbors("shapes")
        .expect("group exists")
    {
        println!(
            "probe sees shape at distance {:.3}, direction {:?}",
            relation.distance(),
            relation.direction().as_slice()
        );
    }
}
