// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Space basics.
//!
//! Build an object store, run an n-tree space through the manager, move an
//! object, and print the resulting neighbor lists.
//!
//! Run:
//! - `cargo run -p murmuration_examples --example space_basics`

use murmuration_space::algorithms::ntree::NTreeAlgorithm;
use murmuration_space::{AdmissionPolicy, Info, ObjectStore, Space, SpaceManager, SpaceObject};
use nalgebra::DVector;

fn main() {
    let mut store = ObjectStore::new();
    let mut manager = SpaceManager::new();

    // A 2-D space over the unit square.
    let algorithm = NTreeAlgorithm::new(
        DVector::from_vec(vec![0.0, 0.0]),
        DVector::from_vec(vec![1.0, 1.0]),
    )
    .expect("bounds are well formed");
    manager
        .add_space(Space::new("flock", algorithm))
        .expect("fresh name");

    // A few objects with a radius-bounded, capped policy.
    let policy = AdmissionPolicy {
        radius: 0.5,
        cap: 3,
        replace_farther: true,
    };
    let mut ids = Vec::new();
    for coords in [[0.2, 0.2], [0.3, 0.25], [0.8, 0.8], [0.25, 0.6], [0.7, 0.75]] {
        let id = store.insert(SpaceObject::at(DVector::from_row_slice(&coords)));
        manager
            .add_object("flock", &mut store, id, true, Some(policy))
            .expect("object joins the space");
        ids.push(id);
    }

    manager.update_all(&mut store).expect("tick succeeds");

    for &id in &ids {
        let object = store.object(id).expect("live object");
        let neighbors = object.neighbors("flock").expect("group exists");
        println!(
            "object {} at {:?}: {} neighbor(s)",
            object.serial(),
            object.position().as_slice(),
            neighbors.len()
        );
        for relation in neighbors {
            println!("  -> distance {:.3}", relation.distance());
        }
    }

    // Move one object and tick again: lists follow the positions.
    store
        .object_mut(ids[2])
        .expect("live object")
        .set_position(DVector::from_vec(vec![0.21, 0.21]))
        .expect("dimension matches");
    manager.update_all(&mut store).expect("tick succeeds");

    let moved = store.object(ids[2]).expect("live object");
    println!(
        "after moving: object {} has {} neighbor(s)",
        moved.serial(),
        moved.neighbors("flock").expect("group exists").len()
    );

    println!("{}", manager.info(1));
}
