// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Grid neighbor modes.
//!
//! Seed a small field, then compare what the cell, interpolation, and
//! centroid modes report for the same object.
//!
//! Run:
//! - `cargo run -p murmuration_examples --example grid_field`

use murmuration_space::algorithms::grid::{GridAlgorithm, GridNeighborMode, GridUpdateMode};
use murmuration_space::{AdmissionPolicy, ObjectStore, Space, SpaceObject};
use nalgebra::DVector;

fn run_mode(mode: GridNeighborMode) {
    let mut store = ObjectStore::new();
    let mut algorithm = GridAlgorithm::new(
        1,
        &[4, 4],
        DVector::from_vec(vec![0.0, 0.0]),
        DVector::from_vec(vec![4.0, 4.0]),
        mode,
        GridUpdateMode::NoUpdate,
    )
    .expect("mode supports 2-D");

    // Mass concentrated in one corner cell.
    algorithm
        .grid_mut()
        .field_mut()
        .set_at(&[3, 3], &[9.0])
        .expect("cell exists");

    let mut space = Space::new("field", algorithm);
    let id = store.insert(SpaceObject::at(DVector::from_vec(vec![1.9, 2.1])));
    space
        .add_object(
            &mut store,
            id,
            true,
            Some(AdmissionPolicy {
                radius: -1.0,
                cap: 4,
                replace_farther: false,
            }),
        )
        .expect("object joins the space");

    space.update(&mut store).expect("tick succeeds");

    let neighbors = store
        .object(id)
        .expect("live object")
        .neighbors("field")
        .expect("group exists");
    println!("{mode:?}: {} synthetic neighbor(s)", neighbors.len());
    for relation in neighbors {
        let target = store.object(relation.target()).expect("scratch target");
        println!(
            "  at {:?} value {:?} distance {:.3}",
            target.position().as_slice(),
            relation.value().as_slice(),
            relation.distance()
        );
    }
}

fn main() {
    for mode in [
        GridNeighborMode::CellLocation,
        GridNeighborMode::AvgLocation,
        GridNeighborMode::AvgRegion,
        GridNeighborMode::PeakSearch,
    ] {
        run_mode(mode);
    }
}
