// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sanity comparison of the in-tree r-tree space against `rstar` for bulk
//! build plus box queries over the same shape set.

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use nalgebra::{DVector, Point3, Vector3};
use rstar::{AABB, RTree, RTreeObject};

use murmuration_space::algorithms::rtree::{RTreeAlgorithm, RTreeClosestPointMode};
use murmuration_space::{AdmissionPolicy, Cuboid, ObjectStore, Space, SpaceObject};

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn next_f64(&mut self) -> f64 {
        let v = self.next_u64() >> 11;
        (v as f64) / ((1u64 << 53) as f64)
    }
}

const COUNT: usize = 2048;
const EXTENT: f64 = 100.0;

fn boxes(seed: u64) -> Vec<[f64; 6]> {
    let mut rng = Rng::new(seed);
    (0..COUNT)
        .map(|_| {
            let x = rng.next_f64() * EXTENT;
            let y = rng.next_f64() * EXTENT;
            let z = rng.next_f64() * EXTENT;
            let w = 0.5 + rng.next_f64();
            [x, y, z, x + w, y + w, z + w]
        })
        .collect()
}

struct Slab {
    bounds: [f64; 6],
}

impl RTreeObject for Slab {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bounds[0], self.bounds[1], self.bounds[2]],
            [self.bounds[3], self.bounds[4], self.bounds[5]],
        )
    }
}

fn murmuration_setup() -> (ObjectStore, Space) {
    let mut store = ObjectStore::new();
    let algorithm = RTreeAlgorithm::new(
        Vector3::new(0.0, 0.0, 0.0),
        Vector3::new(EXTENT + 2.0, EXTENT + 2.0, EXTENT + 2.0),
        RTreeClosestPointMode::ClosestPointAabb,
    )
    .unwrap();
    let mut space = Space::new("bench", algorithm);
    let policy = AdmissionPolicy {
        radius: 3.0,
        cap: 8,
        replace_farther: true,
    };
    for b in boxes(42) {
        let half = [
            (b[3] - b[0]) / 2.0,
            (b[4] - b[1]) / 2.0,
            (b[5] - b[2]) / 2.0,
        ];
        let id = store.insert(SpaceObject::with_shape(Box::new(Cuboid::new(
            Point3::new(-half[0], -half[1], -half[2]),
            Point3::new(half[0], half[1], half[2]),
        ))));
        store
            .object_mut(id)
            .unwrap()
            .set_position(DVector::from_vec(vec![
                b[0] + half[0],
                b[1] + half[1],
                b[2] + half[2],
            ]))
            .unwrap();
        space.add_object(&mut store, id, true, Some(policy)).unwrap();
    }
    (store, space)
}

fn bench_build_and_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("rtree_compare");
    group.throughput(Throughput::Elements(COUNT as u64));

    group.bench_function("murmuration_tick", |b| {
        b.iter_batched(
            murmuration_setup,
            |(mut store, mut space)| {
                space.update(&mut store).unwrap();
                black_box(space.visible_objects().len())
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("rstar_bulk_and_query", |b| {
        b.iter_batched(
            || boxes(42),
            |bs| {
                let slabs: Vec<Slab> = bs.iter().map(|&bounds| Slab { bounds }).collect();
                let tree = RTree::bulk_load(slabs);
                let mut hits = 0usize;
                for b in &bs {
                    let query = AABB::from_corners(
                        [b[0] - 3.0, b[1] - 3.0, b[2] - 3.0],
                        [b[3] + 3.0, b[4] + 3.0, b[5] + 3.0],
                    );
                    hits += tree.locate_in_envelope_intersecting(&query).count();
                }
                black_box(hits)
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_build_and_query);
criterion_main!(benches);
