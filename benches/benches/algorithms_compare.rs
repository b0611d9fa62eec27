// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use nalgebra::DVector;

use murmuration_space::algorithms::kdtree::{AnnAlgorithm, KdTreeAlgorithm};
use murmuration_space::algorithms::ntree::NTreeAlgorithm;
use murmuration_space::{AdmissionPolicy, ObjectStore, Space, SpaceObject};

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

fn unit_cube_ntree() -> Space {
    Space::new(
        "bench",
        NTreeAlgorithm::new(DVector::zeros(3), DVector::from_vec(vec![1.0, 1.0, 1.0]))
            .unwrap(),
    )
}

fn populated_space(make: &dyn Fn() -> Space, count: usize) -> (ObjectStore, Space) {
    let mut rng = Rng::new(0xDEAD_BEEF_CAFE_F00D);
    let mut store = ObjectStore::new();
    let mut space = make();
    let policy = AdmissionPolicy {
        radius: 0.1,
        cap: 8,
        replace_farther: true,
    };
    for _ in 0..count {
        let id = store.insert(SpaceObject::at(DVector::from_vec(vec![
            rng.next_f64(),
            rng.next_f64(),
            rng.next_f64(),
        ])));
        space.add_object(&mut store, id, true, Some(policy)).unwrap();
    }
    (store, space)
}

fn jitter(store: &mut ObjectStore, space: &Space, rng: &mut Rng) {
    for proxy in space.proxies() {
        let delta = DVector::from_vec(vec![
            (rng.next_f64() - 0.5) * 0.01,
            (rng.next_f64() - 0.5) * 0.01,
            (rng.next_f64() - 0.5) * 0.01,
        ]);
        let object = store.object_mut(proxy.object()).unwrap();
        let mut position = object.position() + delta;
        for d in 0..3 {
            position[d] = position[d].clamp(0.0, 1.0);
        }
        object.set_position(position).unwrap();
    }
}

/// One cold tick (structure build plus neighbor pass) per algorithm.
fn bench_full_tick(c: &mut Criterion) {
    let algorithms: Vec<(&str, Box<dyn Fn() -> Space>)> = vec![
        ("ntree", Box::new(unit_cube_ntree)),
        ("kdtree", Box::new(|| Space::new("bench", KdTreeAlgorithm::new(3)))),
        ("ann", Box::new(|| Space::new("bench", AnnAlgorithm::new(3)))),
    ];

    for count in [512_usize, 4096] {
        let mut group = c.benchmark_group(format!("tick_{count}"));
        group.throughput(Throughput::Elements(count as u64));
        for (name, make) in &algorithms {
            group.bench_function(*name, |b| {
                b.iter_batched(
                    || populated_space(make.as_ref(), count),
                    |(mut store, mut space)| {
                        space.update(&mut store).unwrap();
                        black_box(space.neighbor_objects().len())
                    },
                    BatchSize::LargeInput,
                );
            });
        }
        group.finish();
    }
}

/// Warm ticks over a drifting population, the flocking steady state: the
/// n-tree re-filters its existing subdivision, the k-d tree rebuilds.
fn bench_drift(c: &mut Criterion) {
    let algorithms: Vec<(&str, Box<dyn Fn() -> Space>)> = vec![
        ("ntree_incremental", Box::new(unit_cube_ntree)),
        (
            "kdtree_rebuild",
            Box::new(|| Space::new("bench", KdTreeAlgorithm::new(3))),
        ),
    ];

    let mut group = c.benchmark_group("drift_2048");
    group.throughput(Throughput::Elements(2048));
    for (name, make) in &algorithms {
        group.bench_function(*name, |b| {
            let (mut store, mut space) = populated_space(make.as_ref(), 2048);
            let mut rng = Rng::new(7);
            space.update(&mut store).unwrap();
            b.iter(|| {
                jitter(&mut store, &space, &mut rng);
                space.update(&mut store).unwrap();
                black_box(space.visible_objects().len())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_full_tick, bench_drift);
criterion_main!(benches);
