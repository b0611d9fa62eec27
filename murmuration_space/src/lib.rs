// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Murmuration Space: a multi-algorithm spatial neighborhood engine.
//!
//! Murmuration Space maintains, for sets of N-dimensional objects, per-object
//! *neighbor lists*: the other objects within a configurable radius, capped
//! at a maximum count, sorted by distance, with optional replace-farther
//! semantics. Objects live in an [`ObjectStore`]; any object can join any
//! number of named [`Space`]s, each indexed by its own strategy, with
//! per-space visibility and admission policy.
//!
//! - [`ObjectStore`] / [`SpaceObject`]: generational arena of objects, each
//!   carrying its position and a per-space registry of [`NeighborGroup`]s.
//! - [`AdmissionPolicy`]: radius, cap, and replace-farther, enforced on every
//!   candidate regardless of which algorithm discovered it.
//! - [`Space`]: one named container running the two-phase tick: classify,
//!   rebuild the index over the visible set, recompute neighbor lists for
//!   the neighbor-capable set.
//! - [`SpaceManager`]: named registry with batched update in registration
//!   order.
//! - [`algorithms`]: permanent topology, n-tree, k-d tree, approximate
//!   nearest neighbors, r-tree over shape bounds, and grid sampling.
//! - [`Shape`] objects add a geometry with a TRS transform, lazily cached
//!   bounding boxes, and world-space closest-point queries.
//!
//! # Example
//!
//! ```rust
//! use murmuration_space::algorithms::kdtree::KdTreeAlgorithm;
//! use murmuration_space::{AdmissionPolicy, ObjectStore, Space, SpaceObject};
//! use nalgebra::DVector;
//!
//! let mut store = ObjectStore::new();
//! let mut space = Space::new("flock", KdTreeAlgorithm::new(3));
//!
//! let a = store.insert(SpaceObject::at(DVector::from_vec(vec![0.0, 0.0, 0.0])));
//! let b = store.insert(SpaceObject::at(DVector::from_vec(vec![1.0, 0.0, 0.0])));
//! let policy = AdmissionPolicy { radius: 10.0, cap: 1, replace_farther: false };
//! space.add_object(&mut store, a, true, Some(policy)).unwrap();
//! space.add_object(&mut store, b, true, Some(policy)).unwrap();
//!
//! space.update(&mut store).unwrap();
//!
//! let neighbors = store.object(a).unwrap().neighbors("flock").unwrap();
//! assert_eq!(neighbors.len(), 1);
//! assert_eq!(neighbors[0].target(), b);
//! assert_eq!(neighbors[0].distance(), 1.0);
//! ```
//!
//! ## Choosing an algorithm
//!
//! - `PermanentNeighborsAlgorithm`: the client authors the topology once;
//!   ticks only refresh distances. Cheapest by far when the relation graph
//!   is static.
//! - `NTreeAlgorithm`: recursive `2^D` subdivision with pooled nodes and an
//!   incremental update; the general-purpose choice for moving point sets
//!   in a known box.
//! - `KdTreeAlgorithm` / `AnnAlgorithm`: per-tick rebuilt point index;
//!   the exact variant serves radius queries, the approximate one trades
//!   accuracy for pruning on k-nearest.
//! - `RTreeAlgorithm`: shapes indexed by world bounding box, closest-point
//!   distances against box or surface. Dimension 3 only.
//! - `GridAlgorithm`: neighbors synthesized from a dense field (cell
//!   lookup, interpolation, centroid, or peak search), with optional
//!   write-back of neighbor values into the cells.
//!
//! ### Update contract
//!
//! Ticks are synchronous and single-threaded. Within one `Space::update`,
//! classification sees a consistent position snapshot, the structure phase
//! completes before any neighbor work, and every capable object's list is
//! cleared before candidates are offered. Stored lists are always sorted by
//! non-decreasing distance. Across spaces in one `update_all`, no ordering
//! is guaranteed beyond registration order of the spaces themselves.

pub mod algorithms;
pub mod error;
pub mod geometry;
pub mod grid_tools;
pub mod group;
pub mod info;
pub mod manager;
pub mod object;
pub mod relation;
pub mod shape;
pub mod space;

pub use error::SpaceError;
pub use geometry::{Aabb3, Cuboid, Geometry, LineSegment, Sphere};
pub use group::{AdmissionPolicy, NeighborGroup};
pub use info::Info;
pub use manager::SpaceManager;
pub use object::{ObjectId, ObjectStore, SpaceObject};
pub use relation::NeighborRelation;
pub use shape::Shape;
pub use space::{ProxyClass, Space, SpaceProxy};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::kdtree::{AnnAlgorithm, KdTreeAlgorithm};
    use crate::algorithms::ntree::NTreeAlgorithm;
    use nalgebra::DVector;

    /// Deterministic xorshift positions, enough for structural tests.
    struct Rng(u64);

    impl Rng {
        fn next_f64(&mut self) -> f64 {
            let mut x = self.0;
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            self.0 = x;
            ((x >> 11) as f64) / ((1_u64 << 53) as f64)
        }
    }

    fn populate(
        store: &mut ObjectStore,
        space: &mut Space,
        count: usize,
        policy: AdmissionPolicy,
    ) -> Vec<ObjectId> {
        let mut rng = Rng(0x9e37_79b9_7f4a_7c15);
        let dim = space.dim();
        (0..count)
            .map(|_| {
                let coords: Vec<f64> = (0..dim).map(|_| rng.next_f64()).collect();
                let id = store.insert(SpaceObject::at(DVector::from_vec(coords)));
                space.add_object(store, id, true, Some(policy)).unwrap();
                id
            })
            .collect()
    }

    /// The list invariants that must hold after any update, for any
    /// algorithm: sorted distances, radius bound, cap bound, no self
    /// relations, and direction consistent with the endpoint positions.
    fn assert_list_invariants(store: &ObjectStore, ids: &[ObjectId], space: &str) {
        for &id in ids {
            let object = store.object(id).unwrap();
            let group = object.neighbor_group(space).unwrap();
            let policy = *group.policy().unwrap();
            let relations = group.relations();

            for pair in relations.windows(2) {
                assert!(pair[0].distance() <= pair[1].distance(), "sorted by distance");
            }
            if policy.radius >= 0.0 {
                assert!(relations.iter().all(|r| r.distance() <= policy.radius));
            }
            if policy.cap >= 0 {
                assert!(relations.len() as i64 <= i64::from(policy.cap));
            }
            for relation in relations {
                assert_ne!(relation.target(), id, "no self relations");
                let target_pos = store.object(relation.target()).unwrap().position();
                let expected = target_pos - object.position();
                let scale = 1.0 + target_pos.norm() + object.position().norm();
                assert!(
                    (relation.direction() - expected).norm() < 1e-4 * scale,
                    "direction matches endpoint positions"
                );
            }
        }
    }

    #[test]
    fn point_algorithms_uphold_the_list_invariants() {
        let policy = AdmissionPolicy {
            radius: 0.35,
            cap: 6,
            replace_farther: true,
        };
        let algorithms: Vec<(&str, Box<dyn Fn() -> Space>)> = vec![
            ("kd", Box::new(|| Space::new("s", KdTreeAlgorithm::new(2)))),
            ("ann", Box::new(|| Space::new("s", AnnAlgorithm::new(2)))),
            (
                "ntree",
                Box::new(|| {
                    Space::new(
                        "s",
                        NTreeAlgorithm::new(
                            DVector::from_vec(vec![0.0, 0.0]),
                            DVector::from_vec(vec![1.0, 1.0]),
                        )
                        .unwrap(),
                    )
                }),
            ),
        ];

        for (name, make) in algorithms {
            let mut store = ObjectStore::new();
            let mut space = make();
            let ids = populate(&mut store, &mut space, 48, policy);
            space.update(&mut store).unwrap();
            assert_list_invariants(&store, &ids, "s");

            // A second tick over unchanged positions reproduces the lists.
            let before: Vec<Vec<ObjectId>> = ids
                .iter()
                .map(|&id| {
                    store
                        .object(id)
                        .unwrap()
                        .neighbors("s")
                        .unwrap()
                        .iter()
                        .map(|r| r.target())
                        .collect()
                })
                .collect();
            space.update(&mut store).unwrap();
            let after: Vec<Vec<ObjectId>> = ids
                .iter()
                .map(|&id| {
                    store
                        .object(id)
                        .unwrap()
                        .neighbors("s")
                        .unwrap()
                        .iter()
                        .map(|r| r.target())
                        .collect()
                })
                .collect();
            assert_eq!(before, after, "{name} update is idempotent");
        }
    }

    #[test]
    fn one_object_in_two_spaces_keeps_separate_groups() {
        let mut store = ObjectStore::new();
        let mut manager = SpaceManager::new();
        manager
            .add_space(Space::new("near", KdTreeAlgorithm::new(2)))
            .unwrap();
        manager
            .add_space(Space::new("far", KdTreeAlgorithm::new(2)))
            .unwrap();

        let a = store.insert(SpaceObject::at(DVector::from_vec(vec![0.0, 0.0])));
        let b = store.insert(SpaceObject::at(DVector::from_vec(vec![2.0, 0.0])));
        let near = AdmissionPolicy {
            radius: 1.0,
            cap: 4,
            replace_farther: false,
        };
        let far = AdmissionPolicy {
            radius: 10.0,
            cap: 4,
            replace_farther: false,
        };
        for id in [a, b] {
            manager.add_object("near", &mut store, id, true, Some(near)).unwrap();
            manager.add_object("far", &mut store, id, true, Some(far)).unwrap();
        }

        manager.update_all(&mut store).unwrap();

        let object = store.object(a).unwrap();
        assert!(object.neighbors("near").unwrap().is_empty(), "radius 1 misses");
        assert_eq!(object.neighbors("far").unwrap().len(), 1, "radius 10 hits");
    }
}
