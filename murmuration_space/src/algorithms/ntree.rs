// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Adapter binding the pooled partition tree to spaces.

use indexmap::IndexSet;
use nalgebra::DVector;

use murmuration_ntree::{NTree, NeighborSink, PoolConfig, TreeConfig};

use crate::algorithms::{AlgorithmBounds, SpaceAlgorithm};
use crate::error::SpaceError;
use crate::object::{ObjectId, ObjectStore};
use crate::relation::NeighborRelation;

/// Routes tree candidates into per-object admission policies.
///
/// Sink callbacks cannot return errors, so the first failure is parked and
/// every later callback backs off; the adapter surfaces it afterwards.
struct AdmissionSink<'a> {
    store: &'a mut ObjectStore,
    space: &'a str,
    roster: &'a IndexSet<ObjectId>,
    failure: Option<SpaceError>,
}

impl AdmissionSink<'_> {
    fn object_of(&self, slot: usize) -> Option<ObjectId> {
        self.roster.get_index(slot).copied()
    }
}

impl NeighborSink for AdmissionSink<'_> {
    fn begin(&mut self, slot: usize) {
        if self.failure.is_some() {
            return;
        }
        let Some(id) = self.object_of(slot) else {
            return;
        };
        if let Err(e) = self.store.clear_neighbors(id, self.space) {
            self.failure = Some(e);
        }
    }

    fn radius(&self, slot: usize) -> f64 {
        self.object_of(slot)
            .and_then(|id| self.store.get(id))
            .and_then(|o| o.neighbor_group(self.space).ok())
            .and_then(|g| g.policy().map(|p| p.radius))
            .unwrap_or(-1.0)
    }

    fn is_full(&self, slot: usize) -> bool {
        if self.failure.is_some() {
            return true;
        }
        self.object_of(slot)
            .and_then(|id| self.store.get(id))
            .and_then(|o| o.neighbor_group(self.space).ok())
            .is_none_or(|g| g.is_full())
    }

    fn offer(&mut self, slot: usize, candidate: usize) {
        if self.failure.is_some() {
            return;
        }
        let (Some(source), Some(target)) = (self.object_of(slot), self.object_of(candidate))
        else {
            return;
        };
        let result = (|| -> Result<(), SpaceError> {
            let source_pos = self.store.object(source)?.position().clone_owned();
            let direction = self.store.object(target)?.position() - &source_pos;
            let distance = direction.norm();
            let relation = NeighborRelation::new(source, target, distance, direction)?;
            self.store.insert_relation(source, self.space, relation)?;
            Ok(())
        })();
        if let Err(e) = result {
            self.failure = Some(e);
        }
    }
}

/// Recursive `2^D` partition tree over the visible set.
///
/// The structure phase re-filters (or builds) the tree; the neighbor phase
/// runs the tree's ascent–descent range search, offering every co-located
/// candidate to the owning object's admission policy.
pub struct NTreeAlgorithm {
    bounds: AlgorithmBounds,
    tree: NTree,
    roster: IndexSet<ObjectId>,
}

impl NTreeAlgorithm {
    /// Bounded variant over `[min, max]` with default knobs.
    pub fn new(min: DVector<f64>, max: DVector<f64>) -> Result<Self, SpaceError> {
        Self::with_config(min, max, TreeConfig::default(), PoolConfig::default())
    }

    /// Bounded variant with explicit subdivision and pool knobs.
    pub fn with_config(
        min: DVector<f64>,
        max: DVector<f64>,
        tree: TreeConfig,
        pool: PoolConfig,
    ) -> Result<Self, SpaceError> {
        let bounds = AlgorithmBounds::bounded(min, max)?;
        let tree = NTree::with_config(
            bounds.min().as_slice().to_vec(),
            bounds.max().as_slice().to_vec(),
            tree,
            pool,
        );
        Ok(Self {
            bounds,
            tree,
            roster: IndexSet::new(),
        })
    }

    /// Unbounded variant: the space grows the box to the population each
    /// tick, and every resize drops the subdivision for a fresh build.
    pub fn unbounded(dim: usize) -> Self {
        let bounds = AlgorithmBounds::unbounded(dim);
        let tree = NTree::new(
            bounds.min().as_slice().to_vec(),
            bounds.max().as_slice().to_vec(),
        );
        Self {
            bounds,
            tree,
            roster: IndexSet::new(),
        }
    }

    /// The underlying tree.
    pub fn tree(&self) -> &NTree {
        &self.tree
    }
}

impl SpaceAlgorithm for NTreeAlgorithm {
    fn label(&self) -> &'static str {
        "n-tree"
    }

    fn bounds(&self) -> &AlgorithmBounds {
        &self.bounds
    }

    fn bounds_mut(&mut self) -> &mut AlgorithmBounds {
        &mut self.bounds
    }

    fn resize(&mut self, min: DVector<f64>, max: DVector<f64>) -> Result<(), SpaceError> {
        self.bounds.resize(min, max)?;
        self.tree.resize(
            self.bounds.min().as_slice().to_vec(),
            self.bounds.max().as_slice().to_vec(),
        );
        Ok(())
    }

    fn update_structure(
        &mut self,
        store: &mut ObjectStore,
        _space: &str,
        visible: &[ObjectId],
    ) -> Result<(), SpaceError> {
        let dim = self.bounds.dim();
        self.roster.clear();
        let mut items = Vec::with_capacity(visible.len());
        for &id in visible {
            let object = store.object(id)?;
            if object.dim() != dim {
                return Err(SpaceError::DimensionMismatch {
                    expected: dim,
                    found: object.dim(),
                });
            }
            let (slot, _) = self.roster.insert_full(id);
            items.push((slot, object.position().as_slice().to_vec()));
        }
        self.tree.update(items);
        Ok(())
    }

    fn update_neighbors(
        &mut self,
        store: &mut ObjectStore,
        space: &str,
        capable: &[ObjectId],
    ) -> Result<(), SpaceError> {
        let mut queries = Vec::with_capacity(capable.len());
        for &id in capable {
            let (slot, _) = self.roster.insert_full(id);
            let object = store.object(id)?;
            queries.push((slot, object.position().as_slice().to_vec()));
        }

        let mut sink = AdmissionSink {
            store,
            space,
            roster: &self.roster,
            failure: None,
        };
        self.tree.compute_neighbors(&queries, &mut sink);
        match sink.failure.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn as_any(&self) -> &dyn core::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
        self
    }
}

impl core::fmt::Debug for NTreeAlgorithm {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NTreeAlgorithm")
            .field("bounds", &self.bounds)
            .field("tree", &self.tree)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::AdmissionPolicy;
    use crate::object::SpaceObject;
    use crate::space::Space;

    fn point(store: &mut ObjectStore, coords: &[f64]) -> ObjectId {
        store.insert(SpaceObject::at(DVector::from_row_slice(coords)))
    }

    fn unit_square_space(name: &str) -> Space {
        Space::new(
            name,
            NTreeAlgorithm::new(
                DVector::from_vec(vec![0.0, 0.0]),
                DVector::from_vec(vec![1.0, 1.0]),
            )
            .unwrap(),
        )
    }

    #[test]
    fn cap_with_replacement_keeps_the_two_closest() {
        // Scenario: cap 2 with replacement, source at the origin of a 3-D
        // tree, candidates at distances 0.1 through 0.4 within radius 1.
        let mut store = ObjectStore::new();
        let algorithm = NTreeAlgorithm::new(
            DVector::from_vec(vec![-1.0, -1.0, -1.0]),
            DVector::from_vec(vec![1.0, 1.0, 1.0]),
        )
        .unwrap();
        let mut space = Space::new("swarm", algorithm);

        let source = point(&mut store, &[0.0, 0.0, 0.0]);
        let mut candidates = Vec::new();
        for (i, d) in [0.1, 0.2, 0.3, 0.4].into_iter().enumerate() {
            let axis = [d * ((i % 2) as f64 * 2.0 - 1.0), 0.0, 0.0];
            let c = point(&mut store, &[axis[0], axis[1], axis[2]]);
            space.add_object(&mut store, c, true, None).unwrap();
            candidates.push(c);
        }
        space
            .add_object(
                &mut store,
                source,
                true,
                Some(AdmissionPolicy {
                    radius: 1.0,
                    cap: 2,
                    replace_farther: true,
                }),
            )
            .unwrap();

        space.update(&mut store).unwrap();

        let relations = store.object(source).unwrap().neighbors("swarm").unwrap();
        assert_eq!(relations.len(), 2);
        assert_eq!(relations[0].target(), candidates[0]);
        assert!((relations[0].distance() - 0.1).abs() < 1e-12);
        assert_eq!(relations[1].target(), candidates[1]);
        assert!((relations[1].distance() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn results_match_a_brute_force_pass() {
        let mut store = ObjectStore::new();
        let mut space = unit_square_space("grid");
        let policy = AdmissionPolicy {
            radius: 0.4,
            cap: -1,
            replace_farther: false,
        };
        let mut ids = Vec::new();
        for y in 0..4 {
            for x in 0..4 {
                let id = point(&mut store, &[x as f64 / 3.0, y as f64 / 3.0]);
                space.add_object(&mut store, id, true, Some(policy)).unwrap();
                ids.push(id);
            }
        }

        space.update(&mut store).unwrap();

        for &id in &ids {
            let pos = store.object(id).unwrap().position().clone_owned();
            let mut expected: Vec<ObjectId> = ids
                .iter()
                .copied()
                .filter(|&other| {
                    other != id
                        && (store.object(other).unwrap().position() - &pos).norm() <= 0.4
                })
                .collect();
            let mut got: Vec<ObjectId> = store
                .object(id)
                .unwrap()
                .neighbors("grid")
                .unwrap()
                .iter()
                .map(|r| r.target())
                .collect();
            expected.sort();
            got.sort();
            assert_eq!(got, expected);
        }
    }

    #[test]
    fn repeated_updates_are_idempotent() {
        let mut store = ObjectStore::new();
        let mut space = unit_square_space("stable");
        let policy = AdmissionPolicy {
            radius: 0.9,
            cap: 4,
            replace_farther: false,
        };
        for coords in [[0.1, 0.1], [0.6, 0.2], [0.3, 0.8], [0.9, 0.9], [0.5, 0.5]] {
            let id = point(&mut store, &coords);
            space.add_object(&mut store, id, true, Some(policy)).unwrap();
        }

        space.update(&mut store).unwrap();
        let first: Vec<Vec<(ObjectId, f64)>> = space
            .proxies()
            .iter()
            .map(|p| {
                store
                    .object(p.object())
                    .unwrap()
                    .neighbors("stable")
                    .unwrap()
                    .iter()
                    .map(|r| (r.target(), r.distance()))
                    .collect()
            })
            .collect();

        space.update(&mut store).unwrap();
        let second: Vec<Vec<(ObjectId, f64)>> = space
            .proxies()
            .iter()
            .map(|p| {
                store
                    .object(p.object())
                    .unwrap()
                    .neighbors("stable")
                    .unwrap()
                    .iter()
                    .map(|r| (r.target(), r.distance()))
                    .collect()
            })
            .collect();

        assert_eq!(first, second, "same positions give identical lists");
    }

    #[test]
    fn invisible_objects_receive_but_do_not_serve() {
        let mut store = ObjectStore::new();
        let mut space = unit_square_space("oneway");
        let policy = AdmissionPolicy {
            radius: 1.0,
            cap: -1,
            replace_farther: false,
        };
        let ghost = point(&mut store, &[0.4, 0.4]);
        let other = point(&mut store, &[0.5, 0.5]);
        space.add_object(&mut store, ghost, false, Some(policy)).unwrap();
        space.add_object(&mut store, other, true, Some(policy)).unwrap();

        space.update(&mut store).unwrap();

        let ghost_sees = store.object(ghost).unwrap().neighbors("oneway").unwrap();
        assert_eq!(ghost_sees.len(), 1, "invisible objects still get lists");
        assert_eq!(ghost_sees[0].target(), other);
        assert!(
            store.object(other).unwrap().neighbors("oneway").unwrap().is_empty(),
            "invisible objects are not candidates"
        );
    }

    #[test]
    fn unbounded_variant_rebuilds_after_resize() {
        let mut store = ObjectStore::new();
        let mut space = Space::new("open", NTreeAlgorithm::unbounded(2));
        let policy = AdmissionPolicy {
            radius: 2.0,
            cap: -1,
            replace_farther: false,
        };
        let a = point(&mut store, &[-4.0, 0.0]);
        let b = point(&mut store, &[-3.0, 0.0]);
        space.add_object(&mut store, a, true, Some(policy)).unwrap();
        space.add_object(&mut store, b, true, Some(policy)).unwrap();

        space.update(&mut store).unwrap();
        assert_eq!(
            store.object(a).unwrap().neighbors("open").unwrap().len(),
            1
        );

        // Moving the population forces a resize and a fresh build.
        store
            .object_mut(b)
            .unwrap()
            .set_position(DVector::from_vec(vec![6.0, 0.0]))
            .unwrap();
        space.update(&mut store).unwrap();
        assert!(store.object(a).unwrap().neighbors("open").unwrap().is_empty());
        assert_eq!(space.max().as_slice(), &[6.0, 0.0]);
    }
}
