// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Named object containers and their two-phase update.

use bitflags::bitflags;
use nalgebra::DVector;
use tracing::debug;

use crate::algorithms::SpaceAlgorithm;
use crate::error::SpaceError;
use crate::group::{AdmissionPolicy, NeighborGroup};
use crate::object::{ObjectId, ObjectStore};

bitflags! {
    /// Per-proxy classification computed at the start of every tick.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ProxyClass: u8 {
        /// The object can serve as a neighbor candidate this tick.
        const VISIBLE          = 0b0000_0001;
        /// The object receives a neighbor list this tick.
        const NEIGHBOR_CAPABLE = 0b0000_0010;
    }
}

/// The space-side handle tying an object to its per-space neighbor group.
#[derive(Copy, Clone, Debug)]
pub struct SpaceProxy {
    object: ObjectId,
    class: ProxyClass,
}

impl SpaceProxy {
    /// Handle of the proxied object.
    pub fn object(&self) -> ObjectId {
        self.object
    }

    /// Classification from the most recent tick.
    pub fn class(&self) -> ProxyClass {
        self.class
    }
}

/// A named container of objects indexed by one algorithm.
///
/// Each tick, [`update`](Self::update) runs three steps in order:
/// classification, structure, neighbors. Classification rebuilds the visible
/// and neighbor-capable sets; an object is *visible* when its group flag is
/// set (and, for bounded algorithms, its position lies inside the bounds),
/// and *neighbor-capable* when its group carries a policy whose cap is not
/// zero (again inside the bounds when bounded). Unbounded algorithms instead
/// grow their box over every proxy's position and are resized when it
/// changed. Positions outside a bounded domain are silently skipped, never
/// an error.
pub struct Space {
    name: String,
    algorithm: Box<dyn SpaceAlgorithm>,
    proxies: Vec<SpaceProxy>,
    visible: Vec<ObjectId>,
    capable: Vec<ObjectId>,
}

impl Space {
    /// Create a space around an algorithm.
    pub fn new(name: &str, algorithm: impl SpaceAlgorithm + 'static) -> Self {
        Self {
            name: name.to_owned(),
            algorithm: Box::new(algorithm),
            proxies: Vec::new(),
            visible: Vec::new(),
            capable: Vec::new(),
        }
    }

    /// Space name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Space dimension (the algorithm's).
    pub fn dim(&self) -> usize {
        self.algorithm.bounds().dim()
    }

    /// Minimum corner of the algorithm's domain.
    pub fn min(&self) -> &DVector<f64> {
        self.algorithm.bounds().min()
    }

    /// Maximum corner of the algorithm's domain.
    pub fn max(&self) -> &DVector<f64> {
        self.algorithm.bounds().max()
    }

    /// The indexing algorithm.
    pub fn algorithm(&self) -> &dyn SpaceAlgorithm {
        self.algorithm.as_ref()
    }

    /// Downcast the algorithm to its concrete type.
    pub fn algorithm_as<A: 'static>(&self) -> Option<&A> {
        self.algorithm.as_any().downcast_ref::<A>()
    }

    /// Mutable downcast of the algorithm to its concrete type.
    pub fn algorithm_as_mut<A: 'static>(&mut self) -> Option<&mut A> {
        self.algorithm.as_any_mut().downcast_mut::<A>()
    }

    /// The proxies this space owns.
    pub fn proxies(&self) -> &[SpaceProxy] {
        &self.proxies
    }

    /// Number of contained objects.
    pub fn object_count(&self) -> usize {
        self.proxies.len()
    }

    /// True when the object has a proxy here.
    pub fn contains(&self, object: ObjectId) -> bool {
        self.proxies.iter().any(|p| p.object == object)
    }

    /// Objects classified visible in the most recent tick.
    pub fn visible_objects(&self) -> &[ObjectId] {
        &self.visible
    }

    /// Objects classified neighbor-capable in the most recent tick.
    pub fn neighbor_objects(&self) -> &[ObjectId] {
        &self.capable
    }

    /// Add an object to the space, creating its neighbor group.
    ///
    /// `policy` of `None` makes the object a pure candidate: it can appear in
    /// other objects' neighbor lists but never receives one itself.
    pub fn add_object(
        &mut self,
        store: &mut ObjectStore,
        object: ObjectId,
        visible: bool,
        policy: Option<AdmissionPolicy>,
    ) -> Result<(), SpaceError> {
        let dim = self.dim();
        let obj = store.object(object)?;
        if obj.dim() != dim {
            return Err(SpaceError::DimensionMismatch {
                expected: dim,
                found: obj.dim(),
            });
        }
        if self.contains(object) || obj.in_space(&self.name) {
            return Err(SpaceError::DuplicateObject {
                space: self.name.clone(),
            });
        }
        store
            .object_mut(object)?
            .attach_group(NeighborGroup::new(&self.name, visible, policy));
        self.proxies.push(SpaceProxy {
            object,
            class: ProxyClass::empty(),
        });
        Ok(())
    }

    /// Reconfigure a stored object's visibility and policy.
    pub fn set_object(
        &mut self,
        store: &mut ObjectStore,
        object: ObjectId,
        visible: bool,
        policy: Option<AdmissionPolicy>,
    ) -> Result<(), SpaceError> {
        if !self.contains(object) {
            return Err(SpaceError::ObjectNotInSpace {
                space: self.name.clone(),
            });
        }
        let group = store.object_mut(object)?.neighbor_group_mut(&self.name)?;
        group.set_visible(visible);
        group.set_policy(policy);
        Ok(())
    }

    /// Remove an object, destroying its neighbor group for this space.
    pub fn remove_object(
        &mut self,
        store: &mut ObjectStore,
        object: ObjectId,
    ) -> Result<(), SpaceError> {
        let at = self
            .proxies
            .iter()
            .position(|p| p.object == object)
            .ok_or_else(|| SpaceError::ObjectNotInSpace {
                space: self.name.clone(),
            })?;
        self.proxies.remove(at);
        if let Some(obj) = store.get_mut(object) {
            obj.detach_group(&self.name);
        }
        Ok(())
    }

    /// Remove every object from the space.
    pub fn remove_objects(&mut self, store: &mut ObjectStore) -> Result<(), SpaceError> {
        self.visible.clear();
        self.capable.clear();
        while let Some(proxy) = self.proxies.last().copied() {
            self.remove_object(store, proxy.object)?;
        }
        Ok(())
    }

    /// Run one tick: classification, structure phase, neighbor phase.
    ///
    /// Failures are annotated with the space name and the failing phase; the
    /// original cause stays attached.
    pub fn update(&mut self, store: &mut ObjectStore) -> Result<(), SpaceError> {
        self.classify(store)
            .map_err(|e| e.in_phase(&self.name, "classify objects"))?;
        debug!(
            space = %self.name,
            total = self.proxies.len(),
            visible = self.visible.len(),
            capable = self.capable.len(),
            "space update"
        );
        self.algorithm
            .update_structure(store, &self.name, &self.visible)
            .map_err(|e| e.in_phase(&self.name, "update structure"))?;
        self.algorithm
            .update_neighbors(store, &self.name, &self.capable)
            .map_err(|e| e.in_phase(&self.name, "update neighbors"))?;
        Ok(())
    }

    /// Rebuild the visible and neighbor-capable sets.
    ///
    /// The capability rule is deliberately uniform across the bounded and
    /// unbounded branches: capable ⇔ a policy is present and its cap is not
    /// zero. An unlimited cap (`-1`) therefore qualifies in both.
    fn classify(&mut self, store: &mut ObjectStore) -> Result<(), SpaceError> {
        self.visible.clear();
        self.capable.clear();

        let bounds = self.algorithm.bounds();
        let dim = bounds.dim();

        if bounds.is_fixed() {
            let (min, max) = (bounds.min().clone_owned(), bounds.max().clone_owned());
            for proxy in &mut self.proxies {
                let object = store.object(proxy.object)?;
                let group = object.neighbor_group(&self.name)?;
                let position = object.position();
                let within =
                    (0..dim).all(|d| position[d] >= min[d] && position[d] <= max[d]);

                proxy.class = ProxyClass::empty();
                if within && group.visible() {
                    proxy.class |= ProxyClass::VISIBLE;
                    self.visible.push(proxy.object);
                }
                if within && group.can_have_neighbors() {
                    proxy.class |= ProxyClass::NEIGHBOR_CAPABLE;
                    self.capable.push(proxy.object);
                }
            }
        } else {
            let mut min = self.algorithm.bounds().min().clone_owned();
            let mut max = self.algorithm.bounds().max().clone_owned();
            for proxy in &mut self.proxies {
                let object = store.object(proxy.object)?;
                let group = object.neighbor_group(&self.name)?;
                let position = object.position();
                for d in 0..dim {
                    if position[d] < min[d] {
                        min[d] = position[d];
                    }
                    if position[d] > max[d] {
                        max[d] = position[d];
                    }
                }

                proxy.class = ProxyClass::empty();
                if group.visible() {
                    proxy.class |= ProxyClass::VISIBLE;
                    self.visible.push(proxy.object);
                }
                if group.can_have_neighbors() {
                    proxy.class |= ProxyClass::NEIGHBOR_CAPABLE;
                    self.capable.push(proxy.object);
                }
            }
            if &min != self.algorithm.bounds().min() || &max != self.algorithm.bounds().max() {
                self.algorithm.resize(min, max)?;
            }
        }
        Ok(())
    }
}

impl core::fmt::Debug for Space {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Space")
            .field("name", &self.name)
            .field("algorithm", &self.algorithm.label())
            .field("objects", &self.proxies.len())
            .field("visible", &self.visible.len())
            .field("capable", &self.capable.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::kdtree::KdTreeAlgorithm;
    use crate::algorithms::ntree::NTreeAlgorithm;
    use crate::algorithms::permanent::PermanentNeighborsAlgorithm;
    use crate::object::SpaceObject;

    fn point(store: &mut ObjectStore, coords: &[f64]) -> ObjectId {
        store.insert(SpaceObject::at(DVector::from_row_slice(coords)))
    }

    #[test]
    fn add_object_checks_dimension_and_duplicates() {
        let mut store = ObjectStore::new();
        let mut space = Space::new("flock", PermanentNeighborsAlgorithm::new(3));
        let a = point(&mut store, &[0.0, 0.0, 0.0]);
        let flat = point(&mut store, &[0.0, 0.0]);

        space.add_object(&mut store, a, true, None).unwrap();
        assert!(matches!(
            space.add_object(&mut store, a, true, None),
            Err(SpaceError::DuplicateObject { .. })
        ));
        assert!(matches!(
            space.add_object(&mut store, flat, true, None),
            Err(SpaceError::DimensionMismatch {
                expected: 3,
                found: 2
            })
        ));
    }

    #[test]
    fn remove_object_detaches_the_group() {
        let mut store = ObjectStore::new();
        let mut space = Space::new("flock", PermanentNeighborsAlgorithm::new(2));
        let a = point(&mut store, &[0.0, 0.0]);
        space.add_object(&mut store, a, true, None).unwrap();
        assert!(store.object(a).unwrap().in_space("flock"));

        space.remove_object(&mut store, a).unwrap();
        assert!(!space.contains(a));
        assert!(!store.object(a).unwrap().in_space("flock"));
        assert!(matches!(
            space.remove_object(&mut store, a),
            Err(SpaceError::ObjectNotInSpace { .. })
        ));
        // Having left all spaces the object can be destroyed.
        store.remove(a).unwrap();
    }

    #[test]
    fn bounded_classification_clips_and_keeps_unlimited_caps() {
        let mut store = ObjectStore::new();
        let algorithm = NTreeAlgorithm::new(
            DVector::from_vec(vec![0.0, 0.0]),
            DVector::from_vec(vec![1.0, 1.0]),
        )
        .unwrap();
        let mut space = Space::new("clip", algorithm);

        let inside = point(&mut store, &[0.5, 0.5]);
        let outside = point(&mut store, &[1.5, 0.5]);
        let unlimited = point(&mut store, &[0.2, 0.2]);
        let capped_off = point(&mut store, &[0.8, 0.8]);
        let invisible = point(&mut store, &[0.4, 0.6]);

        let policy = AdmissionPolicy::default();
        space.add_object(&mut store, inside, true, Some(policy)).unwrap();
        space.add_object(&mut store, outside, true, Some(policy)).unwrap();
        space
            .add_object(
                &mut store,
                unlimited,
                true,
                Some(AdmissionPolicy {
                    cap: -1,
                    ..policy
                }),
            )
            .unwrap();
        space
            .add_object(
                &mut store,
                capped_off,
                true,
                Some(AdmissionPolicy { cap: 0, ..policy }),
            )
            .unwrap();
        space.add_object(&mut store, invisible, false, Some(policy)).unwrap();

        space.update(&mut store).unwrap();

        let visible = space.visible_objects();
        let capable = space.neighbor_objects();
        assert!(visible.contains(&inside) && visible.contains(&unlimited));
        assert!(!visible.contains(&outside), "out of bounds is skipped");
        assert!(!visible.contains(&invisible));
        assert!(capable.contains(&inside));
        assert!(capable.contains(&unlimited), "cap -1 is neighbor-capable");
        assert!(!capable.contains(&capped_off), "cap 0 never is");
        assert!(capable.contains(&invisible), "capability ignores visibility");
        assert!(!capable.contains(&outside));
    }

    #[test]
    fn unbounded_classification_expands_bounds() {
        let mut store = ObjectStore::new();
        let mut space = Space::new("open", KdTreeAlgorithm::new(2));
        let a = point(&mut store, &[-3.0, 2.0]);
        let b = point(&mut store, &[5.0, -1.0]);
        space
            .add_object(&mut store, a, true, Some(AdmissionPolicy::default()))
            .unwrap();
        space
            .add_object(&mut store, b, true, Some(AdmissionPolicy::default()))
            .unwrap();

        space.update(&mut store).unwrap();
        assert_eq!(space.min().as_slice(), &[-3.0, -1.0]);
        assert_eq!(space.max().as_slice(), &[5.0, 2.0]);
    }

    #[test]
    fn out_of_bounds_proxy_contributes_nothing() {
        // Scenario: a 2-D bounded tree over the unit square with one proxy
        // inside and one outside; the outsider neither appears in a set nor
        // receives neighbors, and the insider's list stays empty.
        let mut store = ObjectStore::new();
        let algorithm = NTreeAlgorithm::new(
            DVector::from_vec(vec![0.0, 0.0]),
            DVector::from_vec(vec![1.0, 1.0]),
        )
        .unwrap();
        let mut space = Space::new("clip", algorithm);
        let policy = AdmissionPolicy {
            radius: 10.0,
            cap: 10,
            replace_farther: false,
        };
        let inside = point(&mut store, &[0.5, 0.5]);
        let outside = point(&mut store, &[1.5, 0.5]);
        space.add_object(&mut store, inside, true, Some(policy)).unwrap();
        space.add_object(&mut store, outside, true, Some(policy)).unwrap();

        space.update(&mut store).unwrap();

        assert!(store.object(inside).unwrap().neighbors("clip").unwrap().is_empty());
        assert!(store.object(outside).unwrap().neighbors("clip").unwrap().is_empty());
    }

    #[test]
    fn update_errors_carry_space_and_phase() {
        let mut store = ObjectStore::new();
        let mut space = Space::new("broken", PermanentNeighborsAlgorithm::new(2));
        let a = point(&mut store, &[0.0, 0.0]);
        let b = point(&mut store, &[1.0, 0.0]);
        space
            .add_object(&mut store, a, true, Some(AdmissionPolicy::unbounded()))
            .unwrap();
        space
            .add_object(&mut store, b, true, Some(AdmissionPolicy::unbounded()))
            .unwrap();
        store.add_neighbor(a, "broken", b).unwrap();

        // Drop the target behind the relation's back: the next tick must
        // surface a wrapped lookup failure, not skip it.
        space.remove_object(&mut store, b).unwrap();
        store.remove(b).unwrap();

        let err = space.update(&mut store).unwrap_err();
        match err {
            SpaceError::UpdatePhase { space, phase, .. } => {
                assert_eq!(space, "broken");
                assert_eq!(phase, "update neighbors");
            }
            other => panic!("expected phase wrapping, got {other:?}"),
        }
    }
}
