// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-space neighbor groups and the admission policy they enforce.

use nalgebra::DVector;

use crate::error::SpaceError;
use crate::object::ObjectId;
use crate::relation::NeighborRelation;

/// Admission configuration for one neighbor group.
///
/// `radius < 0` means unbounded reach. `cap == -1` means an unbounded list,
/// `cap == 0` means the object accepts no neighbors at all. With
/// `replace_farther` set, a full list still admits closer candidates by
/// evicting its farthest entry.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AdmissionPolicy {
    /// Maximum admitted distance; negative disables the bound.
    pub radius: f64,
    /// Maximum list length; `-1` unbounded, `0` rejects everything.
    pub cap: i32,
    /// Evict the farthest entry for closer candidates once full.
    pub replace_farther: bool,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            radius: 5.0,
            cap: 10,
            replace_farther: false,
        }
    }
}

impl AdmissionPolicy {
    /// Policy admitting everything.
    pub fn unbounded() -> Self {
        Self {
            radius: -1.0,
            cap: -1,
            replace_farther: false,
        }
    }
}

/// One object's sorted neighbor list inside one named space.
///
/// The group records the owning space by name only; the name is a lookup key,
/// not an owner. Relations stay sorted by non-decreasing distance, never
/// exceed the policy cap, and never point from the owner to itself.
#[derive(Clone, Debug)]
pub struct NeighborGroup {
    space: String,
    visible: bool,
    policy: Option<AdmissionPolicy>,
    relations: Vec<NeighborRelation>,
}

impl NeighborGroup {
    pub(crate) fn new(space: &str, visible: bool, policy: Option<AdmissionPolicy>) -> Self {
        Self {
            space: space.to_owned(),
            visible,
            policy,
            relations: Vec::new(),
        }
    }

    /// Name of the space this group belongs to.
    pub fn space(&self) -> &str {
        &self.space
    }

    /// Whether the owning object is visible in this space.
    pub fn visible(&self) -> bool {
        self.visible
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// The admission policy, if the object can have neighbors here.
    pub fn policy(&self) -> Option<&AdmissionPolicy> {
        self.policy.as_ref()
    }

    pub(crate) fn set_policy(&mut self, policy: Option<AdmissionPolicy>) {
        self.policy = policy;
    }

    /// True when a policy is present and its cap is not zero.
    pub fn can_have_neighbors(&self) -> bool {
        self.policy.is_some_and(|p| p.cap != 0)
    }

    /// True when no further candidate can improve the list.
    ///
    /// A capped list without replacement is full at `cap` entries. With
    /// replacement a closer candidate can always evict, so the list is never
    /// full.
    pub fn is_full(&self) -> bool {
        match self.policy {
            Some(p) => {
                p.cap >= 0 && !p.replace_farther && self.relations.len() as i64 >= i64::from(p.cap)
            }
            None => true,
        }
    }

    /// Number of stored relations.
    pub fn len(&self) -> usize {
        self.relations.len()
    }

    /// True when no relations are stored.
    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    /// The stored relations, sorted by non-decreasing distance.
    pub fn relations(&self) -> &[NeighborRelation] {
        &self.relations
    }

    pub(crate) fn relations_mut(&mut self) -> &mut [NeighborRelation] {
        &mut self.relations
    }

    /// Relation at `index`.
    pub fn relation(&self, index: usize) -> Result<&NeighborRelation, SpaceError> {
        self.relations.get(index).ok_or(SpaceError::IndexOutOfRange {
            index,
            len: self.relations.len(),
        })
    }

    /// Target object of the relation at `index`.
    pub fn target(&self, index: usize) -> Result<ObjectId, SpaceError> {
        Ok(self.relation(index)?.target())
    }

    /// Distance of the relation at `index`.
    pub fn distance(&self, index: usize) -> Result<f64, SpaceError> {
        Ok(self.relation(index)?.distance())
    }

    /// Direction of the relation at `index`.
    pub fn direction(&self, index: usize) -> Result<&DVector<f64>, SpaceError> {
        Ok(self.relation(index)?.direction())
    }

    /// Value of the relation at `index`.
    pub fn value(&self, index: usize) -> Result<&DVector<f64>, SpaceError> {
        Ok(self.relation(index)?.value())
    }

    /// Offer a relation to the admission policy.
    ///
    /// The admission contract, in order:
    /// 1. no policy or `cap == 0` rejects;
    /// 2. `radius >= 0` and a farther candidate rejects;
    /// 3. a full list without replacement rejects;
    /// 4. a full list with replacement rejects candidates at or beyond the
    ///    current farthest distance;
    /// 5. otherwise the relation is inserted at the position keeping the
    ///    sequence sorted by non-decreasing distance (after equal distances),
    ///    and an overfull list drops its last entry.
    ///
    /// Returns whether the relation was kept.
    pub(crate) fn offer(&mut self, relation: NeighborRelation) -> bool {
        let Some(policy) = self.policy else {
            return false;
        };
        if policy.cap == 0 {
            return false;
        }
        let distance = relation.distance();
        if policy.radius >= 0.0 && distance > policy.radius {
            return false;
        }
        let len = self.relations.len() as i64;
        if policy.cap >= 0 && len >= i64::from(policy.cap) {
            if !policy.replace_farther {
                return false;
            }
            if let Some(last) = self.relations.last()
                && distance >= last.distance()
            {
                return false;
            }
        }

        let at = self
            .relations
            .partition_point(|r| r.distance() <= distance);
        self.relations.insert(at, relation);

        if policy.cap >= 0 && self.relations.len() as i64 > i64::from(policy.cap) {
            // The early full-list checks guarantee the trimmed entry is an
            // old one: a kept candidate always lands before the last slot.
            self.relations.pop();
        }
        true
    }

    /// Restore the distance order after relations were mutated in place.
    pub(crate) fn sort_by_distance(&mut self) {
        self.relations.sort_by(|a, b| {
            a.distance()
                .partial_cmp(&b.distance())
                .unwrap_or(core::cmp::Ordering::Equal)
        });
    }

    /// Remove every relation pointing at `target`.
    pub(crate) fn remove_target(&mut self, target: ObjectId) {
        self.relations.retain(|r| r.target() != target);
    }

    /// Remove the relation at `index`.
    pub(crate) fn remove_at(&mut self, index: usize) -> Result<(), SpaceError> {
        if index >= self.relations.len() {
            return Err(SpaceError::IndexOutOfRange {
                index,
                len: self.relations.len(),
            });
        }
        self.relations.remove(index);
        Ok(())
    }

    /// Drop every stored relation.
    pub fn clear(&mut self) {
        self.relations.clear();
    }
}
