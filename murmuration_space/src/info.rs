// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Textual inspection with bounded propagation through composites.

use core::fmt::Write as _;

use crate::group::NeighborGroup;
use crate::manager::SpaceManager;
use crate::object::SpaceObject;
use crate::relation::NeighborRelation;
use crate::space::Space;

/// Textual description with a propagation depth: `-1` descends without
/// limit, `0` describes the receiver only, `n > 0` descends `n` levels.
///
/// The format is informational and not a stable interface.
pub trait Info {
    /// Render the receiver, descending `depth` levels into components.
    fn info(&self, depth: i32) -> String;
}

fn descend(depth: i32) -> i32 {
    if depth < 0 { depth } else { depth - 1 }
}

impl Info for NeighborRelation {
    fn info(&self, _depth: i32) -> String {
        format!(
            "relation distance {} direction {:?} value {:?}",
            self.distance(),
            self.direction().as_slice(),
            self.value().as_slice()
        )
    }
}

impl Info for NeighborGroup {
    fn info(&self, depth: i32) -> String {
        let mut out = String::new();
        match self.policy() {
            Some(p) => {
                let _ = writeln!(
                    out,
                    "group space `{}` visible {} radius {} cap {} replace {} neighbors {}",
                    self.space(),
                    self.visible(),
                    p.radius,
                    p.cap,
                    p.replace_farther,
                    self.len()
                );
            }
            None => {
                let _ = writeln!(
                    out,
                    "group space `{}` visible {} (no neighbor policy)",
                    self.space(),
                    self.visible()
                );
            }
        }
        if depth != 0 {
            for relation in self.relations() {
                let _ = writeln!(out, "  {}", relation.info(descend(depth)));
            }
        }
        out
    }
}

impl Info for SpaceObject {
    fn info(&self, depth: i32) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "object serial {} dim {} position {:?}{}",
            self.serial(),
            self.dim(),
            self.position().as_slice(),
            if self.is_shape() { " (shape)" } else { "" }
        );
        if depth != 0 {
            for name in self.space_names() {
                if let Ok(group) = self.neighbor_group(name) {
                    let _ = write!(out, "{}", group.info(descend(depth)));
                }
            }
        }
        out
    }
}

impl Info for Space {
    fn info(&self, depth: i32) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "space `{}` algorithm {} dim {} objects {} min {:?} max {:?}",
            self.name(),
            self.algorithm().label(),
            self.dim(),
            self.object_count(),
            self.min().as_slice(),
            self.max().as_slice()
        );
        if depth != 0 {
            for proxy in self.proxies() {
                let _ = writeln!(out, "  proxy {:?} class {:?}", proxy.object(), proxy.class());
            }
        }
        out
    }
}

impl Info for SpaceManager {
    fn info(&self, depth: i32) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "manager spaces {}", self.len());
        if depth != 0 {
            for name in self.space_names() {
                if let Ok(space) = self.get(name) {
                    let _ = write!(out, "{}", space.info(descend(depth)));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::kdtree::KdTreeAlgorithm;
    use crate::group::AdmissionPolicy;
    use crate::object::{ObjectStore, SpaceObject};
    use nalgebra::DVector;

    #[test]
    fn depth_bounds_propagation() {
        let mut store = ObjectStore::new();
        let mut manager = SpaceManager::new();
        manager
            .add_space(Space::new("flock", KdTreeAlgorithm::new(2)))
            .unwrap();
        let a = store.insert(SpaceObject::at(DVector::from_vec(vec![0.0, 0.0])));
        let b = store.insert(SpaceObject::at(DVector::from_vec(vec![1.0, 0.0])));
        for id in [a, b] {
            manager
                .add_object("flock", &mut store, id, true, Some(AdmissionPolicy::default()))
                .unwrap();
        }
        manager.update_all(&mut store).unwrap();

        let shallow = manager.info(0);
        assert!(shallow.contains("manager spaces 1"));
        assert!(!shallow.contains("space `flock`"));

        let one = manager.info(1);
        assert!(one.contains("space `flock`"));
        assert!(!one.contains("proxy"));

        let object_info = store.object(a).unwrap().info(-1);
        assert!(object_info.contains("group space `flock`"));
        assert!(object_info.contains("relation distance 1"));
    }
}
