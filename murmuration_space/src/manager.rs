// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Named registry of spaces with batched update.

use indexmap::IndexMap;
use tracing::debug;

use crate::error::SpaceError;
use crate::group::AdmissionPolicy;
use crate::object::{ObjectId, ObjectStore};
use crate::space::Space;

/// Registry of spaces keyed by name, updated in registration order.
#[derive(Default)]
pub struct SpaceManager {
    spaces: IndexMap<String, Space>,
}

impl SpaceManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered space names, in registration order.
    pub fn space_names(&self) -> impl Iterator<Item = &str> {
        self.spaces.keys().map(String::as_str)
    }

    /// Number of registered spaces.
    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    /// True when no space is registered.
    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }

    /// True when a space of this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.spaces.contains_key(name)
    }

    /// Register a space under its own name.
    pub fn add_space(&mut self, space: Space) -> Result<(), SpaceError> {
        if self.contains(space.name()) {
            return Err(SpaceError::DuplicateSpace(space.name().to_owned()));
        }
        self.spaces.insert(space.name().to_owned(), space);
        Ok(())
    }

    /// Unregister and return a space.
    ///
    /// The space keeps its proxies; drain it with
    /// [`Space::remove_objects`] first if its objects should be released.
    pub fn remove_space(&mut self, name: &str) -> Result<Space, SpaceError> {
        self.spaces
            .shift_remove(name)
            .ok_or_else(|| SpaceError::SpaceNotFound(name.to_owned()))
    }

    /// The named space.
    pub fn get(&self, name: &str) -> Result<&Space, SpaceError> {
        self.spaces
            .get(name)
            .ok_or_else(|| SpaceError::SpaceNotFound(name.to_owned()))
    }

    /// The named space, mutably.
    pub fn get_mut(&mut self, name: &str) -> Result<&mut Space, SpaceError> {
        self.spaces
            .get_mut(name)
            .ok_or_else(|| SpaceError::SpaceNotFound(name.to_owned()))
    }

    /// Add an object to the named space.
    pub fn add_object(
        &mut self,
        name: &str,
        store: &mut ObjectStore,
        object: ObjectId,
        visible: bool,
        policy: Option<AdmissionPolicy>,
    ) -> Result<(), SpaceError> {
        self.get_mut(name)?.add_object(store, object, visible, policy)
    }

    /// Remove an object from the named space.
    pub fn remove_object(
        &mut self,
        name: &str,
        store: &mut ObjectStore,
        object: ObjectId,
    ) -> Result<(), SpaceError> {
        self.get_mut(name)?.remove_object(store, object)
    }

    /// Remove an object from every space that holds it.
    pub fn remove_object_everywhere(
        &mut self,
        store: &mut ObjectStore,
        object: ObjectId,
    ) -> Result<(), SpaceError> {
        let names: Vec<String> = store
            .object(object)?
            .space_names()
            .map(str::to_owned)
            .collect();
        for name in names {
            self.get_mut(&name)?.remove_object(store, object)?;
        }
        Ok(())
    }

    /// Update every registered space, in registration order.
    ///
    /// Errors already carry the failing space's name and phase; the first
    /// failure aborts the batch.
    pub fn update_all(&mut self, store: &mut ObjectStore) -> Result<(), SpaceError> {
        debug!(spaces = self.spaces.len(), "manager update");
        for space in self.spaces.values_mut() {
            space.update(store)?;
        }
        Ok(())
    }
}

impl core::fmt::Debug for SpaceManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SpaceManager")
            .field("spaces", &self.spaces.len())
            .finish_non_exhaustive()
    }
}
