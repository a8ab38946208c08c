// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;

use crate::{Error, ErrorKind, Group};

static GLOBAL: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Maps group names to groups.
///
/// Groups are added once and live as long as the registry. Most processes use the
/// [`global`](Self::global) registry; tests and embedders can create their own.
#[derive(Debug, Default)]
pub struct Registry {
    groups: RwLock<HashMap<String, Arc<Group>>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide registry.
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Adds `group` under its name.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::DuplicateGroup`] if a group with the same name exists; the existing
    /// group is left in place.
    pub fn register(&self, group: Group) -> Result<Arc<Group>, Error> {
        let mut groups = self.groups.write();
        if groups.contains_key(group.name()) {
            return Err(ErrorKind::DuplicateGroup(group.name().to_owned()).into());
        }

        let group = Arc::new(group);
        groups.insert(group.name().to_owned(), Arc::clone(&group));
        drop(groups);

        tracing::info!(group.name = group.name(), "group registered");
        Ok(group)
    }

    /// Returns the group named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.read().get(name).cloned()
    }

    /// Returns the names of all registered groups, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }
}
