//! Per-channel build registry.
//!
//! Holds a channel's named builds and the `current_build` alias that status
//! commands default to. The alias is stored as a build name, so it always
//! refers to the registered build itself and can never drift from it.
//!
//! On disk a registry is a single JSON object of name → build, with the
//! reserved key [`CURRENT_BUILD`] holding a copy of the current build. The
//! copy is resolved back to the named entry when loading.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::build::Build;

/// Reserved key for the current-build alias.
pub const CURRENT_BUILD: &str = "current_build";

/// Registry invariant violations. The messages are shown to chat as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("A build with this name already exists!")]
    Duplicate(String),

    #[error("A build with this name is not found!")]
    NotFound(String),
}

/// One channel's builds plus the current-build alias.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    builds: BTreeMap<String, Build>,
    current: Option<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new build. Fails if the name is taken or reserved.
    pub fn add(&mut self, build: Build) -> Result<(), RegistryError> {
        let name = build.name();
        if name == CURRENT_BUILD || self.builds.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        self.builds.insert(name.to_string(), build);
        Ok(())
    }

    /// Remove a build, clearing the alias if it pointed at it.
    pub fn remove(&mut self, name: &str) -> Result<Build, RegistryError> {
        let build = self
            .builds
            .remove(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        if self.current.as_deref() == Some(name) {
            self.current = None;
        }
        Ok(build)
    }

    /// Point the alias at an existing build.
    pub fn set_current(&mut self, name: &str) -> Result<&Build, RegistryError> {
        let (key, build) = self
            .builds
            .get_key_value(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        self.current = Some(key.clone());
        Ok(build)
    }

    pub fn current(&self) -> Option<&Build> {
        self.current.as_deref().and_then(|name| self.builds.get(name))
    }

    pub fn get(&self, name: &str) -> Option<&Build> {
        self.builds.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builds.contains_key(name)
    }

    /// Build names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.builds.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Build> {
        self.builds.values()
    }

    pub fn len(&self) -> usize {
        self.builds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builds.is_empty()
    }

    /// Rebuild from a stored document, resolving the alias copy by name.
    fn from_entries(mut entries: BTreeMap<String, Build>) -> Self {
        let alias = entries.remove(CURRENT_BUILD);
        entries.retain(|key, build| {
            let named = !build.name().trim().is_empty();
            if !named {
                warn!(key = %key, "Stored build has no name, dropping it");
            }
            named
        });
        let current = alias.and_then(|alias| {
            if entries.contains_key(alias.name()) {
                Some(alias.name().to_string())
            } else {
                warn!(build = %alias.name(), "Current build is not registered, dropping alias");
                None
            }
        });
        Self {
            builds: entries,
            current,
        }
    }
}

impl Serialize for Registry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let current = self.current();
        let len = self.builds.len() + usize::from(current.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        for (name, build) in &self.builds {
            map.serialize_entry(name, build)?;
        }
        if let Some(build) = current {
            map.serialize_entry(CURRENT_BUILD, build)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Registry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        BTreeMap::<String, Build>::deserialize(deserializer).map(Self::from_entries)
    }
}

impl fmt::Display for Registry {
    /// Comma-separated names, the current one marked with `*`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, name) in self.names().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(name)?;
            if self.current.as_deref() == Some(name) {
                f.write_str("*")?;
            }
        }
        Ok(())
    }
}
