//! Channel-keyed build store.
//!
//! Owns one [`Registry`] per channel and persists the whole map as a single
//! JSON document. Mutations are applied to a copy, persisted, then committed,
//! so a failed write leaves memory exactly as it was before the command.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::build::Build;
use crate::persist::{StorageError, read_json_or_default, write_json_atomic};
use crate::registry::{Registry, RegistryError};

/// Errors from build store mutations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Normalize a channel name into a store key (no `#`, lowercase).
pub fn channel_key(channel: &str) -> String {
    channel.trim().trim_start_matches('#').to_lowercase()
}

/// Persistent map of channel → build registry.
#[derive(Debug, Default)]
pub struct BuildStore {
    path: Option<PathBuf>,
    channels: BTreeMap<String, Registry>,
}

impl BuildStore {
    /// Open the store backed by `path`. A missing or unreadable document
    /// starts an empty store.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let stored: BTreeMap<String, Registry> = read_json_or_default(&path).await?;

        let mut channels = BTreeMap::new();
        for (channel, registry) in stored {
            if channels.insert(channel_key(&channel), registry).is_some() {
                warn!(channel = %channel, "Duplicate channel entry in build store, keeping last");
            }
        }

        info!(
            path = %path.display(),
            channels = channels.len(),
            "Build store opened"
        );
        Ok(Self {
            path: Some(path),
            channels,
        })
    }

    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn registry(&self, channel: &str) -> Option<&Registry> {
        self.channels.get(&channel_key(channel))
    }

    pub fn current(&self, channel: &str) -> Option<&Build> {
        self.registry(channel).and_then(Registry::current)
    }

    /// Channels with at least one stored registry, in key order.
    pub fn channels(&self) -> impl Iterator<Item = (&str, &Registry)> {
        self.channels.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub async fn add(&mut self, channel: &str, build: Build) -> Result<(), StoreError> {
        self.mutate(channel, |registry| registry.add(build)).await
    }

    pub async fn remove(&mut self, channel: &str, name: &str) -> Result<Build, StoreError> {
        self.mutate(channel, |registry| registry.remove(name)).await
    }

    pub async fn set_current(&mut self, channel: &str, name: &str) -> Result<(), StoreError> {
        self.mutate(channel, |registry| registry.set_current(name).map(|_| ()))
            .await
    }

    async fn mutate<T>(
        &mut self,
        channel: &str,
        op: impl FnOnce(&mut Registry) -> Result<T, RegistryError>,
    ) -> Result<T, StoreError> {
        let key = channel_key(channel);
        let mut next = self.channels.get(&key).cloned().unwrap_or_default();
        let out = op(&mut next)?;

        let previous = self.channels.insert(key.clone(), next);
        if let Err(error) = self.persist().await {
            warn!(channel = %key, error = %error, "Build store write failed, rolling back");
            match previous {
                Some(registry) => self.channels.insert(key, registry),
                None => self.channels.remove(&key),
            };
            return Err(error.into());
        }
        Ok(out)
    }

    async fn persist(&self) -> Result<(), StorageError> {
        match &self.path {
            Some(path) => write_json_atomic(path, &self.channels).await,
            None => Ok(()),
        }
    }
}
