//! Per-channel disconnect counters.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::persist::{StorageError, read_json_or_default, write_json_atomic};
use crate::store::channel_key;

/// Channel → disconnect count, optionally persisted as a JSON object.
#[derive(Debug, Default)]
pub struct CounterStore {
    path: Option<PathBuf>,
    counts: BTreeMap<String, u64>,
}

impl CounterStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let stored: BTreeMap<String, u64> = read_json_or_default(&path).await?;
        let counts = stored
            .into_iter()
            .map(|(channel, count)| (channel_key(&channel), count))
            .collect();
        info!(path = %path.display(), "Counter store opened");
        Ok(Self {
            path: Some(path),
            counts,
        })
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn get(&self, channel: &str) -> u64 {
        self.counts.get(&channel_key(channel)).copied().unwrap_or(0)
    }

    /// Add one to the channel's counter and return the new value.
    pub async fn increment(&mut self, channel: &str) -> Result<u64, StorageError> {
        let next = self.get(channel).saturating_add(1);
        self.set(channel, next).await
    }

    pub async fn set(&mut self, channel: &str, value: u64) -> Result<u64, StorageError> {
        let key = channel_key(channel);
        let previous = self.counts.insert(key.clone(), value);
        if let Err(error) = self.persist().await {
            warn!(channel = %key, error = %error, "Counter write failed, rolling back");
            match previous {
                Some(count) => self.counts.insert(key, count),
                None => self.counts.remove(&key),
            };
            return Err(error);
        }
        Ok(value)
    }

    async fn persist(&self) -> Result<(), StorageError> {
        match &self.path {
            Some(path) => write_json_atomic(path, &self.counts).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_increment_and_set() {
        let mut counters = CounterStore::in_memory();
        assert_eq!(counters.get("chan"), 0);
        assert_eq!(counters.increment("#Chan").await.unwrap(), 1);
        assert_eq!(counters.increment("chan").await.unwrap(), 2);
        assert_eq!(counters.set("chan", 40).await.unwrap(), 40);
        assert_eq!(counters.get("other"), 0);
    }

    #[tokio::test]
    async fn test_increment_saturates() {
        let mut counters = CounterStore::in_memory();
        counters.set("chan", u64::MAX).await.unwrap();
        assert_eq!(counters.increment("chan").await.unwrap(), u64::MAX);
    }

    #[tokio::test]
    async fn test_persisted_counts_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("counters.json");

        let mut counters = CounterStore::open(&path).await.unwrap();
        counters.increment("chan").await.unwrap();
        counters.increment("chan").await.unwrap();
        drop(counters);

        let reopened = CounterStore::open(&path).await.unwrap();
        assert_eq!(reopened.get("chan"), 2);
    }

    #[tokio::test]
    async fn test_failed_write_keeps_old_value() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("counters.json");
        let mut counters = CounterStore::open(&path).await.unwrap();
        counters.set("chan", 3).await.unwrap();

        tokio::fs::remove_file(&path).await.unwrap();
        tokio::fs::create_dir(&path).await.unwrap();

        assert!(counters.increment("chan").await.is_err());
        assert!(counters.set("other", 9).await.is_err());
        assert_eq!(counters.get("chan"), 3);
        assert_eq!(counters.get("other"), 0);
    }
}
