//! Whole-document JSON persistence.
//!
//! Stores rewrite their entire document on every change. The document is
//! written to a sibling `*.tmp` file, synced, and renamed over the target,
//! so readers only ever see the old or the new version.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Errors from reading or writing a persisted document.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    fn io<'a>(action: &'static str, path: &'a Path) -> impl FnOnce(std::io::Error) -> Self + 'a {
        move |source| Self::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Atomically replace `path` with the JSON encoding of `value`.
pub async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let payload = serde_json::to_vec_pretty(value).map_err(|source| StorageError::Encode {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(StorageError::io("create directory for", path))?;
    }

    let tmp = temp_path(path);
    if let Err(error) = replace_with(&tmp, path, &payload).await {
        // Best effort; the target is untouched either way
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(error);
    }

    debug!(path = %path.display(), bytes = payload.len(), "Document persisted");
    Ok(())
}

async fn replace_with(tmp: &Path, path: &Path, payload: &[u8]) -> Result<(), StorageError> {
    let mut file = tokio::fs::File::create(tmp)
        .await
        .map_err(StorageError::io("create", tmp))?;
    file.write_all(payload)
        .await
        .map_err(StorageError::io("write", tmp))?;
    file.sync_all()
        .await
        .map_err(StorageError::io("sync", tmp))?;
    drop(file);

    tokio::fs::rename(tmp, path)
        .await
        .map_err(StorageError::io("replace", path))
}

/// Read a JSON document, falling back to `T::default()` when the file is
/// missing or does not parse.
pub async fn read_json_or_default<T>(path: &Path) -> Result<T, StorageError>
where
    T: DeserializeOwned + Default,
{
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No document yet, starting empty");
            return Ok(T::default());
        }
        Err(e) => return Err(StorageError::io("read", path)(e)),
    };

    if raw.trim().is_empty() {
        return Ok(T::default());
    }

    match serde_json::from_str(&raw) {
        Ok(value) => Ok(value),
        Err(error) => {
            warn!(
                path = %path.display(),
                error = %error,
                "Failed to parse document; starting empty"
            );
            Ok(T::default())
        }
    }
}
