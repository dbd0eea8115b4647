// src/cursor.rs
//! Per-source cursors: the identifier of the newest entry already delivered.
//!
//! Persisted as one JSON object, `{"<source>": <id>, ...}`. A missing file means
//! nothing was ever delivered.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use crate::error::PersistError;

#[cfg(any(test, feature = "testing"))]
pub use crate::testing::MemoryCursorStore;

/// Source name → last delivered identifier (string or number).
pub type CursorMap = BTreeMap<String, Value>;

#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Current cursors; empty when nothing has been stored yet.
    async fn load(&self) -> Result<CursorMap, PersistError>;

    /// Replace the stored cursors with `cursors` as a whole.
    async fn commit(&self, cursors: &CursorMap) -> Result<(), PersistError>;
}

/// JSON file store. Writes go to a sibling temp file which is then renamed over the
/// target, so a failed commit leaves the previous state readable.
#[derive(Debug, Clone)]
pub struct JsonFileCursorStore {
    path: PathBuf,
}

impl JsonFileCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CursorStore for JsonFileCursorStore {
    async fn load(&self) -> Result<CursorMap, PersistError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no cursor file yet, starting fresh");
                return Ok(CursorMap::new());
            }
            Err(e) => return Err(PersistError::io(&self.path, e)),
        };
        serde_json::from_slice(&bytes).map_err(|source| PersistError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    async fn commit(&self, cursors: &CursorMap) -> Result<(), PersistError> {
        let bytes = serde_json::to_vec_pretty(cursors)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PersistError::io(parent, e))?;
        }

        let tmp = self.tmp_path();
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| PersistError::io(&tmp, e))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| PersistError::io(&tmp, e))?;
        file.sync_all().await.map_err(|e| PersistError::io(&tmp, e))?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| PersistError::io(&self.path, e))?;
        tracing::debug!(path = %self.path.display(), sources = cursors.len(), "cursors committed");
        Ok(())
    }
}
