//! Resume checkpoint storage
//!
//! A single-slot store: every save replaces the previous checkpoint, and
//! nothing is ever deleted automatically.

use super::types::Checkpoint;
use crate::storage::{write_atomic, StorageError, StorageResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Trait for checkpoint storage implementations
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// The last saved checkpoint, if any
    async fn load(&self) -> StorageResult<Option<Checkpoint>>;
    /// Replace the stored checkpoint
    async fn save(&self, checkpoint: &Checkpoint) -> StorageResult<()>;
}

/// Checkpoint kept as `resume.json` next to the batch files
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self) -> StorageResult<Option<Checkpoint>> {
        let data = match fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(&self.path, e)),
        };

        let checkpoint: Checkpoint = serde_json::from_slice(&data)
            .map_err(|e| StorageError::corrupted(&self.path, e))?;

        if checkpoint.from.is_empty() {
            return Err(StorageError::corrupted(&self.path, "empty resume cursor"));
        }

        Ok(Some(checkpoint))
    }

    async fn save(&self, checkpoint: &Checkpoint) -> StorageResult<()> {
        let json = serde_json::to_vec(checkpoint)?;
        write_atomic(&self.path, &json).await?;
        debug!(path = %self.path.display(), from = %checkpoint.from, "Saved checkpoint");
        Ok(())
    }
}
