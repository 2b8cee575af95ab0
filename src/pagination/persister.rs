//! Batch persistence
//!
//! A flush writes the buffered records as one ndjson file named after its
//! cursor range, then moves the checkpoint to the range's end. The order is
//! fixed: the checkpoint never points past records that are not on disk.
//!
//! A batch that ends on a terminal page (no next cursor) ends at the cursor
//! that page was requested from, so a run that finishes inside its first
//! flush interval still leaves a checkpoint.

use super::checkpoint::CheckpointStore;
use super::types::{Checkpoint, FlushBatch};
use crate::storage::{artifact_file_name, write_atomic, StorageResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Durable sink for flushed batches
#[async_trait]
pub trait BatchPersister: Send + Sync {
    /// Persist `batch` and then its checkpoint.
    ///
    /// Returns the batch file written, or `None` when the batch carried no
    /// records and only the checkpoint moved.
    async fn persist(&self, batch: &FlushBatch) -> StorageResult<Option<PathBuf>>;

    /// Checkpoint to resume from, if a previous run left one
    async fn resume_point(&self) -> StorageResult<Option<Checkpoint>>;
}

/// Writes `start_<start>__end_<end>.ndjson` files into a directory
pub struct NdjsonPersister<C: CheckpointStore> {
    dir: PathBuf,
    checkpoints: C,
}

impl<C: CheckpointStore> NdjsonPersister<C> {
    pub fn new(dir: impl Into<PathBuf>, checkpoints: C) -> Self {
        Self {
            dir: dir.into(),
            checkpoints,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn checkpoints(&self) -> &C {
        &self.checkpoints
    }

    fn encode(batch: &FlushBatch) -> StorageResult<Vec<u8>> {
        let mut out = Vec::new();
        for record in &batch.records {
            serde_json::to_writer(&mut out, record)?;
            out.push(b'\n');
        }
        Ok(out)
    }
}

#[async_trait]
impl<C: CheckpointStore> BatchPersister for NdjsonPersister<C> {
    async fn persist(&self, batch: &FlushBatch) -> StorageResult<Option<PathBuf>> {
        let artifact = if batch.records.is_empty() {
            debug!(end = ?batch.end_cursor, "Empty batch, no file written");
            None
        } else {
            let path = self
                .dir
                .join(artifact_file_name(&batch.start_cursor, &batch.end_cursor));
            let data = Self::encode(batch)?;
            write_atomic(&path, &data).await?;
            info!(
                records = batch.records.len(),
                path = %path.display(),
                "Persisted batch"
            );
            Some(path)
        };

        self.checkpoints
            .save(&Checkpoint::new(batch.end_cursor.clone()))
            .await?;

        Ok(artifact)
    }

    async fn resume_point(&self) -> StorageResult<Option<Checkpoint>> {
        self.checkpoints.load().await
    }
}
