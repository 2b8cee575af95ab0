//! Errors ending a pagination run

use super::fetcher::FetchError;
use crate::storage::StorageError;
use thiserror::Error;

/// Why a pagination run stopped without finishing.
///
/// Every variant carries the number of requests that completed before the
/// failure; the checkpoint on disk still reflects the last successful flush.
#[derive(Error, Debug)]
pub enum PaginationError {
    /// The server rejected a request in a way retrying will not fix
    #[error("request from {cursor:?} failed after {requests} successful requests: {source}")]
    Fatal {
        requests: u64,
        cursor: Option<String>,
        #[source]
        source: FetchError,
    },

    /// Transient failures went past the retry ceiling
    #[error(
        "gave up on cursor {cursor:?} after {attempts} consecutive failures \
         ({requests} successful requests): {source}"
    )]
    RetriesExhausted {
        requests: u64,
        attempts: u32,
        cursor: Option<String>,
        #[source]
        source: FetchError,
    },

    /// Writing a batch or its checkpoint failed
    #[error("failed to persist batch after {requests} successful requests: {source}")]
    Persist {
        requests: u64,
        #[source]
        source: StorageError,
    },

    /// Resume requested but no checkpoint exists yet
    #[error("no resume checkpoint for room {room_id}")]
    NoCheckpoint { room_id: String },

    /// The checkpoint exists but cannot be read
    #[error("cannot read resume checkpoint: {0}")]
    Checkpoint(#[source] StorageError),
}

impl PaginationError {
    /// Requests completed before the run failed
    pub fn completed_requests(&self) -> u64 {
        match self {
            Self::Fatal { requests, .. }
            | Self::RetriesExhausted { requests, .. }
            | Self::Persist { requests, .. } => *requests,
            Self::NoCheckpoint { .. } | Self::Checkpoint(_) => 0,
        }
    }
}
