use crate::pagination::{FetchError, PaginationError};
use crate::storage::StorageError;
use thiserror::Error;

/// Process exit codes
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const OTHER: i32 = 1;
    pub const CONFIG: i32 = 2;
    pub const CHECKPOINT: i32 = 3;
    pub const FATAL_FETCH: i32 = 4;
    pub const RETRIES_EXHAUSTED: i32 = 5;
    pub const STORAGE: i32 = 6;
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Pagination error: {0}")]
    Pagination(#[from] PaginationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Request error: {0}")]
    Fetch(#[from] FetchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Interrupted: {0}")]
    Interrupted(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Exit code the process should report for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) | Error::Toml(_) => exit_code::CONFIG,
            Error::Pagination(err) => match err {
                PaginationError::NoCheckpoint { .. } | PaginationError::Checkpoint(_) => {
                    exit_code::CHECKPOINT
                }
                PaginationError::Fatal { .. } => exit_code::FATAL_FETCH,
                PaginationError::RetriesExhausted { .. } => exit_code::RETRIES_EXHAUSTED,
                PaginationError::Persist { .. } => exit_code::STORAGE,
            },
            Error::Fetch(FetchError::Fatal(_)) => exit_code::FATAL_FETCH,
            Error::Fetch(_) => exit_code::RETRIES_EXHAUSTED,
            Error::Storage(_) | Error::Io(_) | Error::Serialization(_) => exit_code::STORAGE,
            Error::Interrupted(_) => exit_code::INTERRUPTED,
            Error::Other(_) => exit_code::OTHER,
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
