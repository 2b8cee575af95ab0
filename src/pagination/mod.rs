//! Resumable, checkpointed pagination of a room's event history
//!
//! ## Organization
//!
//! - `fetcher.rs` - one bounded request per call, failures classified for retry
//! - `retry.rs` - the retry policy: rate limits waited out, transient failures budgeted
//! - `continuation.rs` - pure predicates for continuing and flushing
//! - `driver.rs` - the state machine tying it together
//! - `persister.rs` - batch files written before the checkpoint moves
//! - `checkpoint.rs` - single-slot resume position
//! - `progress.rs` / `shutdown.rs` - capabilities injected into the driver

pub mod checkpoint;
pub mod continuation;
pub mod driver;
pub mod error;
pub mod fetcher;
pub mod persister;
pub mod progress;
pub mod retry;
pub mod shutdown;
pub mod types;

pub use checkpoint::{CheckpointStore, FileCheckpointStore};
pub use continuation::{flush_due, should_continue};
pub use driver::{
    DriverState, PaginationDriver, PaginationOptions, SessionMeta, DEFAULT_FLUSH_INTERVAL,
    DEFAULT_PAGE_LIMIT,
};
pub use error::PaginationError;
pub use fetcher::{FetchError, PageFetcher};
pub use persister::{BatchPersister, NdjsonPersister};
pub use progress::{ConsoleProgress, NoProgress, ProgressReporter};
pub use retry::{BackoffStrategy, RetryDecision, RetryPolicy, RetryState};
pub use shutdown::{shutdown_signal, ShutdownSignal};
pub use types::{Checkpoint, FlushBatch, Page, PaginationReport, Record};
