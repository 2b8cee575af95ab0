//! Pagination driver
//!
//! Walks a room's history backwards one page at a time as an explicit state
//! machine:
//!
//! ```text
//! Idle -> Fetching -> Accumulating -> Idle ...
//!            |  ^          |
//!            v  |          v
//!         Retrying      Flushing -> Idle | Stopped
//!            |
//!            v
//!          Failed
//! ```
//!
//! The cursor only advances on a successful fetch. Records are buffered in
//! memory and handed to the [`BatchPersister`] every `flush_interval` pages,
//! when pagination ends, or when the operator interrupts the run.

use super::continuation::{flush_due, should_continue};
use super::error::PaginationError;
use super::fetcher::{FetchError, PageFetcher};
use super::persister::BatchPersister;
use super::progress::{NoProgress, ProgressReporter};
use super::retry::{RetryDecision, RetryPolicy, RetryState};
use super::shutdown::ShutdownSignal;
use super::types::{FlushBatch, Page, PaginationReport, Record};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Default page size requested from the server
pub const DEFAULT_PAGE_LIMIT: usize = 100;

/// Default number of pages buffered between flushes
pub const DEFAULT_FLUSH_INTERVAL: usize = 10;

/// What to paginate and how
#[derive(Debug, Clone)]
pub struct PaginationOptions {
    pub room_id: String,
    /// Records requested per page
    pub limit: usize,
    /// Pages buffered before a flush
    pub flush_interval: usize,
    /// Stop once a page's oldest record is at or before this unix-ms timestamp
    pub stop_boundary: Option<i64>,
}

impl PaginationOptions {
    pub fn new(room_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            limit: DEFAULT_PAGE_LIMIT,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            stop_boundary: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_flush_interval(mut self, flush_interval: usize) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    pub fn with_stop_boundary(mut self, stop_boundary: Option<i64>) -> Self {
        self.stop_boundary = stop_boundary;
        self
    }

    /// Raise a zero `limit` or `flush_interval` to 1.
    ///
    /// A zero limit never matches a full page of records, so a server that
    /// keeps handing out `end` cursors would be paginated forever.
    pub fn normalized(mut self) -> Self {
        if self.limit == 0 {
            warn!("Page limit of 0 raised to 1");
            self.limit = 1;
        }
        if self.flush_interval == 0 {
            warn!("Flush interval of 0 raised to 1");
            self.flush_interval = 1;
        }
        self
    }
}

/// Driver states. Each step of [`PaginationDriver::run`] consumes one state
/// and produces the next.
#[derive(Debug)]
pub enum DriverState {
    /// Between pages
    Idle,
    /// Requesting the page at the current cursor
    Fetching,
    /// Waiting before requesting the same cursor again
    Retrying { wait: Duration },
    /// A page arrived and is being added to the buffer
    Accumulating { page: Page },
    /// Handing the buffer to the persister
    Flushing { resume_after: bool },
    /// Finished normally
    Stopped,
    /// Finished with an error
    Failed(PaginationError),
}

impl DriverState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Retrying { .. } => "retrying",
            Self::Accumulating { .. } => "accumulating",
            Self::Flushing { .. } => "flushing",
            Self::Stopped => "stopped",
            Self::Failed(_) => "failed",
        }
    }
}

/// Buffer and cursor bookkeeping since the last flush
#[derive(Debug, Default)]
pub struct SessionMeta {
    pub first_cursor_since_flush: Option<String>,
    pub last_cursor_seen: Option<String>,
    pub pages_since_flush: usize,
    pub buffer: Vec<Record>,
}

impl SessionMeta {
    /// Add a fetched page to the buffer
    pub fn absorb(&mut self, page: Page) {
        let Page {
            records,
            start,
            end,
        } = page;
        if self.first_cursor_since_flush.is_none() {
            self.first_cursor_since_flush = Some(start.clone());
        }
        // a terminal page has no `end`; nothing lies past the cursor it was requested from
        self.last_cursor_seen = Some(end.unwrap_or(start));
        self.pages_since_flush += 1;
        self.buffer.extend(records);
    }

    /// Nothing fetched since the last flush
    pub fn is_empty(&self) -> bool {
        self.pages_since_flush == 0
    }

    /// Drain the buffer into a batch and reset for the next interval
    pub fn take_batch(&mut self) -> Option<FlushBatch> {
        let meta = std::mem::take(self);
        Some(FlushBatch {
            records: meta.buffer,
            start_cursor: meta.first_cursor_since_flush?,
            end_cursor: meta.last_cursor_seen?,
        })
    }
}

/// Drives one room's pagination from a starting cursor to completion
pub struct PaginationDriver<F, P> {
    fetcher: F,
    persister: P,
    policy: RetryPolicy,
    options: PaginationOptions,
    progress: Arc<dyn ProgressReporter>,
    shutdown: ShutdownSignal,
}

impl<F, P> PaginationDriver<F, P>
where
    F: PageFetcher,
    P: BatchPersister,
{
    pub fn new(fetcher: F, persister: P, policy: RetryPolicy, options: PaginationOptions) -> Self {
        Self {
            fetcher,
            persister,
            policy,
            options: options.normalized(),
            progress: Arc::new(NoProgress),
            shutdown: ShutdownSignal::new(),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn persister(&self) -> &P {
        &self.persister
    }

    /// Continue from the stored checkpoint.
    ///
    /// History before the checkpoint is assumed to be on disk already and is
    /// never requested again.
    pub async fn resume(&self) -> Result<PaginationReport, PaginationError> {
        let checkpoint = self
            .persister
            .resume_point()
            .await
            .map_err(PaginationError::Checkpoint)?
            .ok_or_else(|| PaginationError::NoCheckpoint {
                room_id: self.options.room_id.clone(),
            })?;

        info!(room = %self.options.room_id, from = %checkpoint.from, "Resuming pagination");
        self.run(Some(checkpoint.from)).await
    }

    /// Paginate from `from` (or the live end of the room when `None`)
    pub async fn run(&self, from: Option<String>) -> Result<PaginationReport, PaginationError> {
        let mut cursor = from;
        let mut meta = SessionMeta::default();
        let mut retry = RetryState::default();
        let mut report = PaginationReport::default();
        let mut state = DriverState::Idle;

        info!(
            room = %self.options.room_id,
            from = ?cursor,
            limit = self.options.limit,
            flush_interval = self.options.flush_interval,
            stop_boundary = ?self.options.stop_boundary,
            "Starting pagination"
        );

        loop {
            trace!(state = state.name(), "Driver step");
            state = match state {
                DriverState::Idle => {
                    if self.shutdown.is_shutdown_requested() {
                        report.interrupted = true;
                        self.wind_down(&meta)
                    } else {
                        DriverState::Fetching
                    }
                }

                DriverState::Fetching => {
                    self.progress.request_started();
                    match self
                        .fetcher
                        .fetch_page(&self.options.room_id, cursor.as_deref(), self.options.limit)
                        .await
                    {
                        Ok(page) => {
                            self.progress.request_finished();
                            retry.reset();
                            report.requests += 1;
                            DriverState::Accumulating { page }
                        }
                        Err(err) => self.on_fetch_error(err, &mut retry, &report, &cursor),
                    }
                }

                DriverState::Retrying { wait } => {
                    tokio::select! {
                        _ = tokio::time::sleep(wait) => {}
                        _ = self.shutdown.requested() => {}
                    }
                    if self.shutdown.is_shutdown_requested() {
                        report.interrupted = true;
                        self.wind_down(&meta)
                    } else {
                        DriverState::Fetching
                    }
                }

                DriverState::Accumulating { page } => {
                    let continues =
                        should_continue(&page, self.options.limit, self.options.stop_boundary);
                    debug!(
                        records = page.records.len(),
                        start = %page.start,
                        end = ?page.end,
                        continues,
                        "Fetched page"
                    );

                    report.records += page.records.len() as u64;
                    if let Some(end) = &page.end {
                        cursor = Some(end.clone());
                    }
                    meta.absorb(page);

                    let interrupted = continues && self.shutdown.is_shutdown_requested();
                    if interrupted {
                        report.interrupted = true;
                    }

                    if !continues || interrupted {
                        DriverState::Flushing {
                            resume_after: false,
                        }
                    } else if flush_due(meta.pages_since_flush, self.options.flush_interval) {
                        DriverState::Flushing { resume_after: true }
                    } else {
                        self.progress.page_completed();
                        DriverState::Idle
                    }
                }

                DriverState::Flushing { resume_after } => {
                    match self.flush(&mut meta, &mut report).await {
                        Ok(()) => {
                            self.progress.page_completed();
                            if resume_after {
                                DriverState::Idle
                            } else {
                                DriverState::Stopped
                            }
                        }
                        Err(err) => DriverState::Failed(err),
                    }
                }

                DriverState::Stopped => {
                    self.progress.finished();
                    info!(
                        room = %self.options.room_id,
                        requests = report.requests,
                        records = report.records,
                        flushes = report.flushes,
                        interrupted = report.interrupted,
                        "Pagination finished"
                    );
                    return Ok(report);
                }

                DriverState::Failed(err) => {
                    self.progress.finished();
                    error!(
                        room = %self.options.room_id,
                        requests = report.requests,
                        "Pagination failed: {}",
                        err
                    );
                    return Err(err);
                }
            };
        }
    }

    fn on_fetch_error(
        &self,
        err: FetchError,
        retry: &mut RetryState,
        report: &PaginationReport,
        cursor: &Option<String>,
    ) -> DriverState {
        match self.policy.decide(&err, retry) {
            RetryDecision::Wait(wait) => {
                if !matches!(err, FetchError::RateLimited { .. }) {
                    warn!(
                        "Error while requesting messages for {} with from={:?}: {}",
                        self.options.room_id, cursor, err
                    );
                }
                self.progress.retrying(&err, wait);
                DriverState::Retrying { wait }
            }
            RetryDecision::Abort => {
                let failure = match err {
                    FetchError::Transient(_) => PaginationError::RetriesExhausted {
                        requests: report.requests,
                        attempts: retry.transient_attempts,
                        cursor: cursor.clone(),
                        source: err,
                    },
                    _ => PaginationError::Fatal {
                        requests: report.requests,
                        cursor: cursor.clone(),
                        source: err,
                    },
                };
                DriverState::Failed(failure)
            }
        }
    }

    /// Interrupted: flush what we have, or stop right away if nothing is buffered
    fn wind_down(&self, meta: &SessionMeta) -> DriverState {
        if meta.is_empty() {
            DriverState::Stopped
        } else {
            DriverState::Flushing {
                resume_after: false,
            }
        }
    }

    async fn flush(
        &self,
        meta: &mut SessionMeta,
        report: &mut PaginationReport,
    ) -> Result<(), PaginationError> {
        let Some(batch) = meta.take_batch() else {
            return Ok(());
        };

        let artifact = self
            .persister
            .persist(&batch)
            .await
            .map_err(|source| PaginationError::Persist {
                requests: report.requests,
                source,
            })?;

        report.flushes += 1;
        if let Some(path) = &artifact {
            report.artifacts.push(path.clone());
        }
        report.checkpoint = Some(batch.end_cursor.clone());
        self.progress.flushed(artifact.as_deref(), &batch.end_cursor);

        Ok(())
    }
}
