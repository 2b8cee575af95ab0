//! Bulk redaction with bounded concurrency
//!
//! Every event gets its own retry loop under the shared [`RetryPolicy`]. One
//! event giving up does not stop the others.

use super::progress_bar;
use crate::matrix::MatrixClient;
use crate::pagination::{FetchError, RetryDecision, RetryPolicy, RetryState, ShutdownSignal};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

/// One redaction request
#[async_trait]
pub trait Redactor: Send + Sync {
    async fn redact(
        &self,
        room_id: &str,
        event_id: &str,
        reason: Option<&str>,
    ) -> Result<(), FetchError>;
}

#[async_trait]
impl Redactor for MatrixClient {
    async fn redact(
        &self,
        room_id: &str,
        event_id: &str,
        reason: Option<&str>,
    ) -> Result<(), FetchError> {
        let redaction = self.redact_event(room_id, event_id, reason).await?;
        debug!("Redacted {} with {:?}", event_id, redaction);
        Ok(())
    }
}

/// How to run a batch of redactions
#[derive(Debug, Clone)]
pub struct RedactionOptions {
    pub room_id: String,
    pub reason: Option<String>,
    pub concurrency: usize,
}

/// Why one event was not redacted
#[derive(Debug, Clone, PartialEq)]
pub enum RedactionFailure {
    Failed(FetchError),
    Cancelled,
}

/// Outcome of a redaction batch
#[derive(Debug, Default)]
pub struct RedactionReport {
    pub requested: usize,
    pub redacted: usize,
    pub failed: Vec<(String, RedactionFailure)>,
}

impl RedactionReport {
    pub fn cancelled(&self) -> usize {
        self.failed
            .iter()
            .filter(|(_, failure)| *failure == RedactionFailure::Cancelled)
            .count()
    }
}

/// Redact every id in `event_ids`, at most `concurrency` at a time
pub async fn redact_events<R: Redactor>(
    redactor: &R,
    event_ids: &[String],
    options: &RedactionOptions,
    policy: &RetryPolicy,
    shutdown: &ShutdownSignal,
) -> RedactionReport {
    let progress = progress_bar(event_ids.len(), "Redacting events");
    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));

    let futures = event_ids.iter().map(|event_id| {
        let semaphore = semaphore.clone();
        let progress = progress.clone();
        async move {
            let outcome = match semaphore.acquire().await {
                Ok(_permit) => redact_one(redactor, event_id, options, policy, shutdown).await,
                Err(_) => Err(RedactionFailure::Cancelled),
            };
            progress.inc(1);
            (event_id, outcome)
        }
    });
    let results = join_all(futures).await;
    progress.finish_and_clear();

    let mut report = RedactionReport {
        requested: event_ids.len(),
        ..Default::default()
    };
    for (event_id, outcome) in results {
        match outcome {
            Ok(()) => report.redacted += 1,
            Err(failure) => report.failed.push((event_id.clone(), failure)),
        }
    }
    report
}

async fn redact_one<R: Redactor>(
    redactor: &R,
    event_id: &str,
    options: &RedactionOptions,
    policy: &RetryPolicy,
    shutdown: &ShutdownSignal,
) -> Result<(), RedactionFailure> {
    let mut state = RetryState::default();
    loop {
        if shutdown.is_shutdown_requested() {
            return Err(RedactionFailure::Cancelled);
        }

        let err = match redactor
            .redact(&options.room_id, event_id, options.reason.as_deref())
            .await
        {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        match policy.decide(&err, &mut state) {
            RetryDecision::Wait(wait) => {
                if !matches!(err, FetchError::RateLimited { .. }) {
                    warn!("Error redacting {}, retrying in {:?}: {}", event_id, wait, err);
                }
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = shutdown.requested() => {}
                }
            }
            RetryDecision::Abort => {
                error!("Giving up on redacting {}: {}", event_id, err);
                return Err(RedactionFailure::Failed(err));
            }
        }
    }
}
