//! Page fetching seam
//!
//! A [`PageFetcher`] performs exactly one request and reports failures in a
//! shape the [`RetryPolicy`](super::retry::RetryPolicy) can act on. It never
//! retries on its own.

use super::types::Page;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Why a single fetch failed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// The server asked us to slow down
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// Worth trying again (network trouble, 5xx, timeouts)
    #[error("transient failure: {0}")]
    Transient(String),

    /// Trying again will not help (bad token, unknown room, malformed reply)
    #[error("fatal failure: {0}")]
    Fatal(String),
}

impl FetchError {
    pub fn rate_limited_ms(ms: u64) -> Self {
        Self::RateLimited {
            retry_after: Duration::from_millis(ms),
        }
    }

    pub fn transient(cause: impl ToString) -> Self {
        Self::Transient(cause.to_string())
    }

    pub fn fatal(cause: impl ToString) -> Self {
        Self::Fatal(cause.to_string())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

/// One bounded request against the paginated endpoint
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch up to `limit` records of `room_id` starting at `from`
    /// (or at the live end of the stream when `from` is `None`).
    async fn fetch_page(
        &self,
        room_id: &str,
        from: Option<&str>,
        limit: usize,
    ) -> Result<Page, FetchError>;
}
