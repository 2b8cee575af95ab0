//! Data types shared by the pagination engine

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// One event from the remote log, kept verbatim.
///
/// Only the handful of fields the tools look at have accessors; everything
/// else round-trips untouched through the batch files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(pub Value);

impl Record {
    /// `origin_server_ts` in unix milliseconds
    pub fn timestamp(&self) -> Option<i64> {
        self.0.get("origin_server_ts").and_then(Value::as_i64)
    }

    pub fn event_id(&self) -> Option<&str> {
        self.0.get("event_id").and_then(Value::as_str)
    }

    pub fn event_type(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    pub fn sender(&self) -> Option<&str> {
        self.0.get("sender").and_then(Value::as_str)
    }

    pub fn state_key(&self) -> Option<&str> {
        self.0.get("state_key").and_then(Value::as_str)
    }

    /// `content.body` of a message event
    pub fn body(&self) -> Option<&str> {
        self.0
            .get("content")
            .and_then(|c| c.get("body"))
            .and_then(Value::as_str)
    }

    pub fn into_inner(self) -> Value {
        self.0
    }
}

impl From<Value> for Record {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Result of one successful fetch
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Records in the order the server returned them (newest first)
    pub records: Vec<Record>,
    /// Cursor the request started from
    pub start: String,
    /// Cursor to request next; absent when the server has nothing further
    pub end: Option<String>,
}

impl Page {
    /// The oldest record on a backwards page
    pub fn last_record(&self) -> Option<&Record> {
        self.records.last()
    }
}

/// Resume position written after every flush
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Cursor to pass as `from` on the next request
    pub from: String,
}

impl Checkpoint {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

/// Everything handed to the persister on one flush
#[derive(Debug, Clone)]
pub struct FlushBatch {
    pub records: Vec<Record>,
    /// `start` of the first page since the previous flush
    pub start_cursor: String,
    /// Last real cursor of the batch; becomes the checkpoint. A terminal
    /// page contributes the cursor it was requested from.
    pub end_cursor: String,
}

/// Outcome of a completed (or interrupted) pagination run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaginationReport {
    /// Requests that returned a page
    pub requests: u64,
    pub records: u64,
    pub flushes: u64,
    /// Batch files written, in order
    pub artifacts: Vec<PathBuf>,
    /// Cursor in the checkpoint after the last flush
    pub checkpoint: Option<String>,
    /// Stopped early because the operator asked for it
    pub interrupted: bool,
}
