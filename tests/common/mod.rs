//! Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use roomsweep::pagination::{FetchError, Page, PageFetcher, ProgressReporter, Record, ShutdownSignal};
use serde_json::json;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Timestamp of the newest event in a generated history
pub const NEWEST_TS: i64 = 1_600_000_000_000;

/// `count` message events, newest first, ten seconds apart
pub fn history(count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| {
            Record(json!({
                "event_id": format!("$event{i}"),
                "type": "m.room.message",
                "sender": format!("@user{}:example.org", i % 7),
                "origin_server_ts": NEWEST_TS - (i as i64) * 10_000,
                "content": { "msgtype": "m.text", "body": format!("message {i}") }
            }))
        })
        .collect()
}

/// Cursor pointing at position `index` of the history
pub fn cursor(index: usize) -> String {
    format!("t{index}")
}

fn position(cursor: Option<&str>) -> usize {
    cursor
        .and_then(|c| c.strip_prefix('t'))
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

/// Serves a fixed history page by page, newest first, with scripted failures.
///
/// Each call first pops the failure script: `Some(err)` fails that call,
/// `None` (or an exhausted script) serves the page normally.
pub struct ScriptedFetcher {
    history: Vec<Record>,
    script: Mutex<VecDeque<Option<FetchError>>>,
    calls: Mutex<Vec<Option<String>>>,
    shutdown_after: Option<(usize, ShutdownSignal)>,
    served: Mutex<usize>,
}

impl ScriptedFetcher {
    pub fn new(history: Vec<Record>) -> Self {
        Self {
            history,
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            shutdown_after: None,
            served: Mutex::new(0),
        }
    }

    pub fn with_script(self, script: Vec<Option<FetchError>>) -> Self {
        *self.script.lock().unwrap() = script.into();
        self
    }

    /// Request shutdown right after the `pages`-th page has been served
    pub fn with_shutdown_after(mut self, pages: usize, shutdown: ShutdownSignal) -> Self {
        self.shutdown_after = Some((pages, shutdown));
        self
    }

    /// The `from` argument of every call, in order
    pub fn calls(&self) -> Vec<Option<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch_page(
        &self,
        _room_id: &str,
        from: Option<&str>,
        limit: usize,
    ) -> Result<Page, FetchError> {
        self.calls.lock().unwrap().push(from.map(str::to_string));

        if let Some(Some(err)) = self.script.lock().unwrap().pop_front() {
            return Err(err);
        }

        let start = position(from).min(self.history.len());
        let end = (start + limit).min(self.history.len());
        let records = self.history[start..end].to_vec();

        let mut served = self.served.lock().unwrap();
        *served += 1;
        if let Some((pages, shutdown)) = &self.shutdown_after {
            if *served == *pages {
                shutdown.request_shutdown();
            }
        }

        Ok(Page {
            end: (!records.is_empty()).then(|| cursor(end)),
            start: cursor(start),
            records,
        })
    }
}

/// Remembers what the driver reported
#[derive(Default)]
pub struct RecordingProgress {
    pub checkpoints: Mutex<Vec<String>>,
    pub retries: Mutex<Vec<Duration>>,
    pub pages: Mutex<usize>,
}

impl ProgressReporter for RecordingProgress {
    fn retrying(&self, _error: &FetchError, wait: Duration) {
        self.retries.lock().unwrap().push(wait);
    }

    fn flushed(&self, _artifact: Option<&Path>, checkpoint: &str) {
        self.checkpoints.lock().unwrap().push(checkpoint.to_string());
    }

    fn page_completed(&self) {
        *self.pages.lock().unwrap() += 1;
    }
}

/// Event ids of every record in the given ndjson files, in order
pub fn event_ids_in(files: &[impl AsRef<Path>]) -> Vec<String> {
    files
        .iter()
        .flat_map(|file| {
            std::fs::read_to_string(file)
                .unwrap()
                .lines()
                .map(|line| {
                    let value: serde_json::Value = serde_json::from_str(line).unwrap();
                    value["event_id"].as_str().unwrap().to_string()
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

pub fn event_ids(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.event_id().unwrap().to_string())
        .collect()
}
