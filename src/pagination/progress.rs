//! Progress reporting capability handed to the driver
//!
//! The console reporter prints one character per driver event:
//!
//! | marker | event              |
//! |--------|--------------------|
//! | `^`    | request sent       |
//! | `v`    | response received  |
//! | `\|`   | batch flushed      |
//! | `.`    | page done          |
//! | `!`    | waiting to retry   |

use super::fetcher::FetchError;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Receives pagination events. Every method defaults to doing nothing.
pub trait ProgressReporter: Send + Sync {
    fn request_started(&self) {}
    fn request_finished(&self) {}
    fn retrying(&self, _error: &FetchError, _wait: Duration) {}
    fn flushed(&self, _artifact: Option<&Path>, _checkpoint: &str) {}
    fn page_completed(&self) {}
    fn finished(&self) {}
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {}

/// Writes single-character markers to a stream (stdout by default)
pub struct ConsoleProgress {
    out: Mutex<Box<dyn Write + Send>>,
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }
}

impl ConsoleProgress {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    fn mark(&self, marker: &str) {
        if let Ok(mut out) = self.out.lock() {
            // progress output is best effort
            let _ = out.write_all(marker.as_bytes());
            let _ = out.flush();
        }
    }
}

impl ProgressReporter for ConsoleProgress {
    fn request_started(&self) {
        self.mark("^");
    }

    fn request_finished(&self) {
        self.mark("v");
    }

    fn retrying(&self, _error: &FetchError, _wait: Duration) {
        self.mark("!");
    }

    fn flushed(&self, _artifact: Option<&Path>, _checkpoint: &str) {
        self.mark("|");
    }

    fn page_completed(&self) {
        self.mark(".");
    }

    fn finished(&self) {
        self.mark("\n");
    }
}
