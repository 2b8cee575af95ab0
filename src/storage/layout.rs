//! Directory layout for a room's stored data
//!
//! ```text
//! <data_dir>/
//!   <room id, first ':' replaced by '_'>/
//!     bad-senders-<ms>.txt, bad-event-ids-<ms>.txt, ...
//!     messages/
//!       start_<cursor>__end_<cursor>.ndjson
//!       resume.json
//! ```

use std::path::{Path, PathBuf};

/// Name of the checkpoint file inside the messages directory
pub const RESUME_FILE_NAME: &str = "resume.json";

/// Extension of persisted event batches
pub const ARTIFACT_EXTENSION: &str = "ndjson";

/// Resolves paths for one room below a data directory
#[derive(Debug, Clone)]
pub struct RoomStorage {
    room_dir: PathBuf,
}

impl RoomStorage {
    /// Create the layout for `room_id` under `data_dir`
    pub fn new(data_dir: impl AsRef<Path>, room_id: &str) -> Self {
        Self {
            room_dir: data_dir.as_ref().join(room_dir_name(room_id)),
        }
    }

    /// Directory holding every derived file for the room
    pub fn room_dir(&self) -> &Path {
        &self.room_dir
    }

    /// Directory holding fetched event batches and the resume checkpoint
    pub fn messages_dir(&self) -> PathBuf {
        self.room_dir.join("messages")
    }

    /// Location of the resume checkpoint
    pub fn resume_file(&self) -> PathBuf {
        self.messages_dir().join(RESUME_FILE_NAME)
    }

    /// Output file stamped with the run's start time, e.g. `bad-senders-1700000000000.txt`
    pub fn stamped_file(&self, prefix: &str, stamp: i64, extension: &str) -> PathBuf {
        self.room_dir.join(format!("{prefix}-{stamp}.{extension}"))
    }
}

/// Directory name for a room id.
///
/// Only the first `:` is replaced so directories written by earlier exports
/// of the same room keep matching.
pub fn room_dir_name(room_id: &str) -> String {
    room_id.replacen(':', "_", 1)
}

/// File name for a batch covering the cursor range `start..end`
pub fn artifact_file_name(start: &str, end: &str) -> String {
    format!(
        "start_{}__end_{}.{}",
        sanitize_cursor(start),
        sanitize_cursor(end),
        ARTIFACT_EXTENSION
    )
}

/// Cursors are opaque; only path separators are rewritten.
fn sanitize_cursor(cursor: &str) -> String {
    cursor
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}

/// Whether a file name in the messages directory is a persisted batch
pub fn is_artifact(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == ARTIFACT_EXTENSION)
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("start_"))
}
