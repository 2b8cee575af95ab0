//! Scan fetched event batches for bad messages

use super::classify::BadEventFilter;
use super::progress_bar;
use crate::error::{Error, Result};
use crate::pagination::Record;
use crate::storage::{is_artifact, list_files, read_ndjson, write_lines, RoomStorage};
use futures::future::join_all;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// Outcome of a bad event scan
#[derive(Debug, Default)]
pub struct BadEventScan {
    pub files: usize,
    pub events: usize,
    pub malformed: usize,
    pub bad_senders: BTreeSet<String>,
    /// Ordered by batch file name, then by line. File names follow cursor
    /// text, which is not necessarily fetch order.
    pub bad_event_ids: Vec<String>,
    pub senders_file: PathBuf,
    pub event_ids_file: PathBuf,
}

#[derive(Debug, Default)]
struct FileScan {
    events: usize,
    malformed: usize,
    senders: Vec<String>,
    event_ids: Vec<String>,
}

/// Scan every stored batch of the room and write the bad sender and event id lists.
pub async fn find_bad_events(
    storage: &RoomStorage,
    filter: &BadEventFilter,
    concurrency: usize,
    stamp: i64,
) -> Result<BadEventScan> {
    let files = list_files(&storage.messages_dir(), is_artifact).await?;
    info!(
        "Scanning {} event batches in {}",
        files.len(),
        storage.messages_dir().display()
    );

    let progress = progress_bar(files.len(), "Scanning event batches");
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

    let futures = files.iter().map(|path| {
        let semaphore = semaphore.clone();
        let progress = progress.clone();
        async move {
            let _permit = semaphore
                .acquire()
                .await
                .map_err(|e| Error::Other(e.to_string()))?;
            let result = scan_file(path, filter).await;
            progress.inc(1);
            result
        }
    });
    let results = join_all(futures).await;
    progress.finish_and_clear();

    let mut scan = BadEventScan {
        files: files.len(),
        senders_file: storage.stamped_file("bad-senders", stamp, "txt"),
        event_ids_file: storage.stamped_file("bad-event-ids", stamp, "txt"),
        ..Default::default()
    };
    for result in results {
        let file = result?;
        scan.events += file.events;
        scan.malformed += file.malformed;
        scan.bad_senders.extend(file.senders);
        scan.bad_event_ids.extend(file.event_ids);
    }

    write_lines(&scan.senders_file, &scan.bad_senders).await?;
    write_lines(&scan.event_ids_file, &scan.bad_event_ids).await?;

    info!(
        events = scan.events,
        malformed = scan.malformed,
        "Found {} bad events from {} senders",
        scan.bad_event_ids.len(),
        scan.bad_senders.len()
    );
    Ok(scan)
}

async fn scan_file(path: &Path, filter: &BadEventFilter) -> Result<FileScan> {
    let contents = read_ndjson::<Record>(path).await?;
    let mut scan = FileScan {
        events: contents.items.len(),
        malformed: contents.malformed,
        ..Default::default()
    };

    for record in contents.items.iter().filter(|r| filter.is_bad(r)) {
        if let Some(sender) = record.sender() {
            scan.senders.push(sender.to_string());
        }
        if let Some(event_id) = record.event_id() {
            scan.event_ids.push(event_id.to_string());
        }
    }

    debug!(
        "{}: {} events, {} bad",
        path.display(),
        scan.events,
        scan.event_ids.len()
    );
    Ok(scan)
}
