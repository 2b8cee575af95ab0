//! Collate bad senders into the servers they come from

use super::classify::server_name;
use super::progress_bar;
use crate::error::{Error, Result};
use crate::storage::{list_files, read_lines, write_lines, RoomStorage};
use futures::future::join_all;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info};

const BAD_SENDERS_PREFIX: &str = "bad-senders-";

/// Outcome of a server collation
#[derive(Debug)]
pub struct ServerCollation {
    pub files: usize,
    pub senders: usize,
    pub servers: BTreeSet<String>,
    pub output: PathBuf,
}

/// Whether `path` is a sender list written by a bad event scan
pub fn is_bad_senders_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "txt")
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(BAD_SENDERS_PREFIX))
}

/// Read every bad sender list of the room and write the distinct servers
pub async fn collate_bad_servers(
    storage: &RoomStorage,
    concurrency: usize,
    stamp: i64,
) -> Result<ServerCollation> {
    let files = list_files(storage.room_dir(), is_bad_senders_file).await?;
    info!("Collating servers from {} sender lists", files.len());

    let progress = progress_bar(files.len(), "Reading sender lists");
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

    let futures = files.iter().map(|path| {
        let semaphore = semaphore.clone();
        let progress = progress.clone();
        async move {
            let _permit = semaphore
                .acquire()
                .await
                .map_err(|e| Error::Other(e.to_string()))?;
            let result = read_lines(path).await.map_err(Error::from);
            progress.inc(1);
            result
        }
    });
    let results = join_all(futures).await;
    progress.finish_and_clear();

    let mut senders = 0;
    let mut servers = BTreeSet::new();
    for lines in results {
        for user_id in lines? {
            senders += 1;
            match server_name(&user_id) {
                Some(server) => {
                    servers.insert(server.to_string());
                }
                None => debug!("Skipping sender without server name: {}", user_id),
            }
        }
    }

    let output = storage.stamped_file("bad-servers", stamp, "txt");
    write_lines(&output, &servers).await?;
    info!(
        "Collated {} senders into {} servers: {}",
        senders,
        servers.len(),
        output.display()
    );

    Ok(ServerCollation {
        files: files.len(),
        senders,
        servers,
        output,
    })
}
