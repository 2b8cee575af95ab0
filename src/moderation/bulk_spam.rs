//! Find bulk-joined spam accounts in a room's membership

use super::classify::{server_name, BulkSpamRule};
use crate::error::Result;
use crate::pagination::Record;
use crate::storage::{read_ndjson, write_atomic, write_lines, RoomStorage};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::info;

/// Outcome of a bulk spam check
#[derive(Debug)]
pub struct BulkSpamReport {
    pub memberships: usize,
    pub malformed: usize,
    pub mxids: Vec<String>,
    pub servers: BTreeSet<String>,
    pub mxids_file: PathBuf,
    pub servers_file: PathBuf,
}

/// Persist raw membership events as newline-delimited JSON
pub async fn save_memberships(path: &Path, memberships: &[Record]) -> Result<usize> {
    let mut content = String::new();
    for membership in memberships {
        content.push_str(&serde_json::to_string(membership)?);
        content.push('\n');
    }
    write_atomic(path, content.as_bytes()).await?;
    info!(
        "Membership persisted to {} ({} events)",
        path.display(),
        memberships.len()
    );
    Ok(memberships.len())
}

/// Classify every membership event in `membership_file` and write the
/// suspicious user ids and their servers.
pub async fn find_bulk_spam(
    membership_file: &Path,
    rule: &BulkSpamRule,
    storage: &RoomStorage,
    stamp: i64,
) -> Result<BulkSpamReport> {
    let contents = read_ndjson::<Record>(membership_file).await?;

    let mut mxids = Vec::new();
    let mut servers = BTreeSet::new();
    for user_id in contents
        .items
        .iter()
        .filter_map(|membership| rule.suspicious_member(membership))
    {
        if let Some(server) = server_name(user_id) {
            servers.insert(server.to_string());
        }
        mxids.push(user_id.to_string());
    }

    let report = BulkSpamReport {
        memberships: contents.items.len(),
        malformed: contents.malformed,
        mxids,
        servers,
        mxids_file: storage.stamped_file("bulk-spam-mxids", stamp, "txt"),
        servers_file: storage.stamped_file("bulk-spam-servers", stamp, "txt"),
    };
    write_lines(&report.servers_file, &report.servers).await?;
    write_lines(&report.mxids_file, &report.mxids).await?;

    info!(
        "Processed {} membership events: {} bulk spam MXIDs from {} servers",
        report.memberships,
        report.mxids.len(),
        report.servers.len()
    );
    Ok(report)
}
