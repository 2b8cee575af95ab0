//! Moderation subcommands working from fetched room data

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::matrix::MatrixClient;
use crate::moderation::{
    collate_bad_servers, find_bad_events, find_bulk_spam, redact_events, save_memberships,
    BadEventFilter, BulkSpamRule, RedactionFailure, RedactionOptions,
};
use crate::pagination::shutdown_signal;
use crate::storage::{read_lines, unix_millis_now, RoomStorage};
use std::path::PathBuf;
use tracing::{info, warn};

fn override_concurrency(config: &mut AppConfig, concurrency: Option<usize>) -> Result<()> {
    if let Some(concurrency) = concurrency {
        config.moderation.concurrency = concurrency;
    }
    config.validate()
}

fn client_for(
    config: &mut AppConfig,
    homeserver_url: Option<String>,
    access_token: Option<String>,
) -> Result<MatrixClient> {
    if let Some(url) = homeserver_url {
        config.homeserver_url = Some(url);
    }
    if let Some(token) = access_token {
        config.access_token = Some(token);
    }
    MatrixClient::new(
        config.require_homeserver()?,
        config.access_token.clone(),
        config.fetch.request_timeout,
    )
}

pub async fn run_find_bad_events(
    mut config: AppConfig,
    room_id: String,
    grep: String,
    concurrency: Option<usize>,
) -> Result<()> {
    override_concurrency(&mut config, concurrency)?;
    let filter = BadEventFilter::new(&grep)?;
    let storage = RoomStorage::new(&config.data_dir, &room_id);

    let scan = find_bad_events(
        &storage,
        &filter,
        config.moderation.concurrency,
        unix_millis_now(),
    )
    .await?;

    if scan.malformed > 0 {
        warn!("{} malformed lines were skipped", scan.malformed);
    }
    println!(
        "Scanned {} events in {} files: {} bad events from {} senders",
        scan.events,
        scan.files,
        scan.bad_event_ids.len(),
        scan.bad_senders.len()
    );
    println!("  senders:   {}", scan.senders_file.display());
    println!("  event ids: {}", scan.event_ids_file.display());
    Ok(())
}

pub async fn run_collate_bad_servers(
    mut config: AppConfig,
    room_id: String,
    concurrency: Option<usize>,
) -> Result<()> {
    override_concurrency(&mut config, concurrency)?;
    let storage = RoomStorage::new(&config.data_dir, &room_id);

    let collation =
        collate_bad_servers(&storage, config.moderation.concurrency, unix_millis_now()).await?;

    println!(
        "Collated {} senders from {} files into {} servers: {}",
        collation.senders,
        collation.files,
        collation.servers.len(),
        collation.output.display()
    );
    Ok(())
}

/// Flags of the `find-bulk-spam` subcommand
#[derive(Debug, Clone)]
pub struct BulkSpamParams {
    pub homeserver_url: Option<String>,
    pub room_id: String,
    pub since: i64,
    pub membership_file: Option<PathBuf>,
    pub access_token: Option<String>,
}

pub async fn run_find_bulk_spam(mut config: AppConfig, params: BulkSpamParams) -> Result<()> {
    config.validate()?;
    let storage = RoomStorage::new(&config.data_dir, &params.room_id);
    let stamp = unix_millis_now();

    let membership_file = match params.membership_file {
        Some(path) => path,
        None => {
            println!("--membership-file not provided, fetching membership");
            let client = client_for(&mut config, params.homeserver_url, params.access_token)?;
            let (client, room_id) = (&client, params.room_id.as_str());
            let members = config
                .retry
                .run(move || client.room_members(room_id))
                .await?;
            let path = storage.stamped_file("members", stamp, "ndjson");
            save_memberships(&path, &members).await?;
            path
        }
    };

    let rule = BulkSpamRule {
        since: params.since,
        localpart_len: config.moderation.suspicious_localpart_len,
        known_good_servers: config.moderation.known_good_servers.clone(),
    };
    let report = find_bulk_spam(&membership_file, &rule, &storage, stamp).await?;

    println!("Processed {} membership events", report.memberships);
    println!(
        " - {} bulk spam MXIDs: {}",
        report.mxids.len(),
        report.mxids_file.display()
    );
    println!(
        " - {} bulk spam servers: {}",
        report.servers.len(),
        report.servers_file.display()
    );
    Ok(())
}

/// Flags of the `redact` subcommand
#[derive(Debug, Clone)]
pub struct RedactParams {
    pub homeserver_url: Option<String>,
    pub room_id: String,
    pub event_ids_file: PathBuf,
    pub concurrency: Option<usize>,
    pub reason: Option<String>,
    pub access_token: Option<String>,
}

pub async fn run_redact(mut config: AppConfig, params: RedactParams) -> Result<()> {
    override_concurrency(&mut config, params.concurrency)?;
    let event_ids = read_lines(&params.event_ids_file).await?;
    let client = client_for(&mut config, params.homeserver_url, params.access_token)?;

    info!(
        "Redacting {} events in {} ({} at a time)",
        event_ids.len(),
        params.room_id,
        config.moderation.concurrency
    );
    let options = RedactionOptions {
        room_id: params.room_id,
        reason: params.reason,
        concurrency: config.moderation.concurrency,
    };
    let report = redact_events(
        &client,
        &event_ids,
        &options,
        &config.retry,
        &shutdown_signal()?,
    )
    .await;

    for (event_id, failure) in &report.failed {
        if let RedactionFailure::Failed(err) = failure {
            warn!("Not redacted: {} ({})", event_id, err);
        }
    }
    println!(
        "Redacted {} of {} events ({} failed, {} cancelled)",
        report.redacted,
        report.requested,
        report.failed.len() - report.cancelled(),
        report.cancelled()
    );

    if report.cancelled() > 0 {
        return Err(Error::Interrupted(format!(
            "{} redactions were not attempted",
            report.cancelled()
        )));
    }
    if !report.failed.is_empty() {
        return Err(Error::Other(format!(
            "{} redactions failed",
            report.failed.len()
        )));
    }
    Ok(())
}
