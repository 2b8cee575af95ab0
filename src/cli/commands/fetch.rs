//! `fetch`: paginate a room's history to disk

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::matrix::MatrixClient;
use crate::pagination::{
    shutdown_signal, ConsoleProgress, FileCheckpointStore, NdjsonPersister, PaginationDriver,
    PaginationOptions,
};
use crate::storage::RoomStorage;
use std::sync::Arc;
use tracing::info;

/// Flags of the `fetch` subcommand
#[derive(Debug, Clone)]
pub struct FetchParams {
    pub homeserver_url: Option<String>,
    pub room_id: String,
    pub access_token: Option<String>,
    pub stop_date: Option<i64>,
    pub resume: bool,
    pub limit: Option<usize>,
    pub flush_interval: Option<usize>,
}

pub async fn run_fetch(mut config: AppConfig, params: FetchParams) -> Result<()> {
    if let Some(url) = params.homeserver_url {
        config.homeserver_url = Some(url);
    }
    if let Some(token) = params.access_token {
        config.access_token = Some(token);
    }
    if let Some(limit) = params.limit {
        config.fetch.page_limit = limit;
    }
    if let Some(interval) = params.flush_interval {
        config.fetch.flush_interval = interval;
    }
    config.validate()?;

    let client = MatrixClient::new(
        config.require_homeserver()?,
        config.access_token.clone(),
        config.fetch.request_timeout,
    )?;

    let storage = RoomStorage::new(&config.data_dir, &params.room_id);
    let persister = NdjsonPersister::new(
        storage.messages_dir(),
        FileCheckpointStore::new(storage.resume_file()),
    );
    let options = PaginationOptions::new(&params.room_id)
        .with_limit(config.fetch.page_limit)
        .with_flush_interval(config.fetch.flush_interval)
        .with_stop_boundary(params.stop_date);

    let driver = PaginationDriver::new(client, persister, config.retry.clone(), options)
        .with_progress(Arc::new(ConsoleProgress::default()))
        .with_shutdown(shutdown_signal()?);

    info!(
        "Fetching {} into {}",
        params.room_id,
        storage.messages_dir().display()
    );
    let report = if params.resume {
        driver.resume().await?
    } else {
        driver.run(None).await?
    };

    println!(
        "Fetched {} events in {} requests, {} batches written to {}",
        report.records,
        report.requests,
        report.artifacts.len(),
        storage.messages_dir().display()
    );
    if let Some(checkpoint) = &report.checkpoint {
        println!("Checkpoint: {checkpoint}");
    }

    if report.interrupted {
        return Err(Error::Interrupted(format!(
            "stopped after {} requests, continue with --resume",
            report.requests
        )));
    }
    Ok(())
}
