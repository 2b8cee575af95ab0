//! Command routing and execution

use crate::cli::args::{Cli, Commands};
use crate::cli::commands::*;
use crate::config::AppConfig;
use crate::error::Result;
use tracing::debug;

/// Load configuration and execute the parsed command
pub async fn execute_command(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    debug!(data_dir = %config.data_dir.display(), "Configuration loaded");

    match cli.command {
        Commands::Fetch {
            homeserver_url,
            room_id,
            access_token,
            stop_date,
            resume,
            limit,
            flush_interval,
        } => {
            run_fetch(
                config,
                FetchParams {
                    homeserver_url,
                    room_id,
                    access_token,
                    stop_date,
                    resume,
                    limit,
                    flush_interval,
                },
            )
            .await
        }
        Commands::FindBadEvents {
            room_id,
            grep,
            concurrency,
        } => run_find_bad_events(config, room_id, grep, concurrency).await,
        Commands::CollateBadServers {
            room_id,
            concurrency,
        } => run_collate_bad_servers(config, room_id, concurrency).await,
        Commands::FindBulkSpam {
            homeserver_url,
            room_id,
            since,
            membership_file,
            access_token,
        } => {
            run_find_bulk_spam(
                config,
                BulkSpamParams {
                    homeserver_url,
                    room_id,
                    since,
                    membership_file,
                    access_token,
                },
            )
            .await
        }
        Commands::Redact {
            homeserver_url,
            room_id,
            event_ids_file,
            concurrency,
            reason,
            access_token,
        } => {
            run_redact(
                config,
                RedactParams {
                    homeserver_url,
                    room_id,
                    event_ids_file,
                    concurrency,
                    reason,
                    access_token,
                },
            )
            .await
        }
    }
}
