//! CLI argument structures

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Archive a Matrix room's history and clean up spam from it
#[derive(Parser, Debug)]
#[command(name = "roomsweep")]
#[command(about = "roomsweep - archive Matrix room history and clean up spam", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ./roomsweep.toml when present)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding per-room data
    #[arg(long, value_name = "DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch a room's history backwards into newline-delimited JSON batches
    Fetch {
        /// Homeserver to talk to (no trailing slash)
        #[arg(long, value_name = "URL")]
        homeserver_url: Option<String>,

        /// Room to fetch
        #[arg(long, value_name = "ID")]
        room_id: String,

        /// Access token (prefer ROOMSWEEP_ACCESS_TOKEN)
        #[arg(long, value_name = "TOKEN")]
        access_token: Option<String>,

        /// Stop once history reaches this point (unix ms or RFC 3339)
        #[arg(long, value_name = "WHEN", value_parser = parse_timestamp)]
        stop_date: Option<i64>,

        /// Continue from the stored checkpoint
        #[arg(long)]
        resume: bool,

        /// Events requested per page
        #[arg(long, value_name = "N")]
        limit: Option<usize>,

        /// Pages buffered between writes
        #[arg(long, value_name = "K")]
        flush_interval: Option<usize>,
    },

    /// Find messages matching a pattern in the fetched history
    FindBadEvents {
        /// Room whose fetched history is scanned
        #[arg(long, value_name = "ID")]
        room_id: String,

        /// Case-insensitive regular expression matched against message bodies
        #[arg(long, value_name = "REGEX")]
        grep: String,

        /// Files scanned at once
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,
    },

    /// Collate the servers of every bad sender found so far
    CollateBadServers {
        /// Room whose bad sender lists are read
        #[arg(long, value_name = "ID")]
        room_id: String,

        /// Files read at once
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,
    },

    /// Find recently joined accounts that look like a spam wave
    FindBulkSpam {
        /// Homeserver to talk to (no trailing slash)
        #[arg(long, value_name = "URL")]
        homeserver_url: Option<String>,

        /// Room whose membership is checked
        #[arg(long, value_name = "ID")]
        room_id: String,

        /// Only consider memberships newer than this (unix ms or RFC 3339)
        #[arg(long, value_name = "WHEN", value_parser = parse_timestamp)]
        since: i64,

        /// Previously saved members-<ms>.ndjson; fetched again when absent
        #[arg(long, value_name = "PATH")]
        membership_file: Option<PathBuf>,

        /// Access token (prefer ROOMSWEEP_ACCESS_TOKEN)
        #[arg(long, value_name = "TOKEN")]
        access_token: Option<String>,
    },

    /// Redact every event listed in a file
    Redact {
        /// Homeserver to talk to (no trailing slash)
        #[arg(long, value_name = "URL")]
        homeserver_url: Option<String>,

        /// Room the events belong to
        #[arg(long, value_name = "ID")]
        room_id: String,

        /// File with one event id per line, e.g. bad-event-ids-<ms>.txt
        #[arg(long, value_name = "PATH")]
        event_ids_file: PathBuf,

        /// Redactions in flight at once
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,

        /// Reason attached to each redaction
        #[arg(long)]
        reason: Option<String>,

        /// Access token (prefer ROOMSWEEP_ACCESS_TOKEN)
        #[arg(long, value_name = "TOKEN")]
        access_token: Option<String>,
    },
}

/// Parse unix milliseconds or an RFC 3339 date-time into unix milliseconds
pub fn parse_timestamp(value: &str) -> Result<i64, String> {
    if let Ok(ms) = value.parse::<i64>() {
        return Ok(ms);
    }
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.timestamp_millis())
        .map_err(|e| format!("expected unix milliseconds or an RFC 3339 date-time: {e}"))
}
