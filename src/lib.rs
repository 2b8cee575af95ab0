//! # roomsweep
//!
//! Archive a Matrix room's history to disk and clean spam out of it.
//!
//! ## Usage
//!
//! ```bash
//! roomsweep fetch --homeserver-url https://matrix.example.org --room-id '!abc:example.org'
//! roomsweep find-bad-events --room-id '!abc:example.org' --grep 'free crypto'
//! roomsweep redact --homeserver-url https://matrix.example.org --room-id '!abc:example.org' \
//!     --event-ids-file 'data/!abc_example.org/bad-event-ids-1700000000000.txt'
//! ```
//!
//! ## Modules
//!
//! - `pagination` - Resumable, checkpointed backwards pagination engine
//! - `matrix` - Client-server API access and response classification
//! - `storage` - Per-room directory layout and atomic file writes
//! - `moderation` - Bad message scans, server collation, bulk spam detection, redaction
//! - `config` - Layered configuration (defaults, TOML file, environment, flags)
//! - `cli` - Command line parsing and command routing
//! - `error` - Top-level error type and process exit codes
pub mod cli;
pub mod config;
pub mod error;
pub mod matrix;
pub mod moderation;
pub mod pagination;
pub mod storage;

pub use error::{Error, Result};
