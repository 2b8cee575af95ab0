//! Command implementation modules

pub mod fetch;
pub mod moderation;

pub use fetch::{run_fetch, FetchParams};
pub use moderation::{
    run_collate_bad_servers, run_find_bad_events, run_find_bulk_spam, run_redact,
    BulkSpamParams, RedactParams,
};
