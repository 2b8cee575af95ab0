//! Moderation tools that work from fetched room history
//!
//! - `classify.rs` - pure rules for bad messages and bulk spam accounts
//! - `scan.rs` - bad message scan over the stored event batches
//! - `servers.rs` - bad sender lists collated into server names
//! - `bulk_spam.rs` - bulk-joined spam accounts in the membership list
//! - `redact.rs` - bounded-concurrency redaction with retries

pub mod bulk_spam;
pub mod classify;
pub mod redact;
pub mod scan;
pub mod servers;

pub use bulk_spam::{find_bulk_spam, save_memberships, BulkSpamReport};
pub use classify::{localpart, server_name, BadEventFilter, BulkSpamRule};
pub use redact::{
    redact_events, RedactionFailure, RedactionOptions, RedactionReport, Redactor,
};
pub use scan::{find_bad_events, BadEventScan};
pub use servers::{collate_bad_servers, is_bad_senders_file, ServerCollation};

use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar for a batch of `total` work items
pub(crate) fn progress_bar(total: usize, message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░ ");
    pb.set_style(style);
    pb.set_message(message);
    pb
}
