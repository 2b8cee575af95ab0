//! Pure classification rules for stored events

use crate::error::{Error, Result};
use crate::pagination::Record;
use regex::{Regex, RegexBuilder};

/// Event type whose body is matched against the bad-content pattern
pub const MESSAGE_EVENT_TYPE: &str = "m.room.message";

/// Matches message events whose body contains bad content
#[derive(Debug, Clone)]
pub struct BadEventFilter {
    pattern: Regex,
}

impl BadEventFilter {
    /// Compile `pattern` case-insensitively
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::Config(format!("Invalid pattern {pattern:?}: {e}")))?;
        Ok(Self { pattern })
    }

    /// Pure: whether `record` is a message whose body matches
    pub fn is_bad(&self, record: &Record) -> bool {
        record.event_type() == Some(MESSAGE_EVENT_TYPE)
            && record.body().is_some_and(|body| self.pattern.is_match(body))
    }
}

/// Pure: server name of a user id, everything after the first `:`
///
/// `@alice:example.org:8448` yields `example.org:8448`.
pub fn server_name(user_id: &str) -> Option<&str> {
    user_id
        .split_once(':')
        .map(|(_, server)| server)
        .filter(|server| !server.is_empty())
}

/// Pure: localpart of a user id including the leading `@`
pub fn localpart(user_id: &str) -> &str {
    user_id
        .split_once(':')
        .map_or(user_id, |(local, _)| local)
}

/// Recognises the bulk-joined accounts spam waves are made of: recent
/// joins with fixed-length random localparts from unfamiliar servers.
#[derive(Debug, Clone)]
pub struct BulkSpamRule {
    pub since: i64,
    pub localpart_len: usize,
    pub known_good_servers: Vec<String>,
}

impl BulkSpamRule {
    /// Pure: the offending user id, if `membership` matches
    pub fn suspicious_member<'a>(&self, membership: &'a Record) -> Option<&'a str> {
        if membership.timestamp()? <= self.since {
            return None;
        }
        let user_id = membership.state_key()?;
        let server = server_name(user_id)?;

        let suspicious = localpart(user_id).chars().count() == self.localpart_len
            && !self.known_good_servers.iter().any(|good| good == server);
        suspicious.then_some(user_id)
    }
}
