//! Wire types for the Matrix client-server API endpoints we call

use crate::pagination::{Page, Record};
use serde::{Deserialize, Serialize};

/// `GET /rooms/{roomId}/messages` response
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub chunk: Vec<Record>,
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
}

impl MessagesResponse {
    pub fn into_page(self) -> Page {
        Page {
            records: self.chunk,
            start: self.start,
            end: self.end,
        }
    }
}

/// `GET /rooms/{roomId}/members` response
#[derive(Debug, Clone, Deserialize)]
pub struct MembersResponse {
    #[serde(default)]
    pub chunk: Vec<Record>,
}

/// `PUT /rooms/{roomId}/redact/{eventId}/{txnId}` request body
#[derive(Debug, Clone, Default, Serialize)]
pub struct RedactRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'a str>,
}

/// `PUT /rooms/{roomId}/redact/{eventId}/{txnId}` response
#[derive(Debug, Clone, Deserialize)]
pub struct RedactResponse {
    #[serde(default)]
    pub event_id: Option<String>,
}

/// Standard Matrix error body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatrixErrorBody {
    #[serde(default)]
    pub errcode: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub retry_after_ms: Option<u64>,
}

impl MatrixErrorBody {
    pub const LIMIT_EXCEEDED: &'static str = "M_LIMIT_EXCEEDED";

    pub fn is_rate_limit(&self) -> bool {
        self.errcode.as_deref() == Some(Self::LIMIT_EXCEEDED)
    }
}
