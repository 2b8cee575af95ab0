//! Matrix homeserver client
//!
//! Each method performs exactly one HTTP request and maps failures onto
//! [`FetchError`]. Retrying is left to the caller's
//! [`RetryPolicy`](crate::pagination::RetryPolicy).

use super::types::{
    MatrixErrorBody, MembersResponse, MessagesResponse, RedactRequest, RedactResponse,
};
use crate::error::{Error, Result};
use crate::pagination::{FetchError, Page, PageFetcher, Record};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::trace;
use url::Url;

/// Wait used when the server rate limits without saying for how long
pub const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_millis(1000);

/// Thin client over the r0 client-server API
#[derive(Debug, Clone)]
pub struct MatrixClient {
    client: Client,
    homeserver: Url,
    access_token: Option<String>,
}

impl MatrixClient {
    /// Create a client for `homeserver_url` (no trailing path needed)
    pub fn new(
        homeserver_url: &str,
        access_token: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let homeserver = Url::parse(homeserver_url)
            .map_err(|e| Error::Config(format!("Invalid homeserver URL {homeserver_url}: {e}")))?;
        if homeserver.cannot_be_a_base() || !matches!(homeserver.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "Homeserver URL must be http(s): {homeserver_url}"
            )));
        }

        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            homeserver,
            access_token,
        })
    }

    /// `{homeserver}/_matrix/client/r0/{segments...}` with each segment percent-encoded
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.homeserver.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            path.extend(["_matrix", "client", "r0"]);
            path.extend(segments);
        }
        url
    }

    /// URL for one backwards page of `/messages`
    pub fn messages_url(&self, room_id: &str, from: Option<&str>, limit: usize) -> Url {
        let mut url = self.endpoint(&["rooms", room_id, "messages"]);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("dir", "b");
            query.append_pair("limit", &limit.to_string());
            if let Some(from) = from {
                query.append_pair("from", from);
            }
        }
        url
    }

    /// Fetch one page of room history, newest first
    pub async fn messages(
        &self,
        room_id: &str,
        from: Option<&str>,
        limit: usize,
    ) -> std::result::Result<Page, FetchError> {
        let url = self.messages_url(room_id, from, limit);
        trace!(%url, "GET messages");
        let response: MessagesResponse = self.send(self.client.get(url)).await?;
        Ok(response.into_page())
    }

    /// Current membership events of a room
    pub async fn room_members(&self, room_id: &str) -> std::result::Result<Vec<Record>, FetchError> {
        let url = self.endpoint(&["rooms", room_id, "members"]);
        trace!(%url, "GET members");
        let response: MembersResponse = self.send(self.client.get(url)).await?;
        Ok(response.chunk)
    }

    /// Redact one event, returning the redaction's own event id when the server reports it
    pub async fn redact_event(
        &self,
        room_id: &str,
        event_id: &str,
        reason: Option<&str>,
    ) -> std::result::Result<Option<String>, FetchError> {
        let txn_id = uuid::Uuid::new_v4().to_string();
        let url = self.endpoint(&["rooms", room_id, "redact", event_id, &txn_id]);
        trace!(%url, "PUT redact");
        let response: RedactResponse = self
            .send(self.client.put(url).json(&RedactRequest { reason }))
            .await?;
        Ok(response.event_id)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> std::result::Result<T, FetchError> {
        let request = match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(|e| classify_transport(&e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(failure_from_response(response).await);
        }

        let body = response.text().await.map_err(|e| classify_transport(&e))?;
        serde_json::from_str(&body)
            .map_err(|e| FetchError::fatal(format!("malformed response from homeserver: {e}")))
    }
}

#[async_trait]
impl PageFetcher for MatrixClient {
    async fn fetch_page(
        &self,
        room_id: &str,
        from: Option<&str>,
        limit: usize,
    ) -> std::result::Result<Page, FetchError> {
        self.messages(room_id, from, limit).await
    }
}

async fn failure_from_response(response: Response) -> FetchError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.text().await.unwrap_or_default();
    classify_failure(status, retry_after, &body)
}

/// Map a non-success response onto the fetch error taxonomy.
///
/// Rate limits are recognised by status 429 or the `M_LIMIT_EXCEEDED`
/// errcode; the wait comes from `retry_after_ms`, then `Retry-After`, then
/// [`DEFAULT_RATE_LIMIT_WAIT`].
pub fn classify_failure(status: StatusCode, retry_after: Option<Duration>, body: &str) -> FetchError {
    let matrix_error: MatrixErrorBody = serde_json::from_str(body).unwrap_or_default();

    if status == StatusCode::TOO_MANY_REQUESTS || matrix_error.is_rate_limit() {
        let wait = matrix_error
            .retry_after_ms
            .map(Duration::from_millis)
            .or(retry_after)
            .unwrap_or(DEFAULT_RATE_LIMIT_WAIT);
        return FetchError::RateLimited { retry_after: wait };
    }

    let detail = match (&matrix_error.errcode, &matrix_error.error) {
        (Some(code), Some(message)) => format!("{status} {code}: {message}"),
        (Some(code), None) => format!("{status} {code}"),
        _ if body.is_empty() => status.to_string(),
        _ => format!("{status}: {}", truncate(body, 200)),
    };

    if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        FetchError::Transient(detail)
    } else {
        FetchError::Fatal(detail)
    }
}

/// Transport failures are worth retrying unless the request could not even be built
pub fn classify_transport(err: &reqwest::Error) -> FetchError {
    if err.is_builder() {
        FetchError::fatal(err)
    } else {
        FetchError::transient(err)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
