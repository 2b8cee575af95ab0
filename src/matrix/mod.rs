//! Matrix client-server API access

pub mod client;
pub mod types;

pub use client::{classify_failure, classify_transport, MatrixClient, DEFAULT_RATE_LIMIT_WAIT};
pub use types::{MatrixErrorBody, MessagesResponse};
