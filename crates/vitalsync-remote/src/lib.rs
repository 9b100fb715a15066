//! VitalSync Remote - HTTP adapter for the aggregation server
//!
//! Provides:
//! - A typed HTTP client with status-to-error mapping
//! - The watermark endpoint (`GET /sync/watermarks`)
//! - The batch upload endpoint (`POST /sync/batch`)
//! - [`provider::HttpSyncRemote`], implementing the core's
//!   `IWatermarkClient` and `IBatchUploader` ports
//!
//! ## Modules
//!
//! - [`client`] - HTTP client, status mapping, `Retry-After` parsing
//! - [`watermark`] - Watermark endpoint and wire types
//! - [`upload`] - Batch upload endpoint and wire types
//! - [`provider`] - Port implementations

pub mod client;
pub mod provider;
pub mod upload;
pub mod watermark;

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when talking to the aggregation server
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Missing or rejected credentials (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Endpoint does not exist on this server (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded; retry after the specified duration (429)
    #[error("Too many requests, retry after {retry_after:?}")]
    TooManyRequests {
        /// Duration to wait before retrying
        retry_after: Duration,
    },

    /// A server-side error occurred (5xx)
    #[error("Server error ({status}): {body}")]
    ServerError { status: u16, body: String },

    /// Any other non-success status
    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The response body could not be decoded or was inconsistent
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The request could not be built from the given input
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}
