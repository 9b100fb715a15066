//! Aggregation server HTTP client
//!
//! Wraps `reqwest::Client` with base URL construction, a request timeout,
//! JSON helpers and the mapping from HTTP status codes to [`RemoteError`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use vitalsync_remote::client::SyncApiClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = SyncApiClient::new("https://sync.example.com", Duration::from_secs(30))?;
//! let watermarks = vitalsync_remote::watermark::fetch_watermarks(&client).await?;
//! println!("{} metrics known to the server", watermarks.len());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::RemoteError;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default retry-after duration when the header is missing or unparseable
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Longest HTTP-date `Retry-After` honoured; later dates fall back to the default
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Error bodies are truncated to this many bytes
const MAX_ERROR_BODY: usize = 512;

/// HTTP client for the sync endpoints
#[derive(Debug, Clone)]
pub struct SyncApiClient {
    client: Client,
    base_url: String,
}

impl SyncApiClient {
    /// Creates a client for `base_url` with a per-request `timeout`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("vitalsync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: normalize_base_url(base_url.into()),
        })
    }

    /// Creates a client with the default timeout (useful for testing)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: normalize_base_url(base_url.into()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates a request builder for `path` relative to the base URL
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, url)
    }

    /// `GET path` and decode the JSON body
    pub async fn get_json<T>(&self, path: &str) -> Result<T, RemoteError>
    where
        T: DeserializeOwned,
    {
        debug!(path, "GET");
        let response = self.request(Method::GET, path).send().await?;
        decode_json(check_status(response).await?).await
    }

    /// `POST path` with a JSON body and decode the JSON response
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, RemoteError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(path, "POST");
        let response = self.request(Method::POST, path).json(body).send().await?;
        decode_json(check_status(response).await?).await
    }
}

fn normalize_base_url(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes)
        .map_err(|e| RemoteError::InvalidResponse(format!("Failed to decode body: {e}")))
}

/// Passes 2xx responses through and maps everything else to a [`RemoteError`]
pub async fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(|v| parse_retry_after(v, DEFAULT_RETRY_AFTER))
        .unwrap_or(DEFAULT_RETRY_AFTER);
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }

    warn!(status = status.as_u16(), "Server returned an error status");
    Err(status_error(status, retry_after, body))
}

fn status_error(status: StatusCode, retry_after: Duration, body: String) -> RemoteError {
    match status {
        StatusCode::UNAUTHORIZED => RemoteError::Unauthorized(body),
        StatusCode::FORBIDDEN => RemoteError::Forbidden(body),
        StatusCode::NOT_FOUND => RemoteError::NotFound(body),
        StatusCode::TOO_MANY_REQUESTS => RemoteError::TooManyRequests { retry_after },
        s if s.is_server_error() => RemoteError::ServerError {
            status: s.as_u16(),
            body,
        },
        s => RemoteError::UnexpectedStatus {
            status: s.as_u16(),
            body,
        },
    }
}

/// Parses a Retry-After header value into a Duration.
///
/// The header can be either:
/// - An integer number of seconds (e.g., "30")
/// - An HTTP-date (e.g., "Fri, 31 Dec 2025 23:59:59 GMT"), taken as the delay from now
///
/// Falls back to the default duration if parsing fails or the date is in
/// the past or more than an hour away.
pub fn parse_retry_after(value: &str, default: Duration) -> Duration {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Duration::from_secs(seconds);
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value.trim()) {
        let delay = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
        if let Ok(delay) = delay.to_std() {
            if delay <= MAX_RETRY_AFTER {
                return delay;
            }
        }
    }

    warn!(value, "Could not parse Retry-After header, using default");
    default
}
