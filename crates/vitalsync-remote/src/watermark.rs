//! Watermark endpoint
//!
//! `GET /sync/watermarks` returns the last synced timestamp per metric:
//!
//! ```json
//! { "watermarks": { "heart_rate": "2024-01-01T10:00:00Z", "steps": null } }
//! ```
//!
//! A `null` watermark means the server holds no samples for that metric.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vitalsync_core::domain::{Cursor, MetricType};
use vitalsync_core::ports::Watermarks;

use crate::client::SyncApiClient;
use crate::RemoteError;

/// Path of the watermark endpoint, relative to the base URL
pub const WATERMARKS_PATH: &str = "/sync/watermarks";

/// Wire body of `GET /sync/watermarks`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatermarksResponse {
    pub watermarks: HashMap<String, Option<String>>,
}

impl WatermarksResponse {
    /// Converts the wire map into cursors
    ///
    /// Null entries are dropped. Entries whose key is not a valid metric
    /// identifier are skipped with a warning; an unparseable timestamp
    /// fails the whole response.
    pub fn into_watermarks(self) -> Result<Watermarks, RemoteError> {
        let mut out = Watermarks::with_capacity(self.watermarks.len());
        for (name, value) in self.watermarks {
            let Some(value) = value else {
                continue;
            };
            let metric = match MetricType::new(name.as_str()) {
                Ok(metric) => metric,
                Err(e) => {
                    warn!(metric = %name, error = %e, "Skipping watermark for invalid metric");
                    continue;
                }
            };
            let cursor: Cursor = value.parse().map_err(|e| {
                RemoteError::InvalidResponse(format!("Bad watermark for {name}: {e}"))
            })?;
            out.insert(metric, cursor);
        }
        Ok(out)
    }
}

/// Fetches every watermark the server knows about
pub async fn fetch_watermarks(client: &SyncApiClient) -> Result<Watermarks, RemoteError> {
    let response: WatermarksResponse = client.get_json(WATERMARKS_PATH).await?;
    let watermarks = response.into_watermarks()?;
    debug!(count = watermarks.len(), "Fetched watermarks");
    Ok(watermarks)
}
