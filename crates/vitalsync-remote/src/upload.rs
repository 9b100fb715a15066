//! Batch upload endpoint
//!
//! `POST /sync/batch` accepts one metric's samples and reports how many
//! were received and how many were newly stored (the server de-duplicates
//! by sample id):
//!
//! ```json
//! { "metricType": "steps",
//!   "samples": [{ "id": "s-1", "metricType": "steps", "value": 12.0,
//!                 "startTime": "2024-01-01T00:00:00Z", "endTime": "2024-01-01T00:01:00Z" }] }
//! ```
//!
//! → `{ "received": 1, "stored": 1 }`

use serde::{Deserialize, Serialize};
use tracing::debug;
use vitalsync_core::domain::{MetricType, Sample};
use vitalsync_core::ports::UploadReceipt;

use crate::client::SyncApiClient;
use crate::RemoteError;

/// Path of the batch endpoint, relative to the base URL
pub const BATCH_PATH: &str = "/sync/batch";

/// Wire body of `POST /sync/batch`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUploadRequest<'a> {
    pub metric_type: &'a MetricType,
    pub samples: &'a [Sample],
}

/// Wire body of the batch endpoint's response
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BatchUploadResponse {
    pub received: u64,
    pub stored: u64,
}

impl<'a> BatchUploadRequest<'a> {
    /// Builds the request body, checking every sample is of one metric
    pub fn new(samples: &'a [Sample]) -> Result<Option<Self>, RemoteError> {
        let Some(first) = samples.first() else {
            return Ok(None);
        };
        let metric_type = first.metric_type();
        if let Some(stray) = samples.iter().find(|s| s.metric_type() != metric_type) {
            return Err(RemoteError::InvalidRequest(format!(
                "Batch mixes metrics {} and {}",
                metric_type,
                stray.metric_type()
            )));
        }
        Ok(Some(Self {
            metric_type,
            samples,
        }))
    }
}

/// Uploads one batch; an empty batch is acknowledged locally
pub async fn upload_batch(
    client: &SyncApiClient,
    samples: &[Sample],
) -> Result<UploadReceipt, RemoteError> {
    let Some(request) = BatchUploadRequest::new(samples)? else {
        return Ok(UploadReceipt::default());
    };

    let response: BatchUploadResponse = client.post_json(BATCH_PATH, &request).await?;
    if response.stored > response.received {
        return Err(RemoteError::InvalidResponse(format!(
            "stored ({}) exceeds received ({})",
            response.stored, response.received
        )));
    }

    debug!(
        metric = %request.metric_type,
        sent = samples.len(),
        received = response.received,
        stored = response.stored,
        "Batch accepted"
    );
    Ok(UploadReceipt {
        received: response.received,
        stored: response.stored,
    })
}
