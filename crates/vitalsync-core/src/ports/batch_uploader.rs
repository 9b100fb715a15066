//! Batch uploader port (driven/secondary port)

use serde::{Deserialize, Serialize};

use crate::domain::sample::Sample;

/// Server acknowledgement of one uploaded batch
///
/// `stored` may be lower than `received` when the server de-duplicates
/// samples it already holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub received: u64,
    pub stored: u64,
}

/// Port trait for pushing a batch of samples to the remote service
///
/// All samples in one call belong to the same metric. Errors are fatal to
/// that metric's pipeline only.
#[async_trait::async_trait]
pub trait IBatchUploader: Send + Sync {
    /// Uploads one batch
    async fn upload_batch(&self, samples: &[Sample]) -> anyhow::Result<UploadReceipt>;
}
