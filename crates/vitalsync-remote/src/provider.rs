//! HttpSyncRemote - port implementations over the aggregation server
//!
//! Implements [`IWatermarkClient`] and [`IBatchUploader`] by delegating to
//! the [`watermark`](crate::watermark) and [`upload`](crate::upload)
//! modules. Errors cross the port boundary as `anyhow::Error` wrapping the
//! typed [`RemoteError`](crate::RemoteError), so callers can still
//! downcast.

use std::time::Duration;

use anyhow::{Context, Result};
use vitalsync_core::config::RemoteConfig;
use vitalsync_core::domain::Sample;
use vitalsync_core::ports::{IBatchUploader, IWatermarkClient, UploadReceipt, Watermarks};

use crate::client::SyncApiClient;
use crate::{upload, watermark};

/// Remote sync endpoints exposed through the core ports
#[derive(Debug, Clone)]
pub struct HttpSyncRemote {
    client: SyncApiClient,
}

impl HttpSyncRemote {
    pub fn new(client: SyncApiClient) -> Self {
        Self { client }
    }

    /// Builds the client from the `remote` config section
    pub fn from_config(config: &RemoteConfig) -> Result<Self> {
        let client =
            SyncApiClient::new(&config.base_url, Duration::from_secs(config.timeout_secs))
                .context("Failed to build HTTP client")?;
        Ok(Self::new(client))
    }

    pub fn client(&self) -> &SyncApiClient {
        &self.client
    }
}

#[async_trait::async_trait]
impl IWatermarkClient for HttpSyncRemote {
    async fn get_watermarks(&self) -> Result<Watermarks> {
        watermark::fetch_watermarks(&self.client)
            .await
            .with_context(|| format!("GET {}{}", self.client.base_url(), watermark::WATERMARKS_PATH))
    }
}

#[async_trait::async_trait]
impl IBatchUploader for HttpSyncRemote {
    async fn upload_batch(&self, samples: &[Sample]) -> Result<UploadReceipt> {
        upload::upload_batch(&self.client, samples)
            .await
            .with_context(|| format!("POST {}{}", self.client.base_url(), upload::BATCH_PATH))
    }
}
