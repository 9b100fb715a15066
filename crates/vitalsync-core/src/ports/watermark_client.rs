//! Watermark client port (driven/secondary port)
//!
//! The remote service is the source of truth for how far each metric has
//! been synced. A run asks for the watermarks once, before any pipeline
//! starts; a metric missing from the map starts at [`Cursor::beginning`].

use std::collections::HashMap;

use crate::domain::newtypes::{Cursor, MetricType};

/// Last-synced cursor per metric, as reported by the server
pub type Watermarks = HashMap<MetricType, Cursor>;

/// Port trait for reading server-held watermarks
#[async_trait::async_trait]
pub trait IWatermarkClient: Send + Sync {
    /// Fetches the watermark of every metric the server knows about
    ///
    /// Metrics the server has never seen, or reports with a null
    /// watermark, are simply absent from the returned map.
    async fn get_watermarks(&self) -> anyhow::Result<Watermarks>;
}
