//! Batch source port (driven/secondary port)
//!
//! The on-device data store, seen by the sync engine as a stateless
//! capability: everything it needs (database handle, credentials) is
//! passed at construction, and every call is independent.

use crate::domain::newtypes::{Cursor, MetricType};
use crate::domain::sample::Sample;

/// Port trait for paging samples out of the local store
///
/// ## Contract
///
/// - Returns at most `limit` samples of `metric_type`.
/// - Samples are ordered by ascending effective end time.
/// - Every sample's effective end time is at or after `cursor`.
/// - Samples sharing an end time keep a stable order across calls.
/// - An empty vector means the stream is exhausted.
#[async_trait::async_trait]
pub trait IBatchSource: Send + Sync {
    /// Fetches the next batch of samples starting at `cursor`
    async fn fetch_batch(
        &self,
        metric_type: &MetricType,
        cursor: &Cursor,
        limit: usize,
    ) -> anyhow::Result<Vec<Sample>>;
}
