//! Per-metric sync pipeline
//!
//! One pipeline owns one metric's [`ProgressState`]. After taking a pool
//! slot it loops: fetch a batch starting at the cursor, upload it, advance
//! the cursor to the last uploaded sample, and stop once the source runs dry.
//!
//! The source is inclusive at the cursor, so samples sharing the cursor's
//! end time are never skipped across a batch boundary. Those already
//! uploaded are remembered by id and filtered out of the next fetch, whose
//! limit grows by the same amount.
//!
//! Cancellation is checked at two points per iteration: before each fetch
//! and between fetch and upload. A pipeline still queued for a slot is
//! released by the cancellation signal directly.

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vitalsync_core::domain::{
    Batch, Cursor, DomainError, MetricType, ProgressState, Sample, SampleId,
};
use vitalsync_core::ports::{IBatchSource, IBatchUploader};

use crate::pool::WorkerPool;
use crate::progress::ProgressTracker;

/// Fetch→upload loop for a single metric
pub struct MetricPipeline {
    metric: MetricType,
    source: Arc<dyn IBatchSource>,
    uploader: Arc<dyn IBatchUploader>,
    batch_size: usize,
    tracker: ProgressTracker,
    cancel: CancellationToken,
}

impl MetricPipeline {
    pub fn new(
        metric: MetricType,
        source: Arc<dyn IBatchSource>,
        uploader: Arc<dyn IBatchUploader>,
        batch_size: usize,
        tracker: ProgressTracker,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            metric,
            source,
            uploader,
            batch_size: batch_size.max(1),
            tracker,
            cancel,
        }
    }

    /// Runs the pipeline to a terminal phase and returns the final state
    ///
    /// `start` is the server watermark for this metric, or
    /// [`Cursor::beginning`] when there is none.
    #[tracing::instrument(skip_all, fields(metric = %self.metric, start = %start))]
    pub async fn run(self, pool: WorkerPool, start: Cursor) -> ProgressState {
        let mut state = ProgressState::waiting(self.metric.clone());

        let acquired = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!("Cancelled while queued for a worker slot");
                self.apply(&mut state, ProgressState::cancel);
                return state;
            }
            acquired = pool.acquire() => acquired,
        };
        let _slot = match acquired {
            Ok(slot) => slot,
            Err(e) => {
                let reason = e.to_string();
                self.apply(&mut state, |s| s.fail(reason));
                return state;
            }
        };

        self.apply(&mut state, |s| s.start_fetching(start));
        self.drive(&mut state, start).await;
        state
    }

    async fn drive(&self, state: &mut ProgressState, mut cursor: Cursor) {
        // Uploaded samples whose end time equals `cursor`. The source is
        // inclusive at the cursor, so these come back on the next fetch.
        let mut boundary: HashSet<SampleId> = HashSet::new();

        loop {
            if self.cancel.is_cancelled() {
                debug!(%cursor, "Cancelled before fetch");
                self.apply(state, ProgressState::cancel);
                return;
            }

            let limit = self.batch_size + boundary.len();
            let fetched = match self.source.fetch_batch(&self.metric, &cursor, limit).await {
                Ok(samples) => samples,
                Err(e) => {
                    warn!(%cursor, error = %e, "Batch fetch failed");
                    self.apply(state, |s| s.fail(format!("fetch failed: {e:#}")));
                    return;
                }
            };
            let exhausted = fetched.len() < limit;

            let mut samples: Vec<Sample> = fetched
                .into_iter()
                .filter(|s| !boundary.contains(s.id()))
                .collect();
            let truncated = samples.len() > self.batch_size;
            samples.truncate(self.batch_size);

            if samples.is_empty() {
                if !exhausted {
                    warn!(%cursor, limit, "Batch source returned only samples already uploaded");
                    self.apply(state, |s| {
                        s.fail(format!("batch source made no progress past {cursor}"))
                    });
                    return;
                }
                info!(processed = state.samples_processed(), "Metric up to date");
                self.apply(state, ProgressState::complete);
                return;
            }

            let batch = match Batch::new(self.metric.clone(), samples) {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(error = %e, "Batch source returned an invalid batch");
                    self.apply(state, |s| s.fail(e.to_string()));
                    return;
                }
            };

            self.apply(state, ProgressState::begin_upload);

            if self.cancel.is_cancelled() {
                debug!(%cursor, batch_len = batch.len(), "Cancelled before upload");
                self.apply(state, ProgressState::cancel);
                return;
            }

            let receipt = match self.uploader.upload_batch(batch.samples()).await {
                Ok(receipt) => receipt,
                Err(e) => {
                    warn!(%cursor, batch_len = batch.len(), error = %e, "Batch upload failed");
                    self.apply(state, |s| s.fail(format!("upload failed: {e:#}")));
                    return;
                }
            };

            if let Some(last_end) = batch.last_end() {
                if cursor.advance_to(last_end) {
                    boundary.clear();
                }
            }
            boundary.extend(
                batch
                    .samples()
                    .iter()
                    .filter(|s| s.effective_end() == cursor.as_datetime())
                    .map(|s| s.id().clone()),
            );
            debug!(
                %cursor,
                batch_len = batch.len(),
                at_cursor = boundary.len(),
                received = receipt.received,
                stored = receipt.stored,
                "Batch uploaded"
            );
            self.apply(state, |s| s.record_upload(receipt.stored, cursor));

            if exhausted && !truncated {
                info!(processed = state.samples_processed(), "Metric up to date");
                self.apply(state, ProgressState::complete);
                return;
            }
        }
    }

    /// Applies a transition and publishes the new state
    fn apply<F>(&self, state: &mut ProgressState, transition: F)
    where
        F: FnOnce(&mut ProgressState) -> Result<(), DomainError>,
    {
        match transition(state) {
            Ok(()) => self.tracker.publish(state),
            Err(e) => error!(error = %e, "Rejected progress transition"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use anyhow::anyhow;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use vitalsync_core::domain::{ProgressPhase, RunId, SyncProgress};
    use vitalsync_core::ports::UploadReceipt;

    use super::*;

    fn metric(name: &str) -> MetricType {
        MetricType::new(name).unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn samples(metric_name: &str, count: usize) -> Vec<Sample> {
        (0..count)
            .map(|i| {
                let at = t0() + Duration::minutes(i as i64 + 1);
                Sample::new(SampleId::generate(), metric(metric_name), 1.0, at, None).unwrap()
            })
            .collect()
    }

    /// Source that pages through a fixed per-metric vector
    struct VecSource {
        data: HashMap<MetricType, Vec<Sample>>,
        fetches: Mutex<Vec<Cursor>>,
    }

    impl VecSource {
        fn new(metric_name: &str, count: usize) -> Self {
            Self::from_samples(metric_name, samples(metric_name, count))
        }

        fn from_samples(metric_name: &str, series: Vec<Sample>) -> Self {
            let mut data = HashMap::new();
            data.insert(metric(metric_name), series);
            Self {
                data,
                fetches: Mutex::new(Vec::new()),
            }
        }

        fn fetch_log(&self) -> Vec<Cursor> {
            self.fetches.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl IBatchSource for VecSource {
        async fn fetch_batch(
            &self,
            metric_type: &MetricType,
            cursor: &Cursor,
            limit: usize,
        ) -> anyhow::Result<Vec<Sample>> {
            self.fetches.lock().unwrap().push(*cursor);
            Ok(self
                .data
                .get(metric_type)
                .map(|all| {
                    all.iter()
                        .filter(|s| s.effective_end() >= cursor.as_datetime())
                        .take(limit)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default())
        }
    }

    #[derive(Default)]
    struct CountingUploader {
        uploaded: Mutex<usize>,
        ids: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl IBatchUploader for CountingUploader {
        async fn upload_batch(&self, samples: &[Sample]) -> anyhow::Result<UploadReceipt> {
            if self.fail {
                return Err(anyhow!("HTTP 503"));
            }
            *self.uploaded.lock().unwrap() += samples.len();
            self.ids
                .lock()
                .unwrap()
                .extend(samples.iter().map(|s| s.id().to_string()));
            Ok(UploadReceipt {
                received: samples.len() as u64,
                stored: samples.len() as u64,
            })
        }
    }

    fn ending_at(id: &str, minute: i64) -> Sample {
        let at = t0() + Duration::minutes(minute);
        Sample::new(SampleId::new(id).unwrap(), metric("hr"), 70.0, at, None).unwrap()
    }

    fn tracker_for(name: &str) -> ProgressTracker {
        let tracker = ProgressTracker::new(None);
        tracker.reset(SyncProgress::new(RunId::new(), vec![metric(name)]));
        tracker
    }

    #[tokio::test]
    async fn test_pages_until_short_batch() {
        let source = Arc::new(VecSource::new("steps", 25));
        let uploader = Arc::new(CountingUploader::default());
        let pipeline = MetricPipeline::new(
            metric("steps"),
            source.clone(),
            uploader.clone(),
            10,
            tracker_for("steps"),
            CancellationToken::new(),
        );

        let state = pipeline.run(WorkerPool::new(1), Cursor::beginning()).await;

        assert_eq!(state.phase(), ProgressPhase::Complete);
        assert_eq!(state.samples_processed(), 25);
        assert_eq!(state.samples_total(), Some(25));
        assert_eq!(*uploader.uploaded.lock().unwrap(), 25);
        // 10 + 10 + 5: the short third batch ends the stream without a fourth fetch
        assert_eq!(source.fetches.lock().unwrap().len(), 3);
        assert_eq!(
            state.cursor().unwrap().as_datetime(),
            t0() + Duration::minutes(25)
        );
    }

    #[tokio::test]
    async fn test_exact_multiple_needs_empty_fetch() {
        let source = Arc::new(VecSource::new("steps", 20));
        let pipeline = MetricPipeline::new(
            metric("steps"),
            source.clone(),
            Arc::new(CountingUploader::default()),
            10,
            tracker_for("steps"),
            CancellationToken::new(),
        );

        let state = pipeline.run(WorkerPool::new(1), Cursor::beginning()).await;

        assert_eq!(state.phase(), ProgressPhase::Complete);
        assert_eq!(state.samples_processed(), 20);
        assert_eq!(source.fetches.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_cursors_are_monotonic() {
        let source = Arc::new(VecSource::new("hr", 35));
        let pipeline = MetricPipeline::new(
            metric("hr"),
            source.clone(),
            Arc::new(CountingUploader::default()),
            10,
            tracker_for("hr"),
            CancellationToken::new(),
        );

        pipeline.run(WorkerPool::new(1), Cursor::beginning()).await;

        let fetches = source.fetches.lock().unwrap().clone();
        assert!(fetches.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_upload_failure_keeps_cursor() {
        let tracker = tracker_for("hr");
        let pipeline = MetricPipeline::new(
            metric("hr"),
            Arc::new(VecSource::new("hr", 5)),
            Arc::new(CountingUploader {
                fail: true,
                ..Default::default()
            }),
            10,
            tracker.clone(),
            CancellationToken::new(),
        );

        let state = pipeline.run(WorkerPool::new(1), Cursor::beginning()).await;

        assert_eq!(state.phase(), ProgressPhase::Failed);
        assert_eq!(state.cursor(), Some(Cursor::beginning()));
        assert_eq!(state.samples_processed(), 0);
        assert!(state.error().unwrap().contains("HTTP 503"));
        assert_eq!(tracker.snapshot().get(&metric("hr")), Some(&state));
    }

    #[tokio::test]
    async fn test_cancelled_while_queued() {
        let pool = WorkerPool::new(1);
        let _held = pool.acquire().await.unwrap();
        let cancel = CancellationToken::new();
        let uploader = Arc::new(CountingUploader::default());
        let pipeline = MetricPipeline::new(
            metric("hr"),
            Arc::new(VecSource::new("hr", 5)),
            uploader.clone(),
            10,
            tracker_for("hr"),
            cancel.clone(),
        );

        let handle = tokio::spawn(pipeline.run(pool.clone(), Cursor::beginning()));
        tokio::task::yield_now().await;
        cancel.cancel();
        let state = handle.await.unwrap();

        assert_eq!(state.phase(), ProgressPhase::Cancelled);
        assert_eq!(*uploader.uploaded.lock().unwrap(), 0);
        assert_eq!(pool.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_closed_pool_fails_metric() {
        let pool = WorkerPool::new(1);
        pool.close();
        let pipeline = MetricPipeline::new(
            metric("hr"),
            Arc::new(VecSource::new("hr", 5)),
            Arc::new(CountingUploader::default()),
            10,
            tracker_for("hr"),
            CancellationToken::new(),
        );

        let state = pipeline.run(pool, Cursor::beginning()).await;
        assert_eq!(state.phase(), ProgressPhase::Failed);
    }

    #[tokio::test]
    async fn test_samples_tied_across_batch_boundary_are_all_uploaded() {
        let source = Arc::new(VecSource::from_samples(
            "hr",
            vec![ending_at("a", 1), ending_at("b", 2), ending_at("c", 2)],
        ));
        let uploader = Arc::new(CountingUploader::default());
        let pipeline = MetricPipeline::new(
            metric("hr"),
            source.clone(),
            uploader.clone(),
            2,
            tracker_for("hr"),
            CancellationToken::new(),
        );

        let state = pipeline.run(WorkerPool::new(1), Cursor::beginning()).await;

        assert_eq!(state.phase(), ProgressPhase::Complete);
        assert_eq!(*uploader.ids.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(state.samples_processed(), 3);
        assert_eq!(
            source.fetch_log(),
            vec![
                Cursor::beginning(),
                Cursor::from_datetime(t0() + Duration::minutes(2))
            ]
        );
    }

    #[tokio::test]
    async fn test_more_ties_than_batch_size_upload_each_once() {
        let tied: Vec<Sample> = ["s0", "s1", "s2", "s3", "s4"]
            .iter()
            .map(|id| ending_at(id, 5))
            .collect();
        let source = Arc::new(VecSource::from_samples("hr", tied));
        let uploader = Arc::new(CountingUploader::default());
        let pipeline = MetricPipeline::new(
            metric("hr"),
            source.clone(),
            uploader.clone(),
            2,
            tracker_for("hr"),
            CancellationToken::new(),
        );

        let state = pipeline.run(WorkerPool::new(1), Cursor::beginning()).await;

        assert_eq!(state.phase(), ProgressPhase::Complete);
        assert_eq!(
            *uploader.ids.lock().unwrap(),
            vec!["s0", "s1", "s2", "s3", "s4"]
        );
        assert_eq!(source.fetch_log().len(), 3);
    }

    /// Source that ignores the cursor and keeps serving the same page
    struct StuckSource(Vec<Sample>);

    #[async_trait::async_trait]
    impl IBatchSource for StuckSource {
        async fn fetch_batch(
            &self,
            _metric_type: &MetricType,
            _cursor: &Cursor,
            limit: usize,
        ) -> anyhow::Result<Vec<Sample>> {
            Ok(self.0.iter().cycle().take(limit).cloned().collect())
        }
    }

    #[tokio::test]
    async fn test_source_without_progress_fails_metric() {
        let uploader = Arc::new(CountingUploader::default());
        let pipeline = MetricPipeline::new(
            metric("hr"),
            Arc::new(StuckSource(vec![ending_at("a", 1), ending_at("b", 1)])),
            uploader.clone(),
            2,
            tracker_for("hr"),
            CancellationToken::new(),
        );

        let state = pipeline.run(WorkerPool::new(1), Cursor::beginning()).await;

        assert_eq!(state.phase(), ProgressPhase::Failed);
        assert!(state.error().unwrap().contains("no progress"));
        assert_eq!(*uploader.uploaded.lock().unwrap(), 2);
    }
}
