//! Sync orchestrator
//!
//! Owns the lifecycle of a sync run:
//!
//! ```text
//! start(metrics) ──► reset progress (all Waiting)
//!                    spawn driver ──► get_watermarks (best effort)
//!                                     spawn one MetricPipeline per metric
//!                                     join all ──► RunSummary
//! cancel()  ──► CancellationToken (cooperative)
//! wait()    ──► RunSummary of the current or last run
//! dismiss() ──► clear the finished run
//! ```
//!
//! At most one run is active per orchestrator. Per-metric failures are
//! recorded in the progress map and never surface as errors here.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use vitalsync_core::config::SyncConfig;
use vitalsync_core::domain::{MetricType, RunId, RunSummary, SyncProgress};
use vitalsync_core::ports::{IBatchSource, IBatchUploader, IProgressObserver, IWatermarkClient};

use crate::pipeline::MetricPipeline;
use crate::pool::WorkerPool;
use crate::progress::ProgressTracker;
use crate::SyncError;

/// Tunables for a [`SyncOrchestrator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Maximum number of pipelines running at once
    pub pool_capacity: usize,
    /// Maximum samples per batch
    pub batch_size: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            pool_capacity: 4,
            batch_size: 1000,
        }
    }
}

impl From<&SyncConfig> for SyncOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            pool_capacity: config.pool_capacity,
            batch_size: config.batch_size,
        }
    }
}

#[derive(Debug, Default)]
struct RunSlot {
    active: bool,
    cancel: Option<CancellationToken>,
}

/// State shared between the orchestrator and its driver task
struct Shared {
    tracker: ProgressTracker,
    summary: watch::Sender<Option<RunSummary>>,
    run: Mutex<RunSlot>,
}

impl Shared {
    fn new() -> Self {
        let (summary, _rx) = watch::channel(None);
        Self {
            tracker: ProgressTracker::new(None),
            summary,
            run: Mutex::new(RunSlot::default()),
        }
    }

    fn lock_run(&self) -> MutexGuard<'_, RunSlot> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes the summary and releases the run slot atomically
    fn finish(&self, summary: RunSummary) {
        let mut run = self.lock_run();
        self.summary.send_replace(Some(summary));
        run.active = false;
        run.cancel = None;
    }
}

/// Drives incremental sync runs across many metrics
pub struct SyncOrchestrator {
    watermarks: Arc<dyn IWatermarkClient>,
    source: Arc<dyn IBatchSource>,
    uploader: Arc<dyn IBatchUploader>,
    pool: WorkerPool,
    batch_size: usize,
    shared: Arc<Shared>,
}

impl SyncOrchestrator {
    pub fn new(
        watermarks: Arc<dyn IWatermarkClient>,
        source: Arc<dyn IBatchSource>,
        uploader: Arc<dyn IBatchUploader>,
        options: SyncOptions,
    ) -> Self {
        Self {
            watermarks,
            source,
            uploader,
            pool: WorkerPool::new(options.pool_capacity),
            batch_size: options.batch_size.max(1),
            shared: Arc::new(Shared::new()),
        }
    }

    /// Attaches an observer that receives every progress transition
    ///
    /// The progress and summary of earlier runs are kept. Attached during a
    /// run, the observer sees that run's remaining transitions.
    #[must_use]
    pub fn with_observer(self, observer: Arc<dyn IProgressObserver>) -> Self {
        self.shared.tracker.set_observer(Some(observer));
        self
    }

    /// The worker pool gating pipelines
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Starts a run over the distinct `metrics` and returns its id
    ///
    /// Returns as soon as the driver task is spawned. Must be called from
    /// within a Tokio runtime.
    ///
    /// # Errors
    /// Returns [`SyncError::RunAlreadyActive`] if a run is in progress.
    #[tracing::instrument(skip_all, fields(requested = metrics.len()))]
    pub fn start(&self, metrics: Vec<MetricType>) -> Result<RunId, SyncError> {
        let mut seen = HashSet::new();
        let metrics: Vec<MetricType> = metrics
            .into_iter()
            .filter(|m| seen.insert(m.clone()))
            .collect();

        let run_id = RunId::new();
        let cancel = CancellationToken::new();
        {
            // Waiters must never observe `active` next to the previous summary
            let mut run = self.shared.lock_run();
            if run.active {
                return Err(SyncError::RunAlreadyActive);
            }
            run.active = true;
            run.cancel = Some(cancel.clone());
            self.shared.summary.send_replace(None);
            self.shared
                .tracker
                .reset(SyncProgress::new(run_id, metrics.iter().cloned()));
        }

        info!(%run_id, metrics = metrics.len(), "Sync run started");

        let driver = RunDriver {
            run_id,
            metrics,
            watermarks: Arc::clone(&self.watermarks),
            source: Arc::clone(&self.source),
            uploader: Arc::clone(&self.uploader),
            pool: self.pool.clone(),
            batch_size: self.batch_size,
            shared: Arc::clone(&self.shared),
            cancel,
        };
        tokio::spawn(driver.run());

        Ok(run_id)
    }

    /// Requests cooperative cancellation of the active run
    ///
    /// Returns false if no run is active.
    pub fn cancel(&self) -> bool {
        let run = self.shared.lock_run();
        match (&run.cancel, run.active) {
            (Some(token), true) => {
                token.cancel();
                self.shared.tracker.mark_cancelled();
                info!("Sync run cancellation requested");
                true
            }
            _ => false,
        }
    }

    /// Consistent copy of the current (or last) run's progress
    pub fn progress_snapshot(&self) -> SyncProgress {
        self.shared.tracker.snapshot()
    }

    /// Receiver updated on every progress transition
    pub fn subscribe(&self) -> watch::Receiver<SyncProgress> {
        self.shared.tracker.subscribe()
    }

    pub fn is_run_active(&self) -> bool {
        self.shared.lock_run().active
    }

    /// Waits for the active run to finish and returns its summary
    ///
    /// If the last run already finished, returns its summary immediately.
    ///
    /// # Errors
    /// Returns [`SyncError::NoActiveRun`] if no run was started or the last
    /// one was dismissed.
    pub async fn wait(&self) -> Result<RunSummary, SyncError> {
        let mut rx = self.shared.summary.subscribe();
        {
            let run = self.shared.lock_run();
            if !run.active && rx.borrow().is_none() {
                return Err(SyncError::NoActiveRun);
            }
        }
        let summary = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| SyncError::NoActiveRun)?;
        summary.clone().ok_or(SyncError::NoActiveRun)
    }

    /// Clears the finished run's progress and summary
    ///
    /// # Errors
    /// Returns [`SyncError::RunAlreadyActive`] while a run is in progress.
    pub fn dismiss(&self) -> Result<(), SyncError> {
        let run = self.shared.lock_run();
        if run.active {
            return Err(SyncError::RunAlreadyActive);
        }
        self.shared.summary.send_replace(None);
        self.shared.tracker.reset(SyncProgress::empty());
        Ok(())
    }
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("pool", &self.pool)
            .field("batch_size", &self.batch_size)
            .field("active", &self.is_run_active())
            .finish()
    }
}

/// Everything the background driver task needs for one run
struct RunDriver {
    run_id: RunId,
    metrics: Vec<MetricType>,
    watermarks: Arc<dyn IWatermarkClient>,
    source: Arc<dyn IBatchSource>,
    uploader: Arc<dyn IBatchUploader>,
    pool: WorkerPool,
    batch_size: usize,
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl RunDriver {
    #[tracing::instrument(skip_all, fields(run_id = %self.run_id))]
    async fn run(self) {
        let watermarks = match self.watermarks.get_watermarks().await {
            Ok(watermarks) => watermarks,
            Err(e) => {
                warn!(
                    error = %format!("{e:#}"),
                    "Failed to fetch watermarks, syncing from the beginning"
                );
                HashMap::new()
            }
        };

        let handles: Vec<_> = self
            .metrics
            .iter()
            .map(|metric| {
                let start = watermarks.get(metric).copied().unwrap_or_default();
                let pipeline = MetricPipeline::new(
                    metric.clone(),
                    Arc::clone(&self.source),
                    Arc::clone(&self.uploader),
                    self.batch_size,
                    self.shared.tracker.clone(),
                    self.cancel.clone(),
                );
                (metric, tokio::spawn(pipeline.run(self.pool.clone(), start)))
            })
            .collect();

        for (metric, handle) in handles {
            if let Err(e) = handle.await {
                error!(%metric, error = %e, "Pipeline task ended abnormally");
                self.shared
                    .tracker
                    .fail_unfinished(metric, "pipeline task panicked");
            }
        }

        let summary = self.shared.tracker.snapshot().summarize(Utc::now());
        info!(
            complete = summary.complete,
            failed = summary.failed,
            cancelled = summary.cancelled,
            samples = summary.samples_processed,
            duration_ms = summary.duration_ms,
            "Sync run finished"
        );
        self.shared.finish(summary);
    }
}

#[cfg(test)]
mod tests {
    use vitalsync_core::domain::{Cursor, Sample};
    use vitalsync_core::ports::{UploadReceipt, Watermarks};

    use super::*;

    struct NoWatermarks;

    #[async_trait::async_trait]
    impl IWatermarkClient for NoWatermarks {
        async fn get_watermarks(&self) -> anyhow::Result<Watermarks> {
            Ok(Watermarks::new())
        }
    }

    struct EmptySource;

    #[async_trait::async_trait]
    impl IBatchSource for EmptySource {
        async fn fetch_batch(
            &self,
            _metric_type: &MetricType,
            _cursor: &Cursor,
            _limit: usize,
        ) -> anyhow::Result<Vec<Sample>> {
            Ok(Vec::new())
        }
    }

    struct NullUploader;

    #[async_trait::async_trait]
    impl IBatchUploader for NullUploader {
        async fn upload_batch(&self, samples: &[Sample]) -> anyhow::Result<UploadReceipt> {
            Ok(UploadReceipt {
                received: samples.len() as u64,
                stored: samples.len() as u64,
            })
        }
    }

    fn orchestrator() -> SyncOrchestrator {
        SyncOrchestrator::new(
            Arc::new(NoWatermarks),
            Arc::new(EmptySource),
            Arc::new(NullUploader),
            SyncOptions::default(),
        )
    }

    fn metric(name: &str) -> MetricType {
        MetricType::new(name).unwrap()
    }

    #[test]
    fn test_options_from_config() {
        let config = SyncConfig {
            pool_capacity: 2,
            batch_size: 50,
            metrics: Vec::new(),
        };
        let options = SyncOptions::from(&config);
        assert_eq!(options.pool_capacity, 2);
        assert_eq!(options.batch_size, 50);
    }

    #[tokio::test]
    async fn test_wait_without_run_fails() {
        let orch = orchestrator();
        assert!(matches!(orch.wait().await, Err(SyncError::NoActiveRun)));
        assert!(!orch.is_run_active());
        assert!(!orch.cancel());
    }

    #[tokio::test]
    async fn test_empty_run_finishes() {
        let orch = orchestrator();
        let run_id = orch.start(Vec::new()).unwrap();
        let summary = orch.wait().await.unwrap();
        assert_eq!(summary.run_id, run_id);
        assert_eq!(summary.complete, 0);
        assert!(!orch.is_run_active());
    }

    #[tokio::test]
    async fn test_duplicate_metrics_run_once() {
        let orch = orchestrator();
        orch.start(vec![metric("a"), metric("a"), metric("b")])
            .unwrap();
        let summary = orch.wait().await.unwrap();
        assert_eq!(summary.complete, 2);
        assert_eq!(orch.progress_snapshot().metrics().len(), 2);
    }

    #[tokio::test]
    async fn test_wait_after_finish_returns_last_summary() {
        let orch = orchestrator();
        orch.start(vec![metric("a")]).unwrap();
        let first = orch.wait().await.unwrap();
        let again = orch.wait().await.unwrap();
        assert_eq!(first, again);
    }

    #[tokio::test]
    async fn test_dismiss_clears_progress() {
        let orch = orchestrator();
        orch.start(vec![metric("a")]).unwrap();
        orch.wait().await.unwrap();

        orch.dismiss().unwrap();
        assert!(orch.progress_snapshot().is_empty());
        assert!(matches!(orch.wait().await, Err(SyncError::NoActiveRun)));
    }
}
