//! Sync run aggregates

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{MetricType, RunId};
use super::progress::{ProgressPhase, ProgressState};

/// Snapshot of one sync run: every metric's progress plus run metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgress {
    run_id: RunId,
    started_at: DateTime<Utc>,
    metrics: BTreeMap<MetricType, ProgressState>,
    cancelled: bool,
}

impl SyncProgress {
    /// Starts a new run with one `Waiting` state per distinct metric
    pub fn new(run_id: RunId, metrics: impl IntoIterator<Item = MetricType>) -> Self {
        let metrics = metrics
            .into_iter()
            .map(|m| (m.clone(), ProgressState::waiting(m)))
            .collect();
        Self {
            run_id,
            started_at: Utc::now(),
            metrics,
            cancelled: false,
        }
    }

    /// Progress with no run behind it (before the first run, after dismiss)
    pub fn empty() -> Self {
        Self {
            run_id: RunId::nil(),
            started_at: DateTime::<Utc>::UNIX_EPOCH,
            metrics: BTreeMap::new(),
            cancelled: false,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn metrics(&self) -> &BTreeMap<MetricType, ProgressState> {
        &self.metrics
    }

    pub fn get(&self, metric: &MetricType) -> Option<&ProgressState> {
        self.metrics.get(metric)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// True once every metric has reached a terminal phase
    pub fn all_terminal(&self) -> bool {
        self.metrics.values().all(ProgressState::is_terminal)
    }

    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    /// Replaces the stored state for `state.metric_type()`
    ///
    /// Returns false if the metric is not part of this run.
    pub fn update(&mut self, state: ProgressState) -> bool {
        match self.metrics.get_mut(state.metric_type()) {
            Some(slot) => {
                *slot = state;
                true
            }
            None => false,
        }
    }

    /// Total samples processed across all metrics
    pub fn samples_processed(&self) -> u64 {
        self.metrics.values().map(|s| s.samples_processed()).sum()
    }

    /// Builds the run summary as of `finished_at`
    pub fn summarize(&self, finished_at: DateTime<Utc>) -> RunSummary {
        let count = |phase| {
            self.metrics
                .values()
                .filter(|s| s.phase() == phase)
                .count()
        };
        RunSummary {
            run_id: self.run_id,
            complete: count(ProgressPhase::Complete),
            failed: count(ProgressPhase::Failed),
            cancelled: count(ProgressPhase::Cancelled),
            samples_processed: self.samples_processed(),
            duration_ms: (finished_at - self.started_at).num_milliseconds().max(0) as u64,
        }
    }
}

impl Default for SyncProgress {
    fn default() -> Self {
        Self::empty()
    }
}

/// Outcome of a finished sync run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: RunId,
    pub complete: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub samples_processed: u64,
    pub duration_ms: u64,
}

impl RunSummary {
    /// True if every metric completed
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.cancelled == 0
    }
}
