//! Progress publication
//!
//! The run's [`SyncProgress`] lives in a `tokio::sync::watch` channel:
//! pipelines write through [`ProgressTracker::publish`], readers take
//! consistent snapshots or subscribe to changes. Each published state is
//! also forwarded to the optional [`IProgressObserver`].

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::watch;
use vitalsync_core::domain::{MetricType, ProgressState, SyncProgress};
use vitalsync_core::ports::IProgressObserver;

type ObserverSlot = Arc<RwLock<Option<Arc<dyn IProgressObserver>>>>;

/// Shared handle over the run's progress channel
///
/// Clones share both the channel and the observer slot.
#[derive(Clone)]
pub struct ProgressTracker {
    tx: Arc<watch::Sender<SyncProgress>>,
    observer: ObserverSlot,
}

impl ProgressTracker {
    pub fn new(observer: Option<Arc<dyn IProgressObserver>>) -> Self {
        let (tx, _rx) = watch::channel(SyncProgress::empty());
        Self {
            tx: Arc::new(tx),
            observer: Arc::new(RwLock::new(observer)),
        }
    }

    /// Replaces the observer for every clone of this tracker
    ///
    /// Progress already published is kept; the new observer only sees
    /// transitions from now on.
    pub fn set_observer(&self, observer: Option<Arc<dyn IProgressObserver>>) {
        *self.observer.write().unwrap_or_else(PoisonError::into_inner) = observer;
    }

    fn observer(&self) -> Option<Arc<dyn IProgressObserver>> {
        self.observer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the whole progress map and announces every initial state
    pub fn reset(&self, progress: SyncProgress) {
        let initial: Vec<ProgressState> = progress.metrics().values().cloned().collect();
        self.tx.send_replace(progress);
        if let Some(observer) = self.observer() {
            for state in &initial {
                observer.on_progress(state);
            }
        }
    }

    /// Stores `state` for its metric and notifies the observer
    pub fn publish(&self, state: &ProgressState) {
        self.tx.send_modify(|progress| {
            progress.update(state.clone());
        });
        if let Some(observer) = self.observer() {
            observer.on_progress(state);
        }
    }

    pub fn mark_cancelled(&self) {
        self.tx.send_modify(SyncProgress::mark_cancelled);
    }

    /// Forces a non-terminal metric into `Failed`
    ///
    /// Used when the task that owns the metric died without finishing it.
    pub fn fail_unfinished(&self, metric: &MetricType, reason: &str) {
        let current = self.tx.borrow().get(metric).cloned();
        if let Some(mut state) = current {
            if state.fail(reason).is_ok() {
                self.publish(&state);
            }
        }
    }

    /// Consistent copy of the current progress
    pub fn snapshot(&self) -> SyncProgress {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncProgress> {
        self.tx.subscribe()
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("metrics", &self.tx.borrow().metrics().len())
            .field("observer", &self.observer().is_some())
            .finish()
    }
}
