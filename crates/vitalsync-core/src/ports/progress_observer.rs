//! Progress observer port (driving side callback)
//!
//! Receives every [`ProgressState`] transition in order, per metric.
//! Calls come from pipeline tasks, so implementations must be cheap and
//! must not block; hand the state off to a channel if real work is needed.

use crate::domain::progress::ProgressState;

/// Port trait for observing per-metric progress transitions
pub trait IProgressObserver: Send + Sync {
    /// Called after each transition with the new state
    fn on_progress(&self, state: &ProgressState);
}
