//! VitalSync Sync - Incremental sync engine
//!
//! Drives one fetch→upload pipeline per metric under a global concurrency
//! cap, publishes per-metric progress, and supports cooperative
//! cancellation.
//!
//! ## Modules
//!
//! - [`pool`] - Bounded FIFO worker pool gating pipeline admission
//! - [`progress`] - Single-writer progress publication (watch channel + observer)
//! - [`pipeline`] - Per-metric fetch→upload loop
//! - [`orchestrator`] - Run lifecycle: start, cancel, wait, dismiss

pub mod orchestrator;
pub mod pipeline;
pub mod pool;
pub mod progress;

pub use orchestrator::{SyncOptions, SyncOrchestrator};
pub use pool::{WorkerPool, WorkerSlot};

use thiserror::Error;

/// Errors that can cross the sync engine boundary
///
/// Per-metric fetch and upload failures never appear here; they are
/// recorded on the metric's progress state instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// `start` or `dismiss` called while a run is still active
    #[error("A sync run is already active")]
    RunAlreadyActive,

    /// `wait` called with no current or finished run
    #[error("No sync run to wait for")]
    NoActiveRun,

    /// The worker pool was closed while a pipeline was waiting for a slot
    #[error("Worker pool closed")]
    PoolClosed,

    /// A domain-level error propagated from vitalsync-core
    #[error("Domain error: {0}")]
    DomainError(#[from] vitalsync_core::domain::DomainError),
}
