//! Domain entities and business logic
//!
//! This module contains the core domain types for VitalSync:
//! - Newtypes for metric identifiers, sample ids, run ids and cursors
//! - Samples and batches produced by the on-device store
//! - Per-metric progress state machine
//! - Run-level progress aggregate and summary
//! - Domain-specific error types

pub mod errors;
pub mod newtypes;
pub mod progress;
pub mod run;
pub mod sample;

// Re-export commonly used types
pub use errors::DomainError;
pub use newtypes::*;
pub use progress::{ProgressPhase, ProgressState};
pub use run::{RunSummary, SyncProgress};
pub use sample::{Batch, Sample};
