//! Per-metric progress state machine
//!
//! Every metric in a run owns exactly one [`ProgressState`]. It is created
//! in [`ProgressPhase::Waiting`], moves through `Fetching` and `Uploading`,
//! and ends in exactly one terminal phase: `Complete`, `Failed` or
//! `Cancelled`.
//!
//! ```text
//! Waiting ──→ Fetching ⇄ Uploading ──→ Complete
//!    │            │           │
//!    └────────────┴───────────┴──→ Failed | Cancelled
//! ```
//!
//! Phases serialize as the single-character codes the server and UI layer
//! already understand: `W`, `F`, `U`, `C`, `E`, `X`.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{Cursor, MetricType};

/// Phase of one metric's pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ProgressPhase {
    /// Queued, not yet admitted by the worker pool
    Waiting,
    /// Admitted; fetching from the batch source
    Fetching,
    /// Uploading batches, with live counts
    Uploading,
    /// Source exhausted; every fetched batch uploaded
    Complete,
    /// Stopped by a fetch or upload error
    Failed,
    /// Stopped by cancellation
    Cancelled,
}

impl ProgressPhase {
    /// Single-character wire/UI code
    pub const fn code(self) -> char {
        match self {
            ProgressPhase::Waiting => 'W',
            ProgressPhase::Fetching => 'F',
            ProgressPhase::Uploading => 'U',
            ProgressPhase::Complete => 'C',
            ProgressPhase::Failed => 'E',
            ProgressPhase::Cancelled => 'X',
        }
    }

    /// Parses a single-character wire/UI code
    pub fn from_code(code: char) -> Result<Self, DomainError> {
        match code {
            'W' => Ok(ProgressPhase::Waiting),
            'F' => Ok(ProgressPhase::Fetching),
            'U' => Ok(ProgressPhase::Uploading),
            'C' => Ok(ProgressPhase::Complete),
            'E' => Ok(ProgressPhase::Failed),
            'X' => Ok(ProgressPhase::Cancelled),
            other => Err(DomainError::InvalidPhaseCode(other.to_string())),
        }
    }

    /// Returns true for `Complete`, `Failed` and `Cancelled`
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ProgressPhase::Complete | ProgressPhase::Failed | ProgressPhase::Cancelled
        )
    }

    /// Returns true if the state machine allows moving from `self` to `next`
    pub fn can_transition_to(self, next: ProgressPhase) -> bool {
        use ProgressPhase::*;
        match (self, next) {
            (Waiting, Fetching | Failed | Cancelled) => true,
            (Fetching, Uploading | Complete | Failed | Cancelled) => true,
            (Uploading, Uploading | Fetching | Complete | Failed | Cancelled) => true,
            _ => false,
        }
    }
}

impl Display for ProgressPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for ProgressPhase {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(code), None) => Self::from_code(code),
            _ => Err(DomainError::InvalidPhaseCode(s.to_string())),
        }
    }
}

impl TryFrom<String> for ProgressPhase {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ProgressPhase> for String {
    fn from(phase: ProgressPhase) -> Self {
        phase.code().to_string()
    }
}

/// Live progress of one metric within a sync run
///
/// Only the pipeline that owns the metric mutates its state; observers
/// receive copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressState {
    metric_type: MetricType,
    phase: ProgressPhase,
    samples_processed: u64,
    samples_total: Option<u64>,
    cursor: Option<Cursor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ProgressState {
    /// Creates the initial `Waiting` state for a metric
    pub fn waiting(metric_type: MetricType) -> Self {
        Self {
            metric_type,
            phase: ProgressPhase::Waiting,
            samples_processed: 0,
            samples_total: None,
            cursor: None,
            error: None,
        }
    }

    // --- Getters ---

    pub fn metric_type(&self) -> &MetricType {
        &self.metric_type
    }

    pub fn phase(&self) -> ProgressPhase {
        self.phase
    }

    pub fn samples_processed(&self) -> u64 {
        self.samples_processed
    }

    /// Known only once the stream is exhausted
    pub fn samples_total(&self) -> Option<u64> {
        self.samples_total
    }

    pub fn cursor(&self) -> Option<Cursor> {
        self.cursor
    }

    /// Error message for a `Failed` metric
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    // --- Transitions ---

    fn transition(&mut self, next: ProgressPhase) -> Result<(), DomainError> {
        if !self.phase.can_transition_to(next) {
            return Err(DomainError::InvalidState {
                from: self.phase.to_string(),
                to: next.to_string(),
            });
        }
        self.phase = next;
        Ok(())
    }

    /// Pipeline admitted by the pool; reading from `cursor`
    pub fn start_fetching(&mut self, cursor: Cursor) -> Result<(), DomainError> {
        self.transition(ProgressPhase::Fetching)?;
        self.cursor = Some(cursor);
        Ok(())
    }

    /// A non-empty batch was fetched and is about to be uploaded
    pub fn begin_upload(&mut self) -> Result<(), DomainError> {
        self.transition(ProgressPhase::Uploading)?;
        self.samples_total = None;
        Ok(())
    }

    /// A batch was uploaded; `stored` is the server-reported increment
    pub fn record_upload(&mut self, stored: u64, cursor: Cursor) -> Result<(), DomainError> {
        self.transition(ProgressPhase::Uploading)?;
        self.samples_processed += stored;
        self.cursor = Some(match self.cursor {
            Some(current) if current > cursor => current,
            _ => cursor,
        });
        Ok(())
    }

    /// Source exhausted; the total becomes known
    pub fn complete(&mut self) -> Result<(), DomainError> {
        self.transition(ProgressPhase::Complete)?;
        self.samples_total = Some(self.samples_processed);
        Ok(())
    }

    /// Fetch or upload failed; counts are kept as last known
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), DomainError> {
        self.transition(ProgressPhase::Failed)?;
        self.error = Some(reason.into());
        Ok(())
    }

    /// Cancellation observed at a checkpoint
    pub fn cancel(&mut self) -> Result<(), DomainError> {
        self.transition(ProgressPhase::Cancelled)
    }
}

impl Display for ProgressState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.metric_type, self.phase, self.samples_processed
        )?;
        if let Some(total) = self.samples_total {
            write!(f, "/{total}")?;
        }
        if let Some(err) = &self.error {
            write!(f, " ({err})")?;
        }
        Ok(())
    }
}
