//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including validation failures and invalid progress transitions.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid metric type identifier
    #[error("Invalid metric type: {0}")]
    InvalidMetricType(String),

    /// Invalid sample identifier
    #[error("Invalid sample id: {0}")]
    InvalidSampleId(String),

    /// Invalid cursor value (unparseable timestamp)
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    /// Unknown progress phase code
    #[error("Invalid phase code: {0}")]
    InvalidPhaseCode(String),

    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}
