//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// UUID-based ID types
// ============================================================================

/// Identifier for a single sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new random RunId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a RunId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Create a nil (all zeros) RunId
    #[must_use]
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RunId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid RunId: {e}")))
    }
}

// ============================================================================
// MetricType
// ============================================================================

/// Opaque identifier naming one time-series stream (e.g. `heart_rate`)
///
/// The only validation performed is that the identifier is non-empty and
/// carries no surrounding whitespace; the catalog of valid metric names
/// belongs to the environment, not to this crate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MetricType(String);

impl MetricType {
    /// Create a new MetricType
    ///
    /// # Errors
    /// Returns error if the identifier is empty or padded with whitespace
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        if name.is_empty() {
            return Err(DomainError::InvalidMetricType(
                "Metric type cannot be empty".to_string(),
            ));
        }
        if name.trim() != name {
            return Err(DomainError::InvalidMetricType(format!(
                "Metric type has surrounding whitespace: '{name}'"
            )));
        }
        Ok(Self(name))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for MetricType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MetricType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for MetricType {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<MetricType> for String {
    fn from(metric: MetricType) -> Self {
        metric.0
    }
}

// ============================================================================
// SampleId
// ============================================================================

/// Identifier of a single sample as assigned by the on-device store
///
/// Opaque and only required to be non-empty. Uniqueness is not enforced
/// here; the server de-duplicates by id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SampleId(String);

impl SampleId {
    /// Create a new SampleId
    ///
    /// # Errors
    /// Returns error if the id is empty
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.is_empty() {
            return Err(DomainError::InvalidSampleId(
                "Sample id cannot be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Generate a random UUID-based sample id
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SampleId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SampleId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SampleId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<SampleId> for String {
    fn from(id: SampleId) -> Self {
        id.0
    }
}

// ============================================================================
// Cursor
// ============================================================================

/// "Synced up to" position of one metric stream
///
/// A cursor is a UTC timestamp. The server-held watermark is the durable
/// form; inside a run the pipeline keeps a local copy that only moves
/// forward. [`Cursor::beginning`] is the sentinel used when the server
/// reports no watermark for a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(DateTime<Utc>);

impl Cursor {
    /// The "beginning of time" sentinel (Unix epoch)
    #[must_use]
    pub const fn beginning() -> Self {
        Self(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Wrap an existing timestamp
    #[must_use]
    pub const fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// Returns the wrapped timestamp
    #[must_use]
    pub const fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Returns true if this is the beginning-of-time sentinel
    #[must_use]
    pub fn is_beginning(&self) -> bool {
        *self == Self::beginning()
    }

    /// Moves the cursor forward to `candidate`
    ///
    /// The cursor never moves backwards: if `candidate` is older than the
    /// current position the cursor is left untouched. Returns `true` if the
    /// position changed.
    pub fn advance_to(&mut self, candidate: DateTime<Utc>) -> bool {
        if candidate > self.0 {
            self.0 = candidate;
            true
        } else {
            false
        }
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::beginning()
    }
}

impl Display for Cursor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl FromStr for Cursor {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DateTime::parse_from_rfc3339(s.trim())
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|e| DomainError::InvalidCursor(format!("'{s}': {e}")))
    }
}

impl From<DateTime<Utc>> for Cursor {
    fn from(at: DateTime<Utc>) -> Self {
        Self(at)
    }
}
