//! SQLite sample storage and the `IBatchSource` implementation
//!
//! ## Type Mapping
//!
//! | Domain Type    | SQL Type | Strategy                                    |
//! |----------------|----------|---------------------------------------------|
//! | SampleId       | TEXT     | `.as_str()` / `SampleId::new()`             |
//! | MetricType     | TEXT     | `.as_str()` / `MetricType::new()`           |
//! | f64            | REAL     | direct                                      |
//! | DateTime<Utc>  | TEXT     | fixed-width RFC 3339, nanoseconds, `Z`      |
//!
//! The fixed-width timestamp encoding is what lets `effective_end >= ?`
//! and `ORDER BY effective_end` compare text and still be chronological.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use vitalsync_core::domain::{Cursor, MetricType, Sample, SampleId};
use vitalsync_core::ports::IBatchSource;

use crate::StoreError;

/// Per-metric summary of what the local store holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricStats {
    pub metric_type: MetricType,
    pub count: u64,
    /// Latest effective end time, `None` when the metric has no samples
    pub latest: Option<DateTime<Utc>>,
}

/// SQLite-backed store of samples awaiting sync
///
/// Samples are immutable once written: inserting an id that already exists
/// is a no-op, so re-importing the same file is harmless.
#[derive(Debug, Clone)]
pub struct SqliteSampleStore {
    pool: SqlitePool,
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

fn time_to_sql(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn time_from_sql(column: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::SerializationError(format!("Invalid {column} '{raw}': {e}")))
}

fn metric_from_sql(raw: &str) -> Result<MetricType, StoreError> {
    MetricType::new(raw).map_err(|e| StoreError::SerializationError(e.to_string()))
}

fn sample_from_row(row: &SqliteRow) -> Result<Sample, StoreError> {
    let id: String = row.get("id");
    let metric_type: String = row.get("metric_type");
    let value: f64 = row.get("value");
    let start_time: String = row.get("start_time");
    let end_time: Option<String> = row.get("end_time");

    let id = SampleId::new(id).map_err(|e| StoreError::SerializationError(e.to_string()))?;
    let end_time = end_time
        .as_deref()
        .map(|raw| time_from_sql("end_time", raw))
        .transpose()?;

    Sample::new(
        id,
        metric_from_sql(&metric_type)?,
        value,
        time_from_sql("start_time", &start_time)?,
        end_time,
    )
    .map_err(|e| StoreError::SerializationError(e.to_string()))
}

impl SqliteSampleStore {
    /// Creates a new store over the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts samples in a single transaction, skipping ids already stored
    ///
    /// Returns how many rows were actually written. Every sample is
    /// validated before anything is written; one invalid sample rejects
    /// the whole call.
    pub async fn insert_samples(&self, samples: &[Sample]) -> Result<u64, StoreError> {
        for sample in samples {
            sample
                .validate()
                .map_err(|e| StoreError::InvalidSample(e.to_string()))?;
        }

        let inserted_at = time_to_sql(Utc::now());
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;

        for sample in samples {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO samples \
                 (id, metric_type, value, start_time, end_time, effective_end, inserted_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(sample.id().as_str())
            .bind(sample.metric_type().as_str())
            .bind(sample.value())
            .bind(time_to_sql(sample.start_time()))
            .bind(sample.end_time().map(time_to_sql))
            .bind(time_to_sql(sample.effective_end()))
            .bind(&inserted_at)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;

        tracing::debug!(
            offered = samples.len(),
            inserted,
            "Inserted samples into local store"
        );
        Ok(inserted)
    }

    /// Every metric with at least one stored sample, alphabetically
    pub async fn list_metric_types(&self) -> Result<Vec<MetricType>, StoreError> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT metric_type FROM samples ORDER BY metric_type")
                .fetch_all(&self.pool)
                .await?;

        names.iter().map(|name| metric_from_sql(name)).collect()
    }

    pub async fn metric_stats(&self, metric: &MetricType) -> Result<MetricStats, StoreError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count, MAX(effective_end) AS latest \
             FROM samples WHERE metric_type = ?",
        )
        .bind(metric.as_str())
        .fetch_one(&self.pool)
        .await?;

        let count: i64 = row.get("count");
        let latest: Option<String> = row.get("latest");

        Ok(MetricStats {
            metric_type: metric.clone(),
            count: u64::try_from(count).unwrap_or_default(),
            latest: latest
                .as_deref()
                .map(|raw| time_from_sql("effective_end", raw))
                .transpose()?,
        })
    }

    /// Number of samples ending strictly after `cursor`
    ///
    /// With a server watermark as `cursor` this is what is still pending:
    /// samples ending exactly at the watermark were part of the last upload.
    pub async fn count_after(&self, metric: &MetricType, cursor: &Cursor) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM samples WHERE metric_type = ? AND effective_end > ?",
        )
        .bind(metric.as_str())
        .bind(time_to_sql(cursor.as_datetime()))
        .fetch_one(&self.pool)
        .await?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Up to `limit` samples ending at or after `cursor`, oldest first
    ///
    /// Inclusive so that samples sharing an end time with the last sample
    /// of a full batch are still returned by the next call. Ties on the
    /// effective end time are broken by id so paging is stable.
    pub async fn fetch_from(
        &self,
        metric: &MetricType,
        cursor: &Cursor,
        limit: usize,
    ) -> Result<Vec<Sample>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT id, metric_type, value, start_time, end_time FROM samples \
             WHERE metric_type = ? AND effective_end >= ? \
             ORDER BY effective_end ASC, id ASC LIMIT ?",
        )
        .bind(metric.as_str())
        .bind(time_to_sql(cursor.as_datetime()))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let mut samples = Vec::with_capacity(rows.len());
        for row in &rows {
            samples.push(sample_from_row(row)?);
        }
        Ok(samples)
    }
}

#[async_trait::async_trait]
impl IBatchSource for SqliteSampleStore {
    async fn fetch_batch(
        &self,
        metric: &MetricType,
        cursor: &Cursor,
        limit: usize,
    ) -> anyhow::Result<Vec<Sample>> {
        let samples = self.fetch_from(metric, cursor, limit).await?;
        tracing::trace!(
            metric = %metric,
            cursor = %cursor,
            batch_len = samples.len(),
            "Fetched batch from local store"
        );
        Ok(samples)
    }
}
