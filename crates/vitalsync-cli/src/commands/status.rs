//! Status command - Compare the local store with the server
//!
//! For every metric in the local store (plus any configured ones) shows the
//! local sample count, the latest local sample time, the server watermark
//! and how many samples are still pending upload.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use serde_json::json;
use tracing::{info, warn};
use vitalsync_core::domain::{Cursor, MetricType};
use vitalsync_core::ports::{IWatermarkClient, Watermarks};
use vitalsync_remote::provider::HttpSyncRemote;
use vitalsync_store::SqliteSampleStore;

use super::{open_store, CliContext};

#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Skip the server and report local counts only
    #[arg(long)]
    pub offline: bool,
}

/// One row of the status table
#[derive(Debug, Clone, PartialEq)]
struct MetricStatus {
    metric: MetricType,
    local_count: u64,
    latest_local: Option<DateTime<Utc>>,
    watermark: Option<Cursor>,
    /// `None` when the server could not be asked
    pending: Option<u64>,
}

impl StatusCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = &ctx.config;

        if !config.store.database.exists() {
            formatter.error(&format!(
                "No sample store at {}. Run 'vitalsync import <FILE>' first.",
                config.store.database.display()
            ));
            return Ok(());
        }

        let store = open_store(config).await?;

        let watermarks = if self.offline {
            None
        } else {
            let remote = HttpSyncRemote::from_config(&config.remote)?;
            match remote.get_watermarks().await {
                Ok(w) => Some(w),
                Err(e) => {
                    warn!(error = %format!("{e:#}"), "Could not fetch watermarks");
                    formatter.warn(&format!("Server unreachable: {:#}", e));
                    None
                }
            }
        };

        let mut metrics: BTreeSet<MetricType> = store
            .list_metric_types()
            .await
            .context("Failed to list local metrics")?
            .into_iter()
            .collect();
        metrics.extend(
            config
                .sync
                .metric_types()
                .context("Invalid metric in sync.metrics")?,
        );

        let rows = collect_status(&store, metrics, watermarks.as_ref()).await?;

        info!(metrics = rows.len(), online = watermarks.is_some(), "Showing status");

        if ctx.is_json() {
            let metrics: Vec<_> = rows
                .iter()
                .map(|row| {
                    json!({
                        "metricType": row.metric.as_str(),
                        "localCount": row.local_count,
                        "latestLocal": row.latest_local.map(|t| t.to_rfc3339()),
                        "watermark": row.watermark.map(|c| c.to_string()),
                        "pending": row.pending,
                    })
                })
                .collect();
            formatter.print_json(&json!({
                "database": config.store.database.display().to_string(),
                "server": config.remote.base_url,
                "serverReachable": watermarks.is_some(),
                "metrics": metrics,
            }));
            return Ok(());
        }

        if rows.is_empty() {
            formatter.success("Local store is empty");
            return Ok(());
        }

        let total_pending: u64 = rows.iter().filter_map(|r| r.pending).sum();
        if watermarks.is_some() && total_pending == 0 {
            formatter.success("Everything is synced");
        } else if watermarks.is_some() {
            formatter.success(&format!("{} samples pending upload", total_pending));
        } else {
            formatter.success("Local store status");
        }

        formatter.info("");
        formatter.info(&format!(
            "{:<20} {:>10} {:<26} {:<26} {:>8}",
            "METRIC", "LOCAL", "LATEST LOCAL", "SERVER WATERMARK", "PENDING"
        ));
        for row in &rows {
            formatter.info(&format!(
                "{:<20} {:>10} {:<26} {:<26} {:>8}",
                row.metric.as_str(),
                row.local_count,
                row.latest_local
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string()),
                match (&watermarks, row.watermark) {
                    (None, _) => "?".to_string(),
                    (Some(_), None) => "never".to_string(),
                    (Some(_), Some(c)) => c.as_datetime().format("%Y-%m-%d %H:%M:%S").to_string(),
                },
                row.pending
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "?".to_string()),
            ));
        }

        Ok(())
    }
}

/// Builds one [`MetricStatus`] per metric
///
/// A metric missing from the server's watermarks has pending = every local
/// sample, since the server has never seen it.
async fn collect_status(
    store: &SqliteSampleStore,
    metrics: BTreeSet<MetricType>,
    watermarks: Option<&Watermarks>,
) -> Result<Vec<MetricStatus>> {
    let mut rows = Vec::with_capacity(metrics.len());
    for metric in metrics {
        let stats = store
            .metric_stats(&metric)
            .await
            .with_context(|| format!("Failed to read stats for {metric}"))?;
        let watermark = watermarks.and_then(|w| w.get(&metric).copied());
        let pending = match watermarks {
            Some(_) => Some(
                store
                    .count_after(&metric, &watermark.unwrap_or_default())
                    .await
                    .with_context(|| format!("Failed to count pending samples for {metric}"))?,
            ),
            None => None,
        };
        rows.push(MetricStatus {
            metric,
            local_count: stats.count,
            latest_local: stats.latest,
            watermark,
            pending,
        });
    }
    Ok(rows)
}
