//! Sync command - Upload pending samples to the aggregation server
//!
//! Provides the `vitalsync sync` CLI command which:
//! 1. Applies command-line overrides on top of the loaded configuration
//! 2. Opens the local sample store and picks the metrics to sync
//! 3. Wires the store and the HTTP adapter into a `SyncOrchestrator`
//! 4. Streams progress lines until the run ends or Ctrl-C cancels it
//! 5. Prints a summary and fails if any metric failed

use std::future::Future;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::{info, warn};
use vitalsync_core::config::{Config, ConfigBuilder};
use vitalsync_core::domain::{MetricType, ProgressPhase, ProgressState, RunSummary};
use vitalsync_core::ports::IProgressObserver;
use vitalsync_remote::provider::HttpSyncRemote;
use vitalsync_store::SqliteSampleStore;
use vitalsync_sync::{SyncOptions, SyncOrchestrator};

use super::{open_store, CliContext};
use crate::output::{format_duration_ms, plural};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Metric to sync (repeatable); defaults to sync.metrics, then every local metric
    #[arg(long = "metric", value_name = "METRIC")]
    pub metrics: Vec<String>,

    /// Override sync.pool_capacity
    #[arg(long, value_name = "N")]
    pub pool: Option<usize>,

    /// Override sync.batch_size
    #[arg(long, value_name = "N")]
    pub batch_size: Option<usize>,

    /// Override remote.base_url
    #[arg(long, value_name = "URL")]
    pub server: Option<String>,
}

/// Prints one line per progress transition
struct ProgressPrinter;

impl IProgressObserver for ProgressPrinter {
    fn on_progress(&self, state: &ProgressState) {
        println!("  {}", state);
    }
}

impl SyncCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = self.effective_config(&ctx.config)?;

        let store = open_store(&config).await?;
        let metrics = self.select_metrics(&config, &store).await?;
        if metrics.is_empty() {
            formatter.success("Nothing to sync: the local store is empty");
            return Ok(());
        }

        let remote = Arc::new(HttpSyncRemote::from_config(&config.remote)?);
        let mut orchestrator = SyncOrchestrator::new(
            remote.clone(),
            Arc::new(store),
            remote,
            SyncOptions::from(&config.sync),
        );
        if !ctx.is_json() && !ctx.quiet {
            orchestrator = orchestrator.with_observer(Arc::new(ProgressPrinter));
        }

        formatter.info(&format!(
            "Syncing {} metric{} to {}",
            metrics.len(),
            plural(metrics.len() as u64),
            config.remote.base_url
        ));

        let summary = run_until_done(&orchestrator, metrics, shutdown_signal()).await?;
        let progress = orchestrator.progress_snapshot();

        if ctx.is_json() {
            let states: Vec<&ProgressState> = progress.metrics().values().collect();
            let mut json = serde_json::to_value(&summary).context("Failed to serialize summary")?;
            json["metrics"] = serde_json::to_value(states).context("Failed to serialize progress")?;
            formatter.print_json(&json);
        } else {
            let duration = format_duration_ms(summary.duration_ms);
            if summary.is_success() && summary.samples_processed == 0 {
                formatter.success("Already up to date");
            } else if summary.is_success() {
                formatter.success(&format!(
                    "Uploaded {} sample{} in {}",
                    summary.samples_processed,
                    plural(summary.samples_processed),
                    duration
                ));
            } else {
                formatter.warn(&format!(
                    "Sync finished in {}: {} complete, {} failed, {} cancelled",
                    duration, summary.complete, summary.failed, summary.cancelled
                ));
            }
            for state in progress.metrics().values() {
                if state.phase() == ProgressPhase::Failed {
                    formatter.error(&format!(
                        "{}: {}",
                        state.metric_type(),
                        state.error().unwrap_or("unknown error")
                    ));
                }
            }
        }

        if summary.failed > 0 {
            bail!(
                "{} metric{} failed to sync",
                summary.failed,
                plural(summary.failed as u64)
            );
        }
        Ok(())
    }

    /// The loaded configuration with command-line overrides, validated
    fn effective_config(&self, base: &Config) -> Result<Config> {
        let mut builder = ConfigBuilder::from_config(base.clone());
        if let Some(pool) = self.pool {
            builder = builder.sync_pool_capacity(pool);
        }
        if let Some(size) = self.batch_size {
            builder = builder.sync_batch_size(size);
        }
        if let Some(server) = &self.server {
            builder = builder.remote_base_url(server.clone());
        }
        if !self.metrics.is_empty() {
            builder = builder.sync_metrics(self.metrics.iter().cloned());
        }

        builder.build_validated().map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            anyhow::anyhow!("Invalid configuration: {}", messages.join("; "))
        })
    }

    /// `--metric` flags (already folded into `sync.metrics`), else every
    /// metric in the local store
    async fn select_metrics(
        &self,
        config: &Config,
        store: &SqliteSampleStore,
    ) -> Result<Vec<MetricType>> {
        let configured = config
            .sync
            .metric_types()
            .context("Invalid metric in sync.metrics")?;
        if !configured.is_empty() {
            return Ok(configured);
        }
        store
            .list_metric_types()
            .await
            .context("Failed to list local metrics")
    }
}

/// Starts a run and waits for it, cancelling when `interrupt` resolves first
async fn run_until_done(
    orchestrator: &SyncOrchestrator,
    metrics: Vec<MetricType>,
    interrupt: impl Future<Output = ()>,
) -> Result<RunSummary> {
    let run_id = orchestrator.start(metrics)?;
    info!(%run_id, "Waiting for sync run");

    tokio::select! {
        summary = orchestrator.wait() => Ok(summary?),
        _ = interrupt => {
            warn!(%run_id, "Interrupted, cancelling sync run");
            eprintln!("Cancelling, waiting for in-flight uploads to finish...");
            orchestrator.cancel();
            Ok(orchestrator.wait().await?)
        }
    }
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
