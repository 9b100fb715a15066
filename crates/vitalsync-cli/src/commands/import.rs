//! Import command - Load samples into the local store
//!
//! Accepts either a JSON array of samples or newline-delimited JSON (one
//! sample object per line). Samples use the same camelCase shape the
//! server receives:
//!
//! ```json
//! {"id": "hr-1", "metricType": "heart_rate", "value": 62.0,
//!  "startTime": "2024-01-01T00:00:00Z", "endTime": "2024-01-01T00:00:05Z"}
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;
use vitalsync_core::domain::Sample;

use super::{open_store, CliContext};
use crate::output::plural;

#[derive(Debug, Args)]
pub struct ImportCommand {
    /// JSON array or NDJSON file of samples
    pub file: PathBuf,
}

impl ImportCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();

        let text = tokio::fs::read_to_string(&self.file)
            .await
            .with_context(|| format!("Failed to read {}", self.file.display()))?;
        let samples = parse_samples(&text)
            .with_context(|| format!("Failed to parse {}", self.file.display()))?;

        let store = open_store(&ctx.config).await?;
        let inserted = store
            .insert_samples(&samples)
            .await
            .context("Failed to write samples")?;
        let skipped = samples.len() as u64 - inserted;

        info!(
            file = %self.file.display(),
            read = samples.len(),
            inserted,
            skipped,
            "Import finished"
        );

        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "file": self.file.display().to_string(),
                "read": samples.len(),
                "inserted": inserted,
                "skipped": skipped,
            }));
        } else {
            formatter.success(&format!(
                "Imported {} sample{} from {}",
                inserted,
                plural(inserted),
                self.file.display()
            ));
            if skipped > 0 {
                formatter.info(&format!("Skipped {} already stored", skipped));
            }
        }

        Ok(())
    }
}

/// Parses a JSON array or NDJSON document into validated samples
///
/// Blank NDJSON lines are ignored. Errors name the offending line (NDJSON)
/// or array index.
fn parse_samples(text: &str) -> Result<Vec<Sample>> {
    let samples = if text.trim_start().starts_with('[') {
        serde_json::from_str::<Vec<Sample>>(text).context("Invalid JSON array of samples")?
    } else {
        let mut samples = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let sample: Sample = serde_json::from_str(line)
                .with_context(|| format!("Invalid sample on line {}", index + 1))?;
            samples.push(sample);
        }
        samples
    };

    for (index, sample) in samples.iter().enumerate() {
        sample
            .validate()
            .with_context(|| format!("Sample #{} is invalid", index + 1))?;
    }

    Ok(samples)
}
