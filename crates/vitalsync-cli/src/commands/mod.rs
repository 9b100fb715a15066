//! Subcommand implementations
//!
//! Every command receives a [`CliContext`] carrying the global flags and
//! the configuration loaded from `--config` (or the default path).

pub mod completions;
pub mod config;
pub mod import;
pub mod status;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};
use vitalsync_core::config::Config;
use vitalsync_store::{DatabasePool, SqliteSampleStore};

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Global flags and configuration shared by every command
#[derive(Debug, Clone)]
pub struct CliContext {
    pub format: OutputFormat,
    pub quiet: bool,
    pub config_path: PathBuf,
    pub config: Config,
}

impl CliContext {
    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.format, self.quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }
}

/// Opens (creating if needed) the sample store named by `config.store.database`
pub async fn open_store(config: &Config) -> Result<SqliteSampleStore> {
    let pool = DatabasePool::new(&config.store.database)
        .await
        .with_context(|| {
            format!(
                "Failed to open sample store {}",
                config.store.database.display()
            )
        })?;
    Ok(SqliteSampleStore::new(pool.pool().clone()))
}
