//! VitalSync Core - Domain types and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Sample`, `ProgressState`, `SyncProgress`, `RunSummary`
//! - **Port definitions** - Traits for adapters: `IWatermarkClient`, `IBatchSource`,
//!   `IBatchUploader`, `IProgressObserver`
//! - **State machine** - Per-metric sync phases (`W`/`F`/`U`/`C`/`E`/`X`)
//! - **Configuration** - YAML-backed settings shared by every binary
//!
//! # Architecture
//!
//! The domain module contains pure data and invariants with no I/O.
//! Ports define trait interfaces that adapter crates implement; the sync
//! engine in `vitalsync-sync` drives them.

pub mod config;
pub mod domain;
pub mod ports;
