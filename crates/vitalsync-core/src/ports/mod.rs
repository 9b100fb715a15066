//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the traits the sync engine depends on; their implementations
//! live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IWatermarkClient`] - Server-held "synced up to" cursor per metric
//! - [`IBatchSource`] - On-device store yielding ordered sample batches
//! - [`IBatchUploader`] - Remote endpoint accepting sample batches
//! - [`IProgressObserver`] - Receives every per-metric progress transition

pub mod batch_source;
pub mod batch_uploader;
pub mod progress_observer;
pub mod watermark_client;

pub use batch_source::IBatchSource;
pub use batch_uploader::{IBatchUploader, UploadReceipt};
pub use progress_observer::IProgressObserver;
pub use watermark_client::{IWatermarkClient, Watermarks};
