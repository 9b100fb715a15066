//! Integration tests for vitalsync-remote
//!
//! Uses wiremock to simulate the aggregation server and verifies the
//! watermark and batch endpoints, status mapping, and the port adapter.

mod common;

mod test_errors;
mod test_provider;
mod test_upload;
mod test_watermarks;
