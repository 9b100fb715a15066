//! Shared helpers for aggregation server integration tests
//!
//! Provides a wiremock server plus canned endpoint mounts and sample
//! builders.

use chrono::{Duration, TimeZone, Utc};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vitalsync_core::domain::{MetricType, Sample, SampleId};
use vitalsync_remote::client::SyncApiClient;

/// Starts a mock server and returns a client pointing at it
pub async fn setup_server() -> (MockServer, SyncApiClient) {
    let server = MockServer::start().await;
    let client = SyncApiClient::with_base_url(server.uri());
    (server, client)
}

/// Mounts `GET /sync/watermarks` returning `watermarks`
pub async fn mount_watermarks(server: &MockServer, watermarks: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/sync/watermarks"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "watermarks": watermarks })),
        )
        .mount(server)
        .await;
}

/// Mounts `POST /sync/batch` answering with fixed counts
pub async fn mount_batch(server: &MockServer, received: u64, stored: u64) {
    Mock::given(method("POST"))
        .and(path("/sync/batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "received": received,
            "stored": stored
        })))
        .mount(server)
        .await;
}

/// Mounts any path answering with a bare status
pub async fn mount_status(server: &MockServer, http_method: &str, route: &str, status: u16) {
    Mock::given(method(http_method))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
        .mount(server)
        .await;
}

/// `count` one-minute samples of `metric`, starting 2024-01-01T00:00:00Z
pub fn samples(metric: &str, count: usize) -> Vec<Sample> {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..count)
        .map(|i| {
            let start = base + Duration::minutes(i as i64);
            Sample::new(
                SampleId::new(format!("{metric}-{i}")).unwrap(),
                MetricType::new(metric).unwrap(),
                i as f64,
                start,
                Some(start + Duration::seconds(59)),
            )
            .unwrap()
        })
        .collect()
}
