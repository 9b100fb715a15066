//! Integration tests for the watermark endpoint

use vitalsync_core::domain::{Cursor, MetricType};
use vitalsync_remote::{watermark, RemoteError};
use wiremock::{
    matchers::{method, path},
    Mock, ResponseTemplate,
};

use crate::common;

#[tokio::test]
async fn test_fetch_watermarks_parses_cursors() {
    let (server, client) = common::setup_server().await;
    common::mount_watermarks(
        &server,
        serde_json::json!({
            "heart_rate": "2024-03-01T12:00:00Z",
            "steps": "2024-03-01T14:30:00+02:00",
            "weight": null
        }),
    )
    .await;

    let wm = watermark::fetch_watermarks(&client).await.unwrap();

    assert_eq!(wm.len(), 2);
    let steps = wm.get(&MetricType::new("steps").unwrap()).unwrap();
    assert_eq!(*steps, "2024-03-01T12:30:00Z".parse::<Cursor>().unwrap());
    assert!(!wm.contains_key(&MetricType::new("weight").unwrap()));
}

#[tokio::test]
async fn test_fetch_watermarks_empty_map() {
    let (server, client) = common::setup_server().await;
    common::mount_watermarks(&server, serde_json::json!({})).await;

    let wm = watermark::fetch_watermarks(&client).await.unwrap();
    assert!(wm.is_empty());
}

#[tokio::test]
async fn test_fetch_watermarks_undecodable_body() {
    let (server, client) = common::setup_server().await;
    Mock::given(method("GET"))
        .and(path("/sync/watermarks"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = watermark::fetch_watermarks(&client).await.unwrap_err();
    assert!(matches!(err, RemoteError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_fetch_watermarks_bad_timestamp() {
    let (server, client) = common::setup_server().await;
    common::mount_watermarks(&server, serde_json::json!({ "steps": "tomorrow" })).await;

    let err = watermark::fetch_watermarks(&client).await.unwrap_err();
    assert!(matches!(err, RemoteError::InvalidResponse(_)));
}
