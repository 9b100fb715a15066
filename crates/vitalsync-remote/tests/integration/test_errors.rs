//! Integration tests for HTTP status to RemoteError mapping

use std::time::Duration;

use vitalsync_remote::{upload, watermark, RemoteError};
use wiremock::{
    matchers::{method, path},
    Mock, ResponseTemplate,
};

use crate::common;

#[tokio::test]
async fn test_401_is_unauthorized() {
    let (server, client) = common::setup_server().await;
    common::mount_status(&server, "GET", "/sync/watermarks", 401).await;

    let err = watermark::fetch_watermarks(&client).await.unwrap_err();
    assert!(matches!(err, RemoteError::Unauthorized(ref body) if body == "nope"));
}

#[tokio::test]
async fn test_403_is_forbidden() {
    let (server, client) = common::setup_server().await;
    common::mount_status(&server, "POST", "/sync/batch", 403).await;

    let err = upload::upload_batch(&client, &common::samples("hr", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Forbidden(_)));
}

#[tokio::test]
async fn test_unmounted_route_is_not_found() {
    let (_server, client) = common::setup_server().await;

    let err = watermark::fetch_watermarks(&client).await.unwrap_err();
    assert!(matches!(err, RemoteError::NotFound(_)));
}

#[tokio::test]
async fn test_429_carries_retry_after() {
    let (server, client) = common::setup_server().await;
    Mock::given(method("POST"))
        .and(path("/sync/batch"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "12"))
        .mount(&server)
        .await;

    let err = upload::upload_batch(&client, &common::samples("hr", 1))
        .await
        .unwrap_err();
    match err {
        RemoteError::TooManyRequests { retry_after } => {
            assert_eq!(retry_after, Duration::from_secs(12));
        }
        other => panic!("expected TooManyRequests, got {other:?}"),
    }
}

#[tokio::test]
async fn test_503_is_server_error() {
    let (server, client) = common::setup_server().await;
    common::mount_status(&server, "POST", "/sync/batch", 503).await;

    let err = upload::upload_batch(&client, &common::samples("hr", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::ServerError { status: 503, .. }));
}

#[tokio::test]
async fn test_other_status_is_unexpected() {
    let (server, client) = common::setup_server().await;
    common::mount_status(&server, "POST", "/sync/batch", 409).await;

    let err = upload::upload_batch(&client, &common::samples("hr", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::UnexpectedStatus { status: 409, .. }));
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    // nothing listens on port 9 (discard) in the test environment
    let client = vitalsync_remote::client::SyncApiClient::with_base_url("http://127.0.0.1:9");

    let err = watermark::fetch_watermarks(&client).await.unwrap_err();
    assert!(matches!(err, RemoteError::NetworkError(_)));
}
