//! Integration tests for HttpSyncRemote (port adapter)

use vitalsync_core::config::RemoteConfig;
use vitalsync_core::domain::MetricType;
use vitalsync_core::ports::{IBatchUploader, IWatermarkClient};
use vitalsync_remote::{client::SyncApiClient, provider::HttpSyncRemote, RemoteError};

use crate::common;

#[tokio::test]
async fn test_provider_get_watermarks() {
    let (server, client) = common::setup_server().await;
    common::mount_watermarks(&server, serde_json::json!({ "steps": "2024-01-01T00:00:00Z" }))
        .await;

    let remote = HttpSyncRemote::new(client);
    let wm = remote.get_watermarks().await.unwrap();
    assert!(wm.contains_key(&MetricType::new("steps").unwrap()));
}

#[tokio::test]
async fn test_provider_upload_batch() {
    let (server, client) = common::setup_server().await;
    common::mount_batch(&server, 3, 3).await;

    let remote = HttpSyncRemote::new(client);
    let receipt = remote
        .upload_batch(&common::samples("steps", 3))
        .await
        .unwrap();
    assert_eq!(receipt.stored, 3);
}

#[tokio::test]
async fn test_provider_errors_downcast_to_remote_error() {
    let (server, client) = common::setup_server().await;
    common::mount_status(&server, "POST", "/sync/batch", 500).await;

    let remote = HttpSyncRemote::new(client);
    let err = remote
        .upload_batch(&common::samples("steps", 1))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("/sync/batch"));
    assert!(matches!(
        err.downcast_ref::<RemoteError>(),
        Some(RemoteError::ServerError { status: 500, .. })
    ));
}

#[tokio::test]
async fn test_provider_from_config() {
    let (server, _client) = common::setup_server().await;
    common::mount_watermarks(&server, serde_json::json!({})).await;

    let config = RemoteConfig {
        base_url: format!("{}/", server.uri()),
        timeout_secs: 5,
    };
    let remote = HttpSyncRemote::from_config(&config).unwrap();
    assert_eq!(remote.client().base_url(), server.uri());
    assert!(remote.get_watermarks().await.unwrap().is_empty());
}

#[test]
fn test_client_builds_with_timeout() {
    let client = SyncApiClient::new("https://example.com", std::time::Duration::from_secs(1));
    assert!(client.is_ok());
}
