//! Integration tests for the batch upload endpoint

use vitalsync_remote::{upload, RemoteError};
use wiremock::{
    matchers::{body_partial_json, method, path},
    Mock, ResponseTemplate,
};

use crate::common;

#[tokio::test]
async fn test_upload_batch_returns_receipt() {
    let (server, client) = common::setup_server().await;
    Mock::given(method("POST"))
        .and(path("/sync/batch"))
        .and(body_partial_json(serde_json::json!({
            "metricType": "steps",
            "samples": [
                { "id": "steps-0", "metricType": "steps", "value": 0.0,
                  "startTime": "2024-01-01T00:00:00Z", "endTime": "2024-01-01T00:00:59Z" },
                { "id": "steps-1", "metricType": "steps", "value": 1.0,
                  "startTime": "2024-01-01T00:01:00Z", "endTime": "2024-01-01T00:01:59Z" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "received": 2,
            "stored": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let receipt = upload::upload_batch(&client, &common::samples("steps", 2))
        .await
        .unwrap();

    assert_eq!(receipt.received, 2);
    assert_eq!(receipt.stored, 2);
}

#[tokio::test]
async fn test_upload_batch_reports_deduplicated_count() {
    let (server, client) = common::setup_server().await;
    common::mount_batch(&server, 5, 3).await;

    let receipt = upload::upload_batch(&client, &common::samples("hr", 5))
        .await
        .unwrap();

    assert_eq!(receipt.received, 5);
    assert_eq!(receipt.stored, 3);
}

#[tokio::test]
async fn test_upload_empty_batch_skips_request() {
    let (server, client) = common::setup_server().await;
    Mock::given(method("POST"))
        .and(path("/sync/batch"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let receipt = upload::upload_batch(&client, &[]).await.unwrap();
    assert_eq!(receipt.received, 0);
    assert_eq!(receipt.stored, 0);
}

#[tokio::test]
async fn test_upload_rejects_inconsistent_receipt() {
    let (server, client) = common::setup_server().await;
    common::mount_batch(&server, 1, 4).await;

    let err = upload::upload_batch(&client, &common::samples("hr", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_upload_missing_fields_is_invalid_response() {
    let (server, client) = common::setup_server().await;
    Mock::given(method("POST"))
        .and(path("/sync/batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true
        })))
        .mount(&server)
        .await;

    let err = upload::upload_batch(&client, &common::samples("hr", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::InvalidResponse(_)));
}
