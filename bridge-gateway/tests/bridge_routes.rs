mod common;

use axum::http::StatusCode;
use bridge_gateway::BridgeEndpoint;
use common::{harness, json_body, post_json, send};
use httpmock::prelude::*;
use serde_json::json;

#[tokio::test]
async fn missing_secret_fails_without_outbound_call() {
    let server = MockServer::start_async().await;
    let mock = server.mock_async(|when, then| {
        when.method(POST);
        then.status(200).json_body(json!({ "ok": true }));
    }).await;
    let base = server.base_url();
    let h = harness(&[("INTERNAL_API_BASE_URL", base.as_str())]);

    for endpoint in BridgeEndpoint::ALL {
        let (status, headers, body) = send(&h.app, post_json(&endpoint.public_path(), r#"{"prompt":"x"}"#, None)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{}", endpoint.slug());
        assert_eq!(headers.get("X-Error-Code").unwrap(), "server_configuration");
        assert_eq!(json_body(&body)["message"], "Server configuration error");
    }
    assert_eq!(mock.hits_async().await, 0);
}

#[tokio::test]
async fn placeholder_secret_counts_as_missing() {
    let server = MockServer::start_async().await;
    let mock = server.mock_async(|when, then| {
        when.method(POST);
        then.status(200).json_body(json!({}));
    }).await;
    let base = server.base_url();
    let h = harness(&[("INTERNAL_API_BASE_URL", base.as_str()), ("INTERNAL_API_KEY", "your-internal-api-key")]);

    let (status, _, body) = send(&h.app, post_json("/api/bridge/generate-image", r#"{"prompt":"x"}"#, None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!String::from_utf8_lossy(&body).contains("your-internal-api-key"));
    assert_eq!(mock.hits_async().await, 0);
}

#[tokio::test]
async fn forwards_with_bearer_and_relays_success() {
    let server = MockServer::start_async().await;
    let mock = server.mock_async(|when, then| {
        when.method(POST)
            .path("/api/internal/generate-contract")
            .header("authorization", "Bearer k-bridge-1")
            .json_body(json!({ "description": "simple escrow" }));
        then.status(200).json_body(json!({ "contract": "pragma solidity ^0.8.0;" }));
    }).await;
    let base = server.base_url();
    let h = harness(&[("INTERNAL_API_BASE_URL", base.as_str()), ("INTERNAL_API_KEY", "k-bridge-1")]);

    let (status, _, body) = send(
        &h.app,
        post_json("/api/bridge/generate-contract", r#"{"description":"simple escrow"}"#, None),
    )
    .await;
    mock.assert_async().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["contract"], "pragma solidity ^0.8.0;");
}

#[tokio::test]
async fn downstream_failure_status_and_body_are_relayed() {
    let server = MockServer::start_async().await;
    server.mock_async(|when, then| {
        when.method(POST).path("/api/internal/create-transaction");
        then.status(502).header("content-type", "application/json").body(r#"{"error":"chain node unavailable"}"#);
    }).await;
    let base = server.base_url();
    let h = harness(&[("INTERNAL_API_BASE_URL", base.as_str()), ("INTERNAL_API_KEY", "k-bridge-1")]);

    let (status, headers, body) = send(
        &h.app,
        post_json("/api/bridge/create-transaction", r#"{"toAddress":"0xabc","amount":1}"#, None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(headers.get("content-type").unwrap(), "application/json");
    assert_eq!(&body[..], br#"{"error":"chain node unavailable"}"#);
}

#[tokio::test]
async fn malformed_json_is_rejected_locally() {
    let server = MockServer::start_async().await;
    let mock = server.mock_async(|when, then| {
        when.method(POST);
        then.status(200).json_body(json!({}));
    }).await;
    let base = server.base_url();
    let h = harness(&[("INTERNAL_API_BASE_URL", base.as_str()), ("INTERNAL_API_KEY", "k-bridge-1")]);

    let (status, headers, body) = send(&h.app, post_json("/api/bridge/generate-image", "{prompt:", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(headers.get("X-Error-Code").unwrap(), "invalid_json");
    assert_eq!(json_body(&body)["message"], "Invalid JSON in request body");
    assert_eq!(mock.hits_async().await, 0);
}

#[tokio::test]
async fn unreachable_internal_api_is_a_generic_500() {
    let h = harness(&[("INTERNAL_API_BASE_URL", "http://127.0.0.1:9"), ("INTERNAL_API_KEY", "k-bridge-1")]);

    let (status, headers, body) = send(&h.app, post_json("/api/bridge/generate-image", r#"{"prompt":"x"}"#, None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(headers.get("X-Error-Code").unwrap(), "internal_error");
    let text = String::from_utf8_lossy(&body);
    assert!(!text.contains("127.0.0.1"));
    assert!(!text.contains("k-bridge-1"));
}
