use common_http_errors::{ApiError, CONFIGURATION_MESSAGE, INTERNAL_MESSAGE};
use axum::body::to_bytes;
use axum::response::IntoResponse;
use axum::http::StatusCode;
use uuid::Uuid;

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(resp.into_body(), 4096).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn bad_request_variant() {
    let resp = ApiError::invalid_json().into_response();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "invalid_json");
    let body = body_json(resp).await;
    assert_eq!(body["code"], "invalid_json");
    assert_eq!(body["message"], "Invalid JSON in request body");
}

#[test]
fn unauthorized_variant() {
    let resp = ApiError::unauthorized("invalid_api_key").into_response();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "invalid_api_key");
}

#[tokio::test]
async fn configuration_variant_is_generic() {
    let resp = ApiError::configuration().into_response();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "server_configuration");
    let body = body_json(resp).await;
    assert_eq!(body["message"], CONFIGURATION_MESSAGE);
}

#[tokio::test]
async fn internal_variant_carries_trace_only() {
    let trace = Uuid::new_v4();
    let resp = ApiError::Internal { trace_id: Some(trace) }.into_response();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "internal_error");
    let body = body_json(resp).await;
    assert_eq!(body["message"], INTERNAL_MESSAGE);
    assert_eq!(body["trace_id"], trace.to_string());
}
