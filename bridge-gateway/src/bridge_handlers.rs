use axum::extract::State;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use common_http_errors::ApiError;
use tracing::{error, warn};

use crate::forwarder::{BridgeEndpoint, BridgeError};
use crate::AppState;

pub async fn generate_image(State(state): State<AppState>, body: Bytes) -> Response {
    forward(&state, BridgeEndpoint::GenerateImage, &body).await
}

pub async fn generate_contract(State(state): State<AppState>, body: Bytes) -> Response {
    forward(&state, BridgeEndpoint::GenerateContract, &body).await
}

pub async fn create_transaction(State(state): State<AppState>, body: Bytes) -> Response {
    forward(&state, BridgeEndpoint::CreateTransaction, &body).await
}

async fn forward(state: &AppState, endpoint: BridgeEndpoint, body: &[u8]) -> Response {
    match state.bridge.forward(endpoint, body).await {
        Ok(response) => {
            state.metrics.record_relayed(endpoint.slug(), response.status());
            response
        }
        Err(err) => {
            state.metrics.record_bridge(endpoint.slug(), err.outcome());
            log_failure(endpoint, &err);
            ApiError::from(err).into_response()
        }
    }
}

fn log_failure(endpoint: BridgeEndpoint, err: &BridgeError) {
    match err {
        BridgeError::InvalidJson(detail) => {
            warn!(endpoint = endpoint.slug(), detail = %detail, "rejected bridge request with malformed JSON");
        }
        other => {
            error!(endpoint = endpoint.slug(), error = %other, "bridge request failed");
        }
    }
}
