//! Key-protected internal routes. Each validates its payload and relays it
//! to the generation service.

use axum::extract::State;
use axum::response::Response;
use bytes::Bytes;
use common_http_errors::ApiError;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, warn};

use crate::forwarder::{relay_json, BridgeEndpoint, BridgeError};
use crate::AppState;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("request body must be a JSON object")]
    NotAnObject,
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("amount must be a positive number")]
    InvalidAmount,
}

impl ValidationError {
    fn code(&self) -> &'static str {
        match self {
            ValidationError::NotAnObject => "invalid_body",
            ValidationError::MissingField(_) => "missing_field",
            ValidationError::InvalidAmount => "invalid_amount",
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::bad_request(err.code(), err.to_string())
    }
}

pub fn validate(endpoint: BridgeEndpoint, payload: &Value) -> Result<(), ValidationError> {
    let body = payload.as_object().ok_or(ValidationError::NotAnObject)?;
    let require_text = |field: &'static str| {
        body.get(field)
            .and_then(Value::as_str)
            .filter(|text| !text.trim().is_empty())
            .map(|_| ())
            .ok_or(ValidationError::MissingField(field))
    };

    match endpoint {
        BridgeEndpoint::GenerateImage => require_text("prompt"),
        BridgeEndpoint::GenerateContract => require_text("description"),
        BridgeEndpoint::CreateTransaction => {
            require_text("toAddress")?;
            let amount = body.get("amount").ok_or(ValidationError::MissingField("amount"))?;
            let parsed = amount
                .as_f64()
                .or_else(|| amount.as_str().and_then(|raw| raw.trim().parse::<f64>().ok()));
            match parsed {
                Some(value) if value.is_finite() && value > 0.0 => Ok(()),
                _ => Err(ValidationError::InvalidAmount),
            }
        }
    }
}

pub async fn generate_image(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    relay_to_generation(&state, BridgeEndpoint::GenerateImage, &body).await
}

pub async fn generate_contract(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    relay_to_generation(&state, BridgeEndpoint::GenerateContract, &body).await
}

pub async fn create_transaction(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    relay_to_generation(&state, BridgeEndpoint::CreateTransaction, &body).await
}

async fn relay_to_generation(state: &AppState, endpoint: BridgeEndpoint, body: &[u8]) -> Result<Response, ApiError> {
    let payload: Value = serde_json::from_slice(body).map_err(|err| {
        warn!(endpoint = endpoint.slug(), error = %err, "internal request with malformed JSON");
        ApiError::invalid_json()
    })?;
    validate(endpoint, &payload).map_err(|err| {
        warn!(endpoint = endpoint.slug(), error = %err, "internal request failed validation");
        ApiError::from(err)
    })?;

    let Some(base) = state.config.generation_service_url.as_deref() else {
        let err = BridgeError::NotConfigured("GENERATION_SERVICE_URL");
        error!(endpoint = endpoint.slug(), error = %err, "cannot relay internal request");
        return Err(err.into());
    };
    let url = format!("{base}/{}", endpoint.slug());
    let token = state.config.generation_service_token.as_deref();

    match relay_json(&state.http_client, &url, token, &payload).await {
        Ok(response) => {
            state.metrics.record_relayed(endpoint.internal_path().as_str(), response.status());
            Ok(response)
        }
        Err(err) => {
            state.metrics.record_bridge(endpoint.internal_path().as_str(), err.outcome());
            error!(endpoint = endpoint.slug(), error = %err, "generation service relay failed");
            Err(err.into())
        }
    }
}
