//! Server-side forwarding of browser calls to the key-protected internal API.
//!
//! The browser never sees `INTERNAL_API_KEY`; the bridge attaches it as a
//! bearer token and relays whatever the internal route answers.

use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::Json;
use common_http_errors::ApiError;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::secret::SharedSecret;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeEndpoint {
    GenerateImage,
    GenerateContract,
    CreateTransaction,
}

impl BridgeEndpoint {
    pub const ALL: [BridgeEndpoint; 3] = [
        BridgeEndpoint::GenerateImage,
        BridgeEndpoint::GenerateContract,
        BridgeEndpoint::CreateTransaction,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            BridgeEndpoint::GenerateImage => "generate-image",
            BridgeEndpoint::GenerateContract => "generate-contract",
            BridgeEndpoint::CreateTransaction => "create-transaction",
        }
    }

    pub fn public_path(&self) -> String {
        format!("/api/bridge/{}", self.slug())
    }

    pub fn internal_path(&self) -> String {
        format!("/api/internal/{}", self.slug())
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("INTERNAL_API_KEY is not configured")]
    SecretNotConfigured,
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("request body is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unreadable response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },
}

impl BridgeError {
    /// Label for the outcome metric.
    pub fn outcome(&self) -> &'static str {
        match self {
            BridgeError::SecretNotConfigured | BridgeError::NotConfigured(_) => "not_configured",
            BridgeError::InvalidJson(_) => "invalid_json",
            BridgeError::Transport { .. } => "transport_error",
            BridgeError::InvalidResponse { .. } => "invalid_response",
        }
    }
}

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::SecretNotConfigured | BridgeError::NotConfigured(_) => ApiError::configuration(),
            BridgeError::InvalidJson(_) => ApiError::invalid_json(),
            BridgeError::Transport { .. } | BridgeError::InvalidResponse { .. } => ApiError::internal(),
        }
    }
}

/// POST `body` to `url` and turn the answer into a response for our caller.
/// Non-success answers are relayed as-is (status, body, content type);
/// success answers must be JSON.
pub async fn relay_json(client: &Client, url: &str, bearer: Option<&str>, body: &Value) -> Result<Response, BridgeError> {
    let mut request = client.post(url).json(body);
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }
    let upstream = request.send().await.map_err(|source| BridgeError::Transport {
        url: url.to_string(),
        source,
    })?;

    let status = upstream.status();
    if !status.is_success() {
        let content_type = upstream.headers().get(CONTENT_TYPE).cloned();
        let raw = upstream.bytes().await.map_err(|source| BridgeError::Transport {
            url: url.to_string(),
            source,
        })?;
        debug!(url, status = status.as_u16(), "relaying upstream failure");
        let mut response = (status, raw).into_response();
        match content_type {
            Some(value) => {
                response.headers_mut().insert(CONTENT_TYPE, value);
            }
            None => {
                response.headers_mut().remove(CONTENT_TYPE);
            }
        }
        return Ok(response);
    }

    let payload: Value = upstream.json().await.map_err(|err| BridgeError::InvalidResponse {
        url: url.to_string(),
        reason: err.to_string(),
    })?;
    Ok((status, Json(payload)).into_response())
}

pub struct SecretBridge {
    client: Client,
    base_url: String,
    secret: Option<SharedSecret>,
}

impl SecretBridge {
    pub fn new(client: Client, base_url: impl Into<String>, secret: Option<SharedSecret>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url, secret }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    pub fn target_url(&self, endpoint: BridgeEndpoint) -> String {
        format!("{}{}", self.base_url, endpoint.internal_path())
    }

    /// The key check happens before the body is even parsed, so a
    /// misconfigured bridge never talks to anyone.
    pub async fn forward(&self, endpoint: BridgeEndpoint, body: &[u8]) -> Result<Response, BridgeError> {
        let secret = self.secret.as_ref().ok_or(BridgeError::SecretNotConfigured)?;
        let payload: Value =
            serde_json::from_slice(body).map_err(|err| BridgeError::InvalidJson(err.to_string()))?;
        let url = self.target_url(endpoint);
        debug!(endpoint = endpoint.slug(), key = %secret.fingerprint(), "forwarding bridge request");
        relay_json(&self.client, &url, Some(secret.expose()), &payload).await
    }
}
