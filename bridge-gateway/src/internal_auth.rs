use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use common_auth::parse_bearer;
use common_http_errors::ApiError;
use tracing::{error, warn};

use crate::AppState;

/// Gate for `/api/internal/*`: the caller must present `INTERNAL_API_KEY`
/// as a bearer token.
pub async fn require_internal_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.config.internal_api_key.as_ref() else {
        state.metrics.record_internal_auth("not_configured");
        error!(path = %request.uri().path(), "INTERNAL_API_KEY is not configured; refusing internal request");
        return Err(ApiError::configuration());
    };

    let provided = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| parse_bearer(value).ok());
    match provided {
        Some(token) if expected.matches(&token) => {
            state.metrics.record_internal_auth("allowed");
            Ok(next.run(request).await)
        }
        Some(_) => {
            state.metrics.record_internal_auth("rejected");
            warn!(path = %request.uri().path(), "internal request with wrong key");
            Err(ApiError::unauthorized("invalid_internal_key"))
        }
        None => {
            state.metrics.record_internal_auth("missing");
            warn!(path = %request.uri().path(), "internal request without bearer key");
            Err(ApiError::unauthorized("missing_internal_key"))
        }
    }
}
