use axum::{http::{StatusCode, HeaderValue}, response::{IntoResponse, Response}, Json};
use serde::Serialize;
use uuid::Uuid;

pub const CONFIGURATION_MESSAGE: &str = "Server configuration error";
pub const INTERNAL_MESSAGE: &str = "Internal server error";
pub const INVALID_JSON_MESSAGE: &str = "Invalid JSON in request body";

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")] pub trace_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")] pub message: Option<String>,
}

/// Client-visible failures. 5xx variants carry fixed messages so no internal
/// detail (upstream errors, secrets, paths) can reach the caller.
#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    Unauthorized { code: &'static str, trace_id: Option<Uuid> },
    Configuration { trace_id: Option<Uuid> },
    Internal { trace_id: Option<Uuid> },
}

impl ApiError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self { Self::BadRequest { code, trace_id: None, message: Some(message.into()) } }
    pub fn invalid_json() -> Self { Self::bad_request("invalid_json", INVALID_JSON_MESSAGE) }
    pub fn unauthorized(code: &'static str) -> Self { Self::Unauthorized { code, trace_id: None } }
    pub fn configuration() -> Self { Self::Configuration { trace_id: None } }
    pub fn internal() -> Self { Self::Internal { trace_id: None } }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Configuration { .. } | ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest { code, .. } | ApiError::Unauthorized { code, .. } => code,
            ApiError::Configuration { .. } => "server_configuration",
            ApiError::Internal { .. } => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_code = self.code();
        let body = match self {
            ApiError::BadRequest { code, trace_id, message } => ErrorBody { code: code.into(), trace_id, message },
            ApiError::Unauthorized { code, trace_id } => ErrorBody { code: code.into(), trace_id, message: Some("Unauthorized".into()) },
            ApiError::Configuration { trace_id } => ErrorBody { code: error_code.into(), trace_id, message: Some(CONFIGURATION_MESSAGE.into()) },
            ApiError::Internal { trace_id } => ErrorBody { code: error_code.into(), trace_id, message: Some(INTERNAL_MESSAGE.into()) },
        };
        let mut resp = (status, Json(body)).into_response();
        if let Ok(val) = HeaderValue::from_str(error_code) {
            resp.headers_mut().insert("X-Error-Code", val);
        }
        resp
    }
}
