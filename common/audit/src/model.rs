use chrono::{DateTime,Utc};
use serde::{Serialize,Deserialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AuditActor {
    pub uid: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl AuditActor {
    pub fn uid(uid: impl Into<String>) -> Self { Self { uid: Some(uid.into()), ..Self::default() } }
}

pub const AUDIT_EVENT_VERSION: i32 = 1;

pub const ACTION_ACCESS_DENIED: &str = "route.access_denied";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity { #[default] Info, Warning, Security }

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub event_version: i32,
    pub actor: AuditActor,
    pub action: String,
    pub occurred_at: DateTime<Utc>,
    pub source_service: String,
    pub severity: AuditSeverity,
    pub payload: serde_json::Value,
}

impl AuditEvent {
    pub fn new(actor: AuditActor, action: impl Into<String>, source_service: &str, severity: AuditSeverity, payload: serde_json::Value) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_version: AUDIT_EVENT_VERSION,
            actor,
            action: action.into(),
            occurred_at: Utc::now(),
            source_service: source_service.to_string(),
            severity,
            payload,
        }
    }

    /// A guarded route turned an authenticated user away.
    pub fn access_denied(actor: AuditActor, source_service: &str, payload: serde_json::Value) -> Self {
        Self::new(actor, ACTION_ACCESS_DENIED, source_service, AuditSeverity::Security, payload)
    }
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("sink not configured")]
    NotConfigured,
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("kafka error: {0}")]
    Kafka(String),
}

pub type AuditResult<T> = Result<T, AuditError>;
