use anyhow::{Context, Result};
use common_auth::DEFAULT_ID_TOKEN_JWKS_URL;
use common_security::{FirestoreDocumentStore, DEFAULT_SUPER_ADMIN_UID};
use std::env;
use tracing::warn;

use crate::secret::SharedSecret;

pub const DEFAULT_PORT: u16 = 8090;
#[cfg(feature = "kafka")]
pub const DEFAULT_KAFKA_BOOTSTRAP: &str = "localhost:9092";
#[cfg(feature = "kafka")]
pub const DEFAULT_AUDIT_TOPIC: &str = "audit.events.v1";

const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:3001",
    "http://localhost:5173",
];

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// `None` when unset or left at a placeholder value.
    pub internal_api_key: Option<SharedSecret>,
    pub internal_api_base_url: String,
    pub generation_service_url: Option<String>,
    pub generation_service_token: Option<String>,
    pub firebase_project_id: String,
    pub id_token_jwks_url: String,
    pub jwt_leeway_seconds: Option<u32>,
    pub jwks_refresh_secs: u64,
    pub dev_public_key_pem: Option<String>,
    pub firestore_base_url: String,
    pub firestore_access_token: Option<String>,
    pub identity_lookup_url: Option<String>,
    pub identity_service_token: Option<String>,
    pub super_admin_uid: String,
    pub allowed_origins: Vec<String>,
    #[cfg(feature = "kafka")]
    pub kafka_bootstrap: String,
    #[cfg(feature = "kafka")]
    pub audit_topic: String,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any key/value source; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|value| value.trim().to_string()).filter(|value| !value.is_empty());

        let firebase_project_id = var("FIREBASE_PROJECT_ID").context("FIREBASE_PROJECT_ID must be set")?;
        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match var("PORT") {
            Some(raw) => raw.parse::<u16>().with_context(|| format!("PORT is not a valid port: {raw}"))?,
            None => DEFAULT_PORT,
        };

        let internal_api_key = match lookup("INTERNAL_API_KEY") {
            Some(raw) => {
                let parsed = SharedSecret::parse(&raw);
                if parsed.is_none() {
                    warn!("INTERNAL_API_KEY is blank or a placeholder; bridge and internal routes will refuse requests");
                }
                parsed
            }
            None => {
                warn!("INTERNAL_API_KEY is not set; bridge and internal routes will refuse requests");
                None
            }
        };
        let internal_api_base_url = var("INTERNAL_API_BASE_URL")
            .unwrap_or_else(|| format!("http://127.0.0.1:{port}"))
            .trim_end_matches('/')
            .to_string();

        let jwt_leeway_seconds = var("JWT_LEEWAY_SECONDS").and_then(|value| value.parse::<u32>().ok());
        let jwks_refresh_secs = var("JWKS_REFRESH_SECONDS")
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(300);
        let firestore_base_url = var("FIRESTORE_BASE_URL")
            .unwrap_or_else(|| FirestoreDocumentStore::project_base_url(&firebase_project_id));
        let allowed_origins = match var("ALLOWED_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect(),
            None => DEFAULT_ALLOWED_ORIGINS.iter().map(|origin| origin.to_string()).collect(),
        };

        Ok(Self {
            host,
            port,
            internal_api_key,
            internal_api_base_url,
            generation_service_url: var("GENERATION_SERVICE_URL").map(|url| url.trim_end_matches('/').to_string()),
            generation_service_token: var("GENERATION_SERVICE_TOKEN"),
            id_token_jwks_url: var("ID_TOKEN_JWKS_URL").unwrap_or_else(|| DEFAULT_ID_TOKEN_JWKS_URL.to_string()),
            jwt_leeway_seconds,
            jwks_refresh_secs: jwks_refresh_secs.max(60),
            dev_public_key_pem: var("JWT_DEV_PUBLIC_KEY_PEM"),
            firestore_base_url,
            firestore_access_token: var("FIRESTORE_ACCESS_TOKEN"),
            identity_lookup_url: var("IDENTITY_LOOKUP_URL"),
            identity_service_token: var("IDENTITY_SERVICE_TOKEN"),
            super_admin_uid: var("SUPER_ADMIN_UID").unwrap_or_else(|| DEFAULT_SUPER_ADMIN_UID.to_string()),
            firebase_project_id,
            allowed_origins,
            #[cfg(feature = "kafka")]
            kafka_bootstrap: var("KAFKA_BOOTSTRAP").unwrap_or_else(|| DEFAULT_KAFKA_BOOTSTRAP.to_string()),
            #[cfg(feature = "kafka")]
            audit_topic: var("AUDIT_TOPIC").unwrap_or_else(|| DEFAULT_AUDIT_TOPIC.to_string()),
        })
    }
}
