use std::sync::Arc;

use anyhow::Result;
use axum::extract::FromRef;
use common_auth::{IdTokenVerifier, IdentityProvider, IdentityToolkitProvider, UnavailableIdentityProvider};
use common_security::AccessContext;
use reqwest::Client;
use tracing::warn;

use crate::config::GatewayConfig;
use crate::forwarder::SecretBridge;
use crate::metrics::GatewayMetrics;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub verifier: Arc<IdTokenVerifier>,
    pub access: Arc<AccessContext>,
    pub bridge: Arc<SecretBridge>,
    pub metrics: Arc<GatewayMetrics>,
    pub http_client: Client,
}

impl AppState {
    pub fn new(
        config: GatewayConfig,
        verifier: Arc<IdTokenVerifier>,
        access: Arc<AccessContext>,
        http_client: Client,
    ) -> Result<Self> {
        let bridge = SecretBridge::new(
            http_client.clone(),
            config.internal_api_base_url.clone(),
            config.internal_api_key.clone(),
        );
        Ok(Self {
            config: Arc::new(config),
            verifier,
            access,
            bridge: Arc::new(bridge),
            metrics: Arc::new(GatewayMetrics::new()?),
            http_client,
        })
    }
}

impl FromRef<AppState> for Arc<IdTokenVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.verifier.clone()
    }
}

/// Claim refresh goes through the identity service when `IDENTITY_LOOKUP_URL`
/// is set. Without it every forced refresh fails, so `superAdmin` claims are
/// ignored and only the configured uid and admin records grant admin.
pub fn identity_provider(config: &GatewayConfig, client: &Client) -> Arc<dyn IdentityProvider> {
    match &config.identity_lookup_url {
        Some(url) => Arc::new(IdentityToolkitProvider::with_client(
            client.clone(),
            url.clone(),
            config.identity_service_token.clone(),
        )),
        None => {
            warn!("IDENTITY_LOOKUP_URL not set; superAdmin claims will not be honoured");
            Arc::new(UnavailableIdentityProvider)
        }
    }
}
