pub mod access_routes;
pub mod app_state;
pub mod bridge_handlers;
pub mod config;
pub mod forwarder;
pub mod internal_auth;
pub mod internal_handlers;
pub mod metrics;
pub mod secret;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

pub use crate::app_state::{identity_provider, AppState};
pub use crate::config::GatewayConfig;
pub use crate::forwarder::{relay_json, BridgeEndpoint, BridgeError, SecretBridge};
pub use crate::metrics::GatewayMetrics;
pub use crate::secret::SharedSecret;

pub fn build_router(state: AppState) -> Router {
    let internal = Router::new()
        .route("/api/internal/generate-image", post(internal_handlers::generate_image))
        .route("/api/internal/generate-contract", post(internal_handlers::generate_contract))
        .route("/api/internal/create-transaction", post(internal_handlers::create_transaction))
        .route_layer(middleware::from_fn_with_state(state.clone(), internal_auth::require_internal_key));

    Router::new()
        .route("/healthz", get(access_routes::health))
        .route("/metrics", get(access_routes::render_metrics))
        .route("/api/session/verdict", get(access_routes::session_verdict))
        .route("/admin", get(access_routes::admin_area))
        .route("/advertiser", get(access_routes::advertiser_area))
        .route("/api/bridge/generate-image", post(bridge_handlers::generate_image))
        .route("/api/bridge/generate-contract", post(bridge_handlers::generate_contract))
        .route("/api/bridge/create-transaction", post(bridge_handlers::create_transaction))
        .merge(internal)
        .with_state(state)
}
