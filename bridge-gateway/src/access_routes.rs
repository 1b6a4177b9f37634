use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use common_auth::{AuthState, AuthenticatedIdentity, Identity, MaybeIdentity};
use common_http_errors::ApiError;
use common_security::{
    AuthorizationVerdict, GuardDecision, GuardState, RecordingNavigator, RoleResolver, RouteGuard, RouteRequirement,
};
use tracing::error;

use crate::AppState;

pub async fn health() -> &'static str {
    "ok"
}

pub async fn render_metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(response) => response,
        Err(err) => {
            error!(error = %err, "failed to render metrics");
            ApiError::internal().into_response()
        }
    }
}

pub async fn session_verdict(
    State(state): State<AppState>,
    authenticated: AuthenticatedIdentity,
) -> Json<AuthorizationVerdict> {
    let resolver = RoleResolver::new(state.access.clone());
    Json(resolver.resolve(&authenticated.identity).await)
}

pub async fn admin_area(State(state): State<AppState>, MaybeIdentity(identity): MaybeIdentity) -> Response {
    guarded(&state, identity, RouteRequirement::admin_only(), "admin").await
}

pub async fn advertiser_area(State(state): State<AppState>, MaybeIdentity(identity): MaybeIdentity) -> Response {
    guarded(&state, identity, RouteRequirement::advertiser_only(), "advertiser").await
}

/// A request is a one-shot guard evaluation: its identity is already known,
/// and a navigator redirect becomes a 307.
async fn guarded(state: &AppState, identity: Option<Identity>, requirement: RouteRequirement, route: &str) -> Response {
    let navigator = RecordingNavigator::new();
    let guard = RouteGuard::new(state.access.clone(), Arc::new(navigator.clone()));
    let auth = match identity {
        Some(identity) => AuthState::signed_in(identity),
        None => AuthState::signed_out(),
    };

    let outcome = guard.guard(&auth, requirement).await;
    state.metrics.record_guard(route, decision_label(&outcome));
    match navigator.last() {
        Some(path) => Redirect::temporary(&path).into_response(),
        None => Json(outcome).into_response(),
    }
}

fn decision_label(state: &GuardState) -> &'static str {
    match state.decision {
        GuardDecision::Pending => "pending",
        GuardDecision::RedirectLogin => "login",
        GuardDecision::Denied(_) => "denied",
        GuardDecision::Allowed => "allowed",
    }
}
