use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::{AuthError, AuthResult};
use crate::identity::{Identity, TokenClaims};

/// Claims returned for an identity, possibly re-read from the identity service.
#[derive(Debug, Clone, PartialEq)]
pub struct IdTokenResult {
    pub claims: TokenClaims,
    /// True when the claims came from a fresh lookup instead of the snapshot.
    pub refreshed: bool,
}

impl IdTokenResult {
    pub fn snapshot(identity: &Identity) -> Self {
        Self {
            claims: identity.token_claims.clone(),
            refreshed: false,
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn id_token_result(
        &self,
        identity: &Identity,
        force_refresh: bool,
    ) -> AuthResult<IdTokenResult>;
}

/// Claim overrides held in memory, keyed by uid. Used by tests and local dev
/// where no identity service is reachable.
#[derive(Clone, Default)]
pub struct InMemoryIdentityProvider {
    overrides: Arc<RwLock<HashMap<String, TokenClaims>>>,
    failing: Arc<RwLock<bool>>,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the identity service now holds for `uid`. A forced refresh
    /// returns exactly this set; uids with no entry keep their token's claims.
    pub fn set_claims(&self, uid: impl Into<String>, claims: TokenClaims) {
        let mut guard = self.overrides.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(uid.into(), claims);
    }

    /// Make every forced refresh fail, as when the identity service is down.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.write().unwrap_or_else(PoisonError::into_inner) = failing;
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn id_token_result(
        &self,
        identity: &Identity,
        force_refresh: bool,
    ) -> AuthResult<IdTokenResult> {
        if !force_refresh {
            return Ok(IdTokenResult::snapshot(identity));
        }
        if *self.failing.read().unwrap_or_else(PoisonError::into_inner) {
            return Err(AuthError::IdentityLookup("identity provider unavailable".into()));
        }

        let guard = self.overrides.read().unwrap_or_else(PoisonError::into_inner);
        let claims = guard
            .get(&identity.uid)
            .cloned()
            .unwrap_or_else(|| identity.token_claims.clone());
        Ok(IdTokenResult {
            claims,
            refreshed: true,
        })
    }
}

/// Stands in when no identity service is configured. Snapshot reads work, but
/// a forced refresh always fails so callers fall back to their closed path.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableIdentityProvider;

#[async_trait]
impl IdentityProvider for UnavailableIdentityProvider {
    async fn id_token_result(
        &self,
        identity: &Identity,
        force_refresh: bool,
    ) -> AuthResult<IdTokenResult> {
        if force_refresh {
            return Err(AuthError::IdentityLookup("no identity service configured".into()));
        }
        Ok(IdTokenResult::snapshot(identity))
    }
}

/// Re-reads custom claims through the identity service's `accounts:lookup`
/// REST call. Custom claims come back as a JSON-encoded object string.
#[derive(Clone)]
pub struct IdentityToolkitProvider {
    client: Client,
    lookup_url: String,
    service_token: Option<String>,
}

impl IdentityToolkitProvider {
    pub fn new(lookup_url: impl Into<String>, service_token: Option<String>) -> Self {
        Self::with_client(Client::new(), lookup_url, service_token)
    }

    pub fn with_client(
        client: Client,
        lookup_url: impl Into<String>,
        service_token: Option<String>,
    ) -> Self {
        Self {
            client,
            lookup_url: lookup_url.into(),
            service_token,
        }
    }

    async fn lookup_custom_claims(&self, uid: &str) -> AuthResult<TokenClaims> {
        let mut request = self
            .client
            .post(&self.lookup_url)
            .json(&json!({ "localId": [uid] }));
        if let Some(token) = &self.service_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|err| AuthError::IdentityLookup(err.to_string()))?;
        if !response.status().is_success() {
            return Err(AuthError::IdentityLookup(format!(
                "HTTP {} from {}",
                response.status(),
                self.lookup_url
            )));
        }

        let body: LookupResponse = response
            .json()
            .await
            .map_err(|err| AuthError::IdentityDecode(err.to_string()))?;
        let user = body
            .users
            .into_iter()
            .find(|user| user.local_id == uid)
            .ok_or_else(|| AuthError::IdentityNotFound(uid.to_string()))?;

        match user.custom_attributes.as_deref().map(str::trim) {
            None | Some("") => Ok(TokenClaims::new()),
            Some(raw) => serde_json::from_str::<Map<String, Value>>(raw)
                .map(TokenClaims::from_map)
                .map_err(|err| AuthError::IdentityDecode(err.to_string())),
        }
    }
}

#[async_trait]
impl IdentityProvider for IdentityToolkitProvider {
    async fn id_token_result(
        &self,
        identity: &Identity,
        force_refresh: bool,
    ) -> AuthResult<IdTokenResult> {
        if !force_refresh {
            return Ok(IdTokenResult::snapshot(identity));
        }

        // The lookup result replaces the token's claims outright; a claim
        // removed upstream must not survive from the snapshot.
        let claims = self.lookup_custom_claims(&identity.uid).await?;
        debug!(uid = %identity.uid, claims = claims.as_map().len(), "refreshed custom claims");
        Ok(IdTokenResult {
            claims,
            refreshed: true,
        })
    }
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    custom_attributes: Option<String>,
}
