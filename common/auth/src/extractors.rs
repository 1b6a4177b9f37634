use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderMap, HeaderValue};
use tracing::debug;

use crate::error::{AuthError, AuthResult};
use crate::identity::Identity;
use crate::verifier::IdTokenVerifier;

/// Identity from a verified `Authorization: Bearer <idToken>` header.
/// Rejects the request with 401 when the header is absent or invalid.
#[derive(Debug, Clone)]
pub struct AuthenticatedIdentity {
    pub identity: Identity,
    pub token: String,
}

impl AuthenticatedIdentity {
    pub fn uid(&self) -> &str {
        &self.identity.uid
    }

    pub fn into_identity(self) -> Identity {
        self.identity
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedIdentity
where
    Arc<IdTokenVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let verifier = Arc::<IdTokenVerifier>::from_ref(state);
        authenticate(&parts.headers, &verifier)
    }
}

/// Identity if the request carries a valid ID token, otherwise `None`.
/// An invalid token is treated the same as no token.
#[derive(Debug, Clone)]
pub struct MaybeIdentity(pub Option<Identity>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeIdentity
where
    Arc<IdTokenVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let verifier = Arc::<IdTokenVerifier>::from_ref(state);
        match authenticate(&parts.headers, &verifier) {
            Ok(authenticated) => Ok(Self(Some(authenticated.identity))),
            Err(AuthError::MissingAuthorization) => Ok(Self(None)),
            Err(err) => {
                debug!(error = %err, "ignoring invalid ID token");
                Ok(Self(None))
            }
        }
    }
}

fn authenticate(headers: &HeaderMap, verifier: &IdTokenVerifier) -> AuthResult<AuthenticatedIdentity> {
    let header_value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthorization)?;
    let token = parse_bearer(header_value)?;
    let identity = verifier.verify_identity(&token)?;
    Ok(AuthenticatedIdentity { identity, token })
}

pub fn parse_bearer(value: &HeaderValue) -> AuthResult<String> {
    let raw = value
        .to_str()
        .map_err(|_| AuthError::InvalidAuthorization)?
        .trim();

    let token = raw
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthorization)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::InvalidAuthorization);
    }

    Ok(token.to_owned())
}
