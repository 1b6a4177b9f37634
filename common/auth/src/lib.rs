pub mod claims;
pub mod config;
pub mod error;
pub mod extractors;
pub mod identity;
pub mod jwks;
pub mod provider;
pub mod roles;
pub mod session;
pub mod verifier;

pub use claims::Claims;
pub use config::{IdTokenConfig, DEFAULT_ID_TOKEN_JWKS_URL};
pub use error::{AuthError, AuthResult};
pub use extractors::{parse_bearer, AuthenticatedIdentity, MaybeIdentity};
pub use identity::{Identity, TokenClaims};
pub use jwks::JwksFetcher;
pub use provider::{IdTokenResult, IdentityProvider, IdentityToolkitProvider, InMemoryIdentityProvider, UnavailableIdentityProvider};
pub use roles::{ACCOUNT_ROLES, CLAIM_SUPER_ADMIN, ROLE_ADMIN, ROLE_ADVERTISER, ROLE_USER};
pub use session::{AuthState, IdentitySession, IdentitySubscription};
pub use verifier::{IdTokenVerifier, IdTokenVerifierBuilder, InMemoryKeyStore};
