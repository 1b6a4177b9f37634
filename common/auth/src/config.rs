const SECURETOKEN_ISSUER_PREFIX: &str = "https://securetoken.google.com/";

/// Public JWKS for ID tokens minted by the identity service.
pub const DEFAULT_ID_TOKEN_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Runtime configuration for ID token verification.
#[derive(Debug, Clone)]
pub struct IdTokenConfig {
    /// Expected issuer claim (iss).
    pub issuer: String,
    /// Expected audience claim (aud).
    pub audience: String,
    /// Allowable clock skew in seconds when validating exp/nbf.
    pub leeway_seconds: u32,
}

impl IdTokenConfig {
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            leeway_seconds: 30,
        }
    }

    /// Issuer and audience as the identity service sets them for `project_id`.
    pub fn for_project(project_id: &str) -> Self {
        Self::new(format!("{SECURETOKEN_ISSUER_PREFIX}{project_id}"), project_id)
    }

    pub fn with_leeway(mut self, seconds: u32) -> Self {
        self.leeway_seconds = seconds;
        self
    }
}
