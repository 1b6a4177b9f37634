use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tracing::debug;

use crate::claims::Claims;
use crate::config::IdTokenConfig;
use crate::error::{AuthError, AuthResult};
use crate::identity::Identity;
use crate::jwks::JwksFetcher;

/// Decoding keys by `kid`, shared between the verifier and the refresh task.
#[derive(Clone, Default)]
pub struct InMemoryKeyStore {
    inner: Arc<RwLock<HashMap<String, DecodingKey>>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_key(&self, kid: impl Into<String>, key: DecodingKey) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(kid.into(), key);
    }

    pub fn insert_rsa_pem(&self, kid: impl Into<String>, pem: &[u8]) -> AuthResult<()> {
        let kid = kid.into();
        let key = DecodingKey::from_rsa_pem(pem)
            .map_err(|err| AuthError::KeyParse(kid.clone(), err.to_string()))?;
        self.insert_key(kid, key);
        Ok(())
    }

    pub fn get(&self, kid: &str) -> Option<DecodingKey> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard.get(kid).cloned()
    }

    pub fn contains(&self, kid: &str) -> bool {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard.contains_key(kid)
    }

    pub fn len(&self) -> usize {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Swap in a freshly fetched key set. Keys pinned locally (dev PEM) are
    /// dropped as well, so only call this with the complete set.
    pub fn replace_all<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (String, DecodingKey)>,
    {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.clear();
        guard.extend(entries);
    }
}

/// Verifies RS256 ID tokens and turns them into [`Identity`] snapshots.
#[derive(Clone)]
pub struct IdTokenVerifier {
    config: IdTokenConfig,
    store: InMemoryKeyStore,
    jwks: Option<JwksFetcher>,
}

impl IdTokenVerifier {
    pub fn new(config: IdTokenConfig) -> Self {
        Self::with_store(config, InMemoryKeyStore::new())
    }

    pub fn with_store(config: IdTokenConfig, store: InMemoryKeyStore) -> Self {
        Self {
            config,
            store,
            jwks: None,
        }
    }

    pub fn builder(config: IdTokenConfig) -> IdTokenVerifierBuilder {
        IdTokenVerifierBuilder::new(config)
    }

    pub fn config(&self) -> &IdTokenConfig {
        &self.config
    }

    pub fn store(&self) -> &InMemoryKeyStore {
        &self.store
    }

    pub fn jwks_fetcher(&self) -> Option<&JwksFetcher> {
        self.jwks.as_ref()
    }

    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let header =
            decode_header(token).map_err(|err| AuthError::InvalidHeader(err.to_string()))?;
        let kid = header.kid.ok_or(AuthError::MissingKeyId)?;
        let key = self
            .store
            .get(&kid)
            .ok_or_else(|| AuthError::UnknownKeyId(kid.clone()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.config.issuer.as_str()]);
        validation.set_audience(&[self.config.audience.as_str()]);
        validation.leeway = self.config.leeway_seconds.into();

        let token_data = decode::<Value>(token, &key, &validation)?;
        let claims = Claims::try_from(token_data.claims)?;
        debug!(kid, uid = %claims.subject, "verified ID token");
        Ok(claims)
    }

    pub fn verify_identity(&self, token: &str) -> AuthResult<Identity> {
        self.verify(token).map(Claims::into_identity)
    }

    pub async fn refresh_jwks(&self) -> AuthResult<usize> {
        let Some(fetcher) = &self.jwks else {
            return Ok(0);
        };

        let keys = fetcher.fetch().await?;
        let count = keys.len();
        if count > 0 {
            self.store.replace_all(keys);
        }
        Ok(count)
    }
}

pub struct IdTokenVerifierBuilder {
    config: IdTokenConfig,
    store: InMemoryKeyStore,
    jwks: Option<JwksFetcher>,
}

impl IdTokenVerifierBuilder {
    fn new(config: IdTokenConfig) -> Self {
        Self {
            config,
            store: InMemoryKeyStore::new(),
            jwks: None,
        }
    }

    pub fn with_store(mut self, store: InMemoryKeyStore) -> Self {
        self.store = store;
        self
    }

    pub fn with_decoding_key(self, kid: impl Into<String>, key: DecodingKey) -> Self {
        self.store.insert_key(kid, key);
        self
    }

    pub fn with_rsa_pem(self, kid: impl Into<String>, pem: &[u8]) -> AuthResult<Self> {
        self.store.insert_rsa_pem(kid, pem)?;
        Ok(self)
    }

    pub fn with_jwks_url(mut self, url: impl Into<String>) -> Self {
        self.jwks = Some(JwksFetcher::new(url));
        self
    }

    pub fn with_jwks_fetcher(mut self, fetcher: JwksFetcher) -> Self {
        self.jwks = Some(fetcher);
        self
    }

    pub async fn build(self) -> AuthResult<IdTokenVerifier> {
        let verifier = IdTokenVerifier {
            config: self.config,
            store: self.store,
            jwks: self.jwks,
        };

        if verifier.jwks.is_some() {
            verifier.refresh_jwks().await?;
        }

        Ok(verifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use chrono::Utc;
    use httpmock::prelude::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding};
    use rsa::rand_core::OsRng;
    use rsa::traits::PublicKeyParts;
    use rsa::RsaPrivateKey;
    use serde_json::json;

    struct KeyMaterial {
        encoding: EncodingKey,
        decoding: DecodingKey,
        modulus: String,
        exponent: String,
    }

    fn generate_key_material() -> KeyMaterial {
        let mut rng = OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("key generation");
        let public_key = private_key.to_public_key();

        let private_pem = private_key
            .to_pkcs1_pem(LineEnding::LF)
            .expect("private pem");
        let public_pem = public_key.to_pkcs1_pem(LineEnding::LF).expect("public pem");

        KeyMaterial {
            encoding: EncodingKey::from_rsa_pem(private_pem.as_bytes()).expect("encoding key"),
            decoding: DecodingKey::from_rsa_pem(public_pem.as_bytes()).expect("decoding key"),
            modulus: URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
            exponent: URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
        }
    }

    fn issue_token(encoding: &EncodingKey, kid: &str, config: &IdTokenConfig, uid: &str) -> String {
        let issued_at = Utc::now().timestamp();
        let claims = json!({
            "sub": uid,
            "iss": config.issuer,
            "aud": config.audience,
            "iat": issued_at,
            "exp": issued_at + 600,
            "email": format!("{uid}@example.com"),
            "superAdmin": true
        });

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        encode(&header, &claims, encoding).expect("sign token")
    }

    #[test]
    fn key_store_replace_drops_previous_keys() {
        let store = InMemoryKeyStore::new();
        assert!(store.is_empty());
        store.insert_key("kid", DecodingKey::from_secret(b"secret"));
        assert!(store.contains("kid"));

        store.replace_all(vec![(
            "another".to_string(),
            DecodingKey::from_secret(b"other"),
        )]);
        assert!(!store.contains("kid"));
        assert!(store.contains("another"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn verifier_produces_identity_with_custom_claims() {
        let material = generate_key_material();
        let config = IdTokenConfig::for_project("vsd-network");
        let store = InMemoryKeyStore::new();
        store.insert_key("test-key", material.decoding.clone());
        let verifier = IdTokenVerifier::with_store(config.clone(), store);

        let token = issue_token(&material.encoding, "test-key", &config, "U1");
        let identity = verifier.verify_identity(&token).expect("verification succeeds");

        assert_eq!(identity.uid, "U1");
        assert_eq!(identity.email.as_deref(), Some("U1@example.com"));
        assert!(identity.token_claims.is_super_admin());
    }

    #[test]
    fn verifier_rejects_wrong_audience() {
        let material = generate_key_material();
        let store = InMemoryKeyStore::new();
        store.insert_key("test-key", material.decoding.clone());
        let verifier =
            IdTokenVerifier::with_store(IdTokenConfig::for_project("vsd-network"), store);

        let foreign = IdTokenConfig::for_project("someone-else");
        let token = issue_token(&material.encoding, "test-key", &foreign, "U1");
        let err = verifier.verify(&token).expect_err("verification should fail");
        assert!(matches!(err, AuthError::Verification(_)));
    }

    #[test]
    fn verifier_rejects_unknown_kid() {
        let material = generate_key_material();
        let config = IdTokenConfig::for_project("vsd-network");
        let verifier = IdTokenVerifier::new(config.clone());

        let token = issue_token(&material.encoding, "missing", &config, "U1");
        match verifier.verify(&token).expect_err("verification should fail") {
            AuthError::UnknownKeyId(actual) => assert_eq!(actual, "missing"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn builder_loads_jwks_on_build() {
        let material = generate_key_material();
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/jwks");
                then.status(200).json_body(json!({
                    "keys": [{
                        "kid": "fetched-key",
                        "kty": "RSA",
                        "alg": "RS256",
                        "use": "sig",
                        "n": material.modulus,
                        "e": material.exponent
                    }]
                }));
            })
            .await;

        let config = IdTokenConfig::for_project("vsd-network");
        let verifier = IdTokenVerifier::builder(config.clone())
            .with_jwks_url(server.url("/jwks"))
            .build()
            .await
            .expect("build succeeds");

        assert!(verifier.store().contains("fetched-key"));
        let token = issue_token(&material.encoding, "fetched-key", &config, "U9");
        assert_eq!(verifier.verify(&token).expect("verify").subject, "U9");
    }

    #[tokio::test]
    async fn refresh_without_fetcher_returns_zero() {
        let verifier = IdTokenVerifier::new(IdTokenConfig::new("issuer", "audience"));
        assert_eq!(verifier.refresh_jwks().await.expect("refresh succeeds"), 0);
    }
}
