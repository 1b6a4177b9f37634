#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use axum::body::{to_bytes, Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use bridge_gateway::{build_router, AppState, GatewayConfig};
use chrono::Utc;
use common_audit::BufferedAuditSink;
use common_auth::{IdTokenConfig, IdTokenVerifier, InMemoryIdentityProvider, InMemoryKeyStore};
use common_security::{AccessContext, InMemoryDocumentStore};
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding};
use rsa::rand_core::OsRng;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};
use tower::ServiceExt;

pub const PROJECT_ID: &str = "vsd-test";
pub const KEY_ID: &str = "test-key";
pub const SUPER_ADMIN_UID: &str = "ROOT";

struct KeyMaterial {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

fn key_material() -> &'static KeyMaterial {
    static MATERIAL: OnceLock<KeyMaterial> = OnceLock::new();
    MATERIAL.get_or_init(|| {
        let private_key = RsaPrivateKey::new(&mut OsRng, 2048).expect("key generation");
        let private_pem = private_key.to_pkcs1_pem(LineEnding::LF).expect("private pem");
        let public_pem = private_key.to_public_key().to_pkcs1_pem(LineEnding::LF).expect("public pem");
        KeyMaterial {
            encoding: EncodingKey::from_rsa_pem(private_pem.as_bytes()).expect("encoding key"),
            decoding: DecodingKey::from_rsa_pem(public_pem.as_bytes()).expect("decoding key"),
        }
    })
}

pub fn config(pairs: &[(&str, &str)]) -> GatewayConfig {
    let mut map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    map.entry("FIREBASE_PROJECT_ID".into()).or_insert_with(|| PROJECT_ID.into());
    map.entry("SUPER_ADMIN_UID".into()).or_insert_with(|| SUPER_ADMIN_UID.into());
    GatewayConfig::from_lookup(|name| map.get(name).cloned()).expect("test config")
}

pub struct Harness {
    pub app: Router,
    pub store: InMemoryDocumentStore,
    pub identity: InMemoryIdentityProvider,
    pub audit: BufferedAuditSink,
}

pub fn harness(pairs: &[(&str, &str)]) -> Harness {
    let config = config(pairs);
    let store = InMemoryDocumentStore::new();
    let identity = InMemoryIdentityProvider::new();
    let audit = BufferedAuditSink::new();

    let keys = InMemoryKeyStore::new();
    keys.insert_key(KEY_ID, key_material().decoding.clone());
    let verifier = IdTokenVerifier::with_store(IdTokenConfig::for_project(&config.firebase_project_id), keys);

    let access = AccessContext::new(Arc::new(store.clone()), Arc::new(identity.clone()))
        .with_audit(Arc::new(audit.clone()))
        .with_super_admin_uid(config.super_admin_uid.clone())
        .with_source_service("bridge-gateway-test");
    let state = AppState::new(config, Arc::new(verifier), Arc::new(access), reqwest::Client::new()).expect("state");

    Harness { app: build_router(state), store, identity, audit }
}

pub fn id_token(uid: &str, extra: Value) -> String {
    let token_config = IdTokenConfig::for_project(PROJECT_ID);
    let issued_at = Utc::now().timestamp();
    let mut claims = json!({
        "sub": uid,
        "iss": token_config.issuer,
        "aud": token_config.audience,
        "iat": issued_at,
        "exp": issued_at + 600,
        "email": format!("{}@example.com", uid.to_lowercase()),
    });
    if let (Some(target), Some(extra)) = (claims.as_object_mut(), extra.as_object()) {
        target.extend(extra.clone());
    }
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(KEY_ID.to_string());
    encode(&header, &claims, &key_material().encoding).expect("sign token")
}

pub fn post_json(uri: &str, body: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri).header("content-type", "application/json");
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    (status, headers, body)
}

pub fn json_body(bytes: &Bytes) -> Value {
    serde_json::from_slice(bytes).expect("json body")
}
