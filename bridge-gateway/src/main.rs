use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use bridge_gateway::{build_router, identity_provider, AppState, GatewayConfig};
use common_audit::AuditSink;
use common_auth::{IdTokenConfig, IdTokenVerifier};
use common_security::{AccessContext, FirestoreDocumentStore};
use reqwest::Client;
use tokio::net::TcpListener;
use tokio::time::{interval, MissedTickBehavior};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const SERVICE_NAME: &str = "bridge-gateway";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = GatewayConfig::from_env()?;
    if let Some(key) = &config.internal_api_key {
        info!(key_fingerprint = %key.fingerprint(), "internal API key configured");
    }

    let verifier = build_verifier(&config).await?;
    spawn_jwks_refresh(verifier.clone(), config.jwks_refresh_secs);

    let http_client = Client::new();
    let store = FirestoreDocumentStore::with_client(
        http_client.clone(),
        &config.firestore_base_url,
        config.firestore_access_token.clone(),
    )
    .context("invalid FIRESTORE_BASE_URL")?;
    let access = AccessContext::new(Arc::new(store), identity_provider(&config, &http_client))
        .with_audit(audit_sink(&config)?)
        .with_super_admin_uid(config.super_admin_uid.clone())
        .with_source_service(SERVICE_NAME);

    let cors = build_cors(&config.allowed_origins);
    let ip: IpAddr = config.host.parse().context("HOST is not a valid IP address")?;
    let addr = SocketAddr::from((ip, config.port));
    let state = AppState::new(config, verifier, Arc::new(access), http_client)?;
    let app = build_router(state).layer(cors);

    info!(%addr, "starting {SERVICE_NAME}");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn build_verifier(config: &GatewayConfig) -> anyhow::Result<Arc<IdTokenVerifier>> {
    let mut token_config = IdTokenConfig::for_project(&config.firebase_project_id);
    if let Some(leeway) = config.jwt_leeway_seconds {
        token_config = token_config.with_leeway(leeway);
    }

    let mut builder = IdTokenVerifier::builder(token_config);
    match &config.dev_public_key_pem {
        Some(pem) => {
            warn!("Using JWT_DEV_PUBLIC_KEY_PEM for verification; do not enable in production");
            builder = builder
                .with_rsa_pem("local-dev", pem.as_bytes())
                .map_err(anyhow::Error::from)?;
        }
        None => {
            info!(jwks_url = %config.id_token_jwks_url, "Configuring JWKS fetcher");
            builder = builder.with_jwks_url(config.id_token_jwks_url.clone());
        }
    }

    let verifier = builder.build().await.map_err(anyhow::Error::from)?;
    info!("ID token verifier initialised");
    Ok(Arc::new(verifier))
}

fn spawn_jwks_refresh(verifier: Arc<IdTokenVerifier>, refresh_secs: u64) {
    let Some(fetcher) = verifier.jwks_fetcher() else {
        return;
    };
    let url = fetcher.url().to_owned();

    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(refresh_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match verifier.refresh_jwks().await {
                Ok(count) => {
                    debug!(count, jwks_url = %url, "Refreshed JWKS keys");
                }
                Err(err) => {
                    warn!(error = %err, jwks_url = %url, "Failed to refresh JWKS keys");
                }
            }
        }
    });
}

#[cfg(feature = "kafka")]
fn audit_sink(config: &GatewayConfig) -> anyhow::Result<Arc<dyn AuditSink>> {
    use common_audit::KafkaAuditSink;
    use rdkafka::producer::FutureProducer;

    let producer: FutureProducer = rdkafka::ClientConfig::new()
        .set("bootstrap.servers", &config.kafka_bootstrap)
        .create()
        .context("failed to create kafka producer")?;
    info!(bootstrap = %config.kafka_bootstrap, topic = %config.audit_topic, "publishing audit events to kafka");
    Ok(Arc::new(KafkaAuditSink::new(producer, config.audit_topic.clone())))
}

#[cfg(not(feature = "kafka"))]
fn audit_sink(_config: &GatewayConfig) -> anyhow::Result<Arc<dyn AuditSink>> {
    Ok(Arc::new(common_audit::TracingAuditSink))
}

fn build_cors(allowed_origins: &[String]) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            allowed_origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        ))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([ACCEPT, CONTENT_TYPE, AUTHORIZATION])
}
