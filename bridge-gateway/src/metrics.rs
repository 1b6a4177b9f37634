use anyhow::Result;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct GatewayMetrics {
    registry: Registry,
    bridge_requests: IntCounterVec,
    internal_auth: IntCounterVec,
    guard_decisions: IntCounterVec,
}

impl GatewayMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let bridge_requests = IntCounterVec::new(
            Opts::new("bridge_requests_total", "Bridge and internal relay requests by endpoint and outcome"),
            &["endpoint", "outcome"],
        )?;
        let internal_auth = IntCounterVec::new(
            Opts::new(
                "bridge_internal_auth_total",
                "Internal route key checks grouped by result",
            ),
            &["result"],
        )?;
        let guard_decisions = IntCounterVec::new(
            Opts::new("access_guard_decisions_total", "Route guard decisions by route"),
            &["route", "decision"],
        )?;
        registry.register(Box::new(bridge_requests.clone()))?;
        registry.register(Box::new(internal_auth.clone()))?;
        registry.register(Box::new(guard_decisions.clone()))?;
        Ok(Self {
            registry,
            bridge_requests,
            internal_auth,
            guard_decisions,
        })
    }

    pub fn record_bridge(&self, endpoint: &str, outcome: &str) {
        self.bridge_requests.with_label_values(&[endpoint, outcome]).inc();
    }

    /// Relayed responses are bucketed by status class to keep cardinality flat.
    pub fn record_relayed(&self, endpoint: &str, status: StatusCode) {
        let outcome = if status.is_success() {
            "ok"
        } else if status.is_client_error() {
            "upstream_4xx"
        } else {
            "upstream_5xx"
        };
        self.record_bridge(endpoint, outcome);
    }

    pub fn record_internal_auth(&self, result: &str) {
        self.internal_auth.with_label_values(&[result]).inc();
    }

    pub fn record_guard(&self, route: &str, decision: &str) {
        self.guard_decisions.with_label_values(&[route, decision]).inc();
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}
