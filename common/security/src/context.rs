use std::sync::Arc;

use common_audit::{AuditSink, TracingAuditSink};
use common_auth::IdentityProvider;

use crate::store::DocumentStore;

/// Fallback super-admin uid for deployments where the `superAdmin` claim has
/// not propagated yet. Not a secret; override with `SUPER_ADMIN_UID`.
pub const DEFAULT_SUPER_ADMIN_UID: &str = "vsd-super-admin";

/// Handles the access checks need, built once by the composition root and
/// shared by reference with resolvers and guards.
#[derive(Clone)]
pub struct AccessContext {
    pub store: Arc<dyn DocumentStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub audit: Arc<dyn AuditSink>,
    pub super_admin_uid: String,
    pub source_service: String,
}

impl AccessContext {
    pub fn new(store: Arc<dyn DocumentStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            store,
            identity,
            audit: Arc::new(TracingAuditSink),
            super_admin_uid: DEFAULT_SUPER_ADMIN_UID.to_string(),
            source_service: "vsd-network".to_string(),
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_super_admin_uid(mut self, uid: impl Into<String>) -> Self {
        self.super_admin_uid = uid.into();
        self
    }

    pub fn with_source_service(mut self, name: impl Into<String>) -> Self {
        self.source_service = name.into();
        self
    }
}
