use std::sync::Arc;

use common_auth::Identity;
use serde::Serialize;
use tracing::{debug, warn};

use crate::context::AccessContext;
use crate::roles::AccountRole;
use crate::store::{AccountRecord, ACCOUNTS_COLLECTION, ADMINS_COLLECTION};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationVerdict {
    pub is_admin: bool,
    pub is_advertiser: bool,
    pub is_loading: bool,
}

impl AuthorizationVerdict {
    pub fn pending() -> Self {
        Self { is_admin: false, is_advertiser: false, is_loading: true }
    }

    pub fn ready(is_admin: bool, is_advertiser: bool) -> Self {
        Self { is_admin, is_advertiser, is_loading: false }
    }
}

/// Works out admin/advertiser status for one identity. Every check fails
/// closed: a lookup that errors counts as "no privilege".
#[derive(Clone)]
pub struct RoleResolver {
    ctx: Arc<AccessContext>,
}

impl RoleResolver {
    pub fn new(ctx: Arc<AccessContext>) -> Self {
        Self { ctx }
    }

    pub async fn resolve(&self, identity: &Identity) -> AuthorizationVerdict {
        let uid = identity.uid.as_str();
        let is_super_admin = self.is_super_admin(identity).await;

        // The two document reads are independent.
        let (is_regular_admin, is_advertiser) = tokio::join!(
            async {
                if is_super_admin {
                    return false;
                }
                self.admin_record_exists(uid).await
            },
            self.account_is_advertiser(uid),
        );

        let verdict = AuthorizationVerdict::ready(is_super_admin || is_regular_admin, is_advertiser);
        debug!(uid, is_super_admin, is_regular_admin, is_advertiser, "resolved authorization verdict");
        verdict
    }

    async fn is_super_admin(&self, identity: &Identity) -> bool {
        let claims_grant = match self.ctx.identity.id_token_result(identity, true).await {
            Ok(result) => result.claims.is_super_admin(),
            Err(err) => {
                warn!(uid = %identity.uid, error = %err, "claim refresh failed; ignoring token claims");
                false
            }
        };
        claims_grant || identity.uid == self.ctx.super_admin_uid
    }

    async fn admin_record_exists(&self, uid: &str) -> bool {
        match self.ctx.store.get_document(ADMINS_COLLECTION, uid).await {
            Ok(snapshot) => snapshot.exists,
            Err(err) => {
                warn!(uid, collection = ADMINS_COLLECTION, error = %err, "admin lookup failed; treating as not admin");
                false
            }
        }
    }

    async fn account_is_advertiser(&self, uid: &str) -> bool {
        let snapshot = match self.ctx.store.get_document(ACCOUNTS_COLLECTION, uid).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(uid, collection = ACCOUNTS_COLLECTION, error = %err, "account lookup failed; treating as not advertiser");
                return false;
            }
        };
        match AccountRecord::from_snapshot(&snapshot) {
            Ok(record) => record.is_some_and(|record| record.has_role(&AccountRole::Advertiser)),
            Err(err) => {
                warn!(uid, error = %err, "unreadable account record; treating as not advertiser");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryDocumentStore;
    use common_auth::{InMemoryIdentityProvider, TokenClaims, CLAIM_SUPER_ADMIN};
    use serde_json::json;

    fn resolver(store: &InMemoryDocumentStore, provider: &InMemoryIdentityProvider) -> RoleResolver {
        let ctx = AccessContext::new(Arc::new(store.clone()), Arc::new(provider.clone()))
            .with_super_admin_uid("ROOT");
        RoleResolver::new(Arc::new(ctx))
    }

    #[tokio::test]
    async fn super_admin_claim_wins_over_empty_store() {
        let store = InMemoryDocumentStore::new();
        let provider = InMemoryIdentityProvider::new();
        provider.set_claims("U5", TokenClaims::new().with(CLAIM_SUPER_ADMIN, json!(true)));

        let verdict = resolver(&store, &provider).resolve(&Identity::new("U5")).await;
        assert_eq!(verdict, AuthorizationVerdict::ready(true, false));
    }

    #[tokio::test]
    async fn stale_claims_are_not_trusted() {
        let store = InMemoryDocumentStore::new();
        let provider = InMemoryIdentityProvider::new();
        // Revoked since the token was minted.
        provider.set_claims("U6", TokenClaims::new().with(CLAIM_SUPER_ADMIN, json!(false)));
        let identity = Identity::new("U6")
            .with_claims(TokenClaims::new().with(CLAIM_SUPER_ADMIN, json!(true)));

        let verdict = resolver(&store, &provider).resolve(&identity).await;
        assert!(!verdict.is_admin);
    }

    #[tokio::test]
    async fn claim_removed_upstream_is_not_trusted() {
        let store = InMemoryDocumentStore::new();
        let provider = InMemoryIdentityProvider::new();
        provider.set_claims("U6", TokenClaims::new());
        let identity = Identity::new("U6")
            .with_claims(TokenClaims::new().with(CLAIM_SUPER_ADMIN, json!(true)));

        let verdict = resolver(&store, &provider).resolve(&identity).await;
        assert_eq!(verdict, AuthorizationVerdict::ready(false, false));
    }

    #[tokio::test]
    async fn super_admin_uid_fallback_without_claims() {
        let store = InMemoryDocumentStore::new();
        let provider = InMemoryIdentityProvider::new();
        provider.set_failing(true);

        let verdict = resolver(&store, &provider).resolve(&Identity::new("ROOT")).await;
        assert!(verdict.is_admin);
        assert!(!verdict.is_loading);
    }

    #[tokio::test]
    async fn super_admin_skips_admin_lookup() {
        let store = InMemoryDocumentStore::new();
        let provider = InMemoryIdentityProvider::new();

        resolver(&store, &provider).resolve(&Identity::new("ROOT")).await;
        assert_eq!(store.reads(), 1, "only the account record should be read");
    }

    #[tokio::test]
    async fn admin_record_grants_admin() {
        let store = InMemoryDocumentStore::new();
        store.insert(ADMINS_COLLECTION, "U2", json!({}));
        let provider = InMemoryIdentityProvider::new();

        let resolver = resolver(&store, &provider);
        assert!(resolver.resolve(&Identity::new("U2")).await.is_admin);
        assert!(!resolver.resolve(&Identity::new("U3")).await.is_admin);
    }

    #[tokio::test]
    async fn advertiser_role_read_from_account() {
        let store = InMemoryDocumentStore::new();
        store.insert(ACCOUNTS_COLLECTION, "A1", json!({ "roles": ["user", "advertiser"] }));
        store.insert(ACCOUNTS_COLLECTION, "A2", json!({ "roles": ["user"] }));
        store.insert(ACCOUNTS_COLLECTION, "A3", json!({ "walletAddress": "0x1" }));
        let provider = InMemoryIdentityProvider::new();
        let resolver = resolver(&store, &provider);

        assert!(resolver.resolve(&Identity::new("A1")).await.is_advertiser);
        assert!(!resolver.resolve(&Identity::new("A2")).await.is_advertiser);
        assert!(!resolver.resolve(&Identity::new("A3")).await.is_advertiser);
        assert!(!resolver.resolve(&Identity::new("nobody")).await.is_advertiser);
    }

    #[tokio::test]
    async fn unreachable_store_fails_closed() {
        let store = InMemoryDocumentStore::new();
        store.insert(ADMINS_COLLECTION, "U2", json!({}));
        store.insert(ACCOUNTS_COLLECTION, "U2", json!({ "roles": ["advertiser"] }));
        store.set_unavailable(true);
        let provider = InMemoryIdentityProvider::new();

        let verdict = resolver(&store, &provider).resolve(&Identity::new("U2")).await;
        assert_eq!(verdict, AuthorizationVerdict::ready(false, false));
    }
}
