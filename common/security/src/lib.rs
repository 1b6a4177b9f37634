pub mod context;
pub mod error;
pub mod guard;
pub mod resolver;
pub mod roles;
pub mod store;

pub use context::{AccessContext, DEFAULT_SUPER_ADMIN_UID};
pub use error::{StoreError, StoreResult};
pub use guard::{
    DenialReason, GuardDecision, GuardSession, GuardState, GuardTicket, Navigator, RecordingNavigator, RouteGuard,
    RouteRequirement, DASHBOARD_PATH, LOGIN_PATH,
};
pub use resolver::{AuthorizationVerdict, RoleResolver};
pub use roles::AccountRole;
pub use store::{
    AccountRecord, DocumentSnapshot, DocumentStore, FirestoreDocumentStore, InMemoryDocumentStore, ACCOUNTS_COLLECTION,
    ADMINS_COLLECTION,
};
