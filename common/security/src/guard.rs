//! Route guarding: decide whether the current identity may see a protected
//! route, and send it elsewhere when it may not.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use common_audit::{AuditActor, AuditEvent};
use common_auth::{AuthState, Identity, IdentitySubscription};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::context::AccessContext;
use crate::resolver::{AuthorizationVerdict, RoleResolver};

pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/dashboard";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRequirement {
    #[serde(default)]
    pub admin_only: bool,
    #[serde(default)]
    pub advertiser_only: bool,
}

impl RouteRequirement {
    pub fn admin_only() -> Self {
        Self { admin_only: true, advertiser_only: false }
    }

    pub fn advertiser_only() -> Self {
        Self { admin_only: false, advertiser_only: true }
    }

    /// Admin is checked before advertiser.
    pub fn unmet_by(&self, verdict: &AuthorizationVerdict) -> Option<DenialReason> {
        if self.admin_only && !verdict.is_admin {
            return Some(DenialReason::AdminRequired);
        }
        if self.advertiser_only && !verdict.is_advertiser {
            return Some(DenialReason::AdvertiserRequired);
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    AdminRequired,
    AdvertiserRequired,
}

impl DenialReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialReason::AdminRequired => "admin_required",
            DenialReason::AdvertiserRequired => "advertiser_required",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "reason")]
pub enum GuardDecision {
    Pending,
    RedirectLogin,
    Denied(DenialReason),
    Allowed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardState {
    pub is_loading: bool,
    pub is_admin: bool,
    pub is_advertiser: bool,
    pub decision: GuardDecision,
}

impl GuardState {
    pub fn pending() -> Self {
        let verdict = AuthorizationVerdict::pending();
        Self {
            is_loading: verdict.is_loading,
            is_admin: verdict.is_admin,
            is_advertiser: verdict.is_advertiser,
            decision: GuardDecision::Pending,
        }
    }

    // Redirect outcomes keep is_loading set; only Allowed clears it.
    fn redirected_to_login() -> Self {
        Self { decision: GuardDecision::RedirectLogin, ..Self::pending() }
    }

    fn denied(verdict: AuthorizationVerdict, reason: DenialReason) -> Self {
        Self {
            is_loading: true,
            is_admin: verdict.is_admin,
            is_advertiser: verdict.is_advertiser,
            decision: GuardDecision::Denied(reason),
        }
    }

    fn allowed(verdict: AuthorizationVerdict) -> Self {
        Self {
            is_loading: false,
            is_admin: verdict.is_admin,
            is_advertiser: verdict.is_advertiser,
            decision: GuardDecision::Allowed,
        }
    }

    pub fn can_render(&self) -> bool {
        self.decision == GuardDecision::Allowed
    }

    pub fn redirect_target(&self) -> Option<&'static str> {
        match self.decision {
            GuardDecision::RedirectLogin => Some(LOGIN_PATH),
            GuardDecision::Denied(_) => Some(DASHBOARD_PATH),
            GuardDecision::Pending | GuardDecision::Allowed => None,
        }
    }
}

pub trait Navigator: Send + Sync {
    fn redirect(&self, path: &str);
}

/// Remembers every redirect it was asked to perform.
#[derive(Clone, Default)]
pub struct RecordingNavigator {
    redirects: Arc<Mutex<Vec<String>>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redirects(&self) -> Vec<String> {
        self.redirects.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn last(&self) -> Option<String> {
        self.redirects.lock().unwrap_or_else(PoisonError::into_inner).last().cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, path: &str) {
        self.redirects.lock().unwrap_or_else(PoisonError::into_inner).push(path.to_string());
    }
}

/// Marks one evaluation cycle. A ticket stops being current as soon as a
/// newer cycle starts or its session closes.
#[derive(Clone)]
pub struct GuardTicket {
    generation: u64,
    counter: Option<Arc<AtomicU64>>,
    closed: Option<Arc<AtomicBool>>,
}

impl GuardTicket {
    /// Ticket for a single, unsupervised evaluation.
    pub fn standalone() -> Self {
        Self { generation: 0, counter: None, closed: None }
    }

    fn issue(counter: &Arc<AtomicU64>, closed: &Arc<AtomicBool>) -> Self {
        let generation = counter.fetch_add(1, Ordering::SeqCst) + 1;
        Self { generation, counter: Some(counter.clone()), closed: Some(closed.clone()) }
    }

    pub fn is_current(&self) -> bool {
        if self.closed.as_ref().is_some_and(|closed| closed.load(Ordering::SeqCst)) {
            return false;
        }
        match &self.counter {
            Some(counter) => counter.load(Ordering::SeqCst) == self.generation,
            None => true,
        }
    }
}

#[derive(Clone)]
pub struct RouteGuard {
    ctx: Arc<AccessContext>,
    resolver: RoleResolver,
    navigator: Arc<dyn Navigator>,
}

impl RouteGuard {
    pub fn new(ctx: Arc<AccessContext>, navigator: Arc<dyn Navigator>) -> Self {
        Self { resolver: RoleResolver::new(ctx.clone()), ctx, navigator }
    }

    pub async fn guard(&self, auth: &AuthState, requirement: RouteRequirement) -> GuardState {
        self.evaluate(auth, requirement, &GuardTicket::standalone()).await
    }

    /// One evaluation cycle. A cycle whose ticket goes stale reports
    /// `Pending` and leaves the navigator alone.
    pub async fn evaluate(&self, auth: &AuthState, requirement: RouteRequirement, ticket: &GuardTicket) -> GuardState {
        if auth.loading {
            return GuardState::pending();
        }
        let Some(identity) = auth.identity.as_ref() else {
            if !ticket.is_current() {
                return GuardState::pending();
            }
            debug!("no identity; redirecting to login");
            self.navigator.redirect(LOGIN_PATH);
            return GuardState::redirected_to_login();
        };

        let verdict = self.resolver.resolve(identity).await;
        if !ticket.is_current() {
            return GuardState::pending();
        }

        match requirement.unmet_by(&verdict) {
            Some(reason) => {
                warn!(
                    uid = %identity.uid,
                    admin_only = requirement.admin_only,
                    advertiser_only = requirement.advertiser_only,
                    reason = reason.as_str(),
                    "route access denied"
                );
                self.record_denial(identity, requirement, reason).await;
                if !ticket.is_current() {
                    return GuardState::pending();
                }
                self.navigator.redirect(DASHBOARD_PATH);
                GuardState::denied(verdict, reason)
            }
            None => GuardState::allowed(verdict),
        }
    }

    async fn record_denial(&self, identity: &Identity, requirement: RouteRequirement, reason: DenialReason) {
        let actor = AuditActor {
            uid: Some(identity.uid.clone()),
            email: identity.email.clone(),
            display_name: identity.display_name.clone(),
        };
        let event = AuditEvent::access_denied(
            actor,
            &self.ctx.source_service,
            json!({ "requirement": requirement, "reason": reason }),
        );
        if let Err(err) = self.ctx.audit.emit(event).await {
            warn!(uid = %identity.uid, error = %err, "failed to emit access-denied audit event");
        }
    }
}

enum Change {
    Identity(AuthState),
    Requirement(RouteRequirement),
    Closed,
}

enum Wake {
    Identity(Option<AuthState>),
    Requirement(bool),
}

async fn next_change(
    identity: &mut IdentitySubscription,
    requirement: &mut watch::Receiver<RouteRequirement>,
) -> Change {
    let wake = tokio::select! {
        state = identity.changed() => Wake::Identity(state),
        res = requirement.changed() => Wake::Requirement(res.is_ok()),
    };
    match wake {
        Wake::Identity(Some(state)) => Change::Identity(state),
        Wake::Requirement(true) => Change::Requirement(*requirement.borrow_and_update()),
        Wake::Identity(None) | Wake::Requirement(false) => Change::Closed,
    }
}

enum Cycle {
    Evaluated(GuardState),
    Interrupted(Change),
}

/// Keeps a guard decision current for a long-lived view. Re-evaluates on
/// every identity or requirement change; dropping the session (or the
/// requirement sender, or the identity subscription) ends it.
pub struct GuardSession {
    view: watch::Receiver<GuardState>,
    closed: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl GuardSession {
    pub fn spawn(
        guard: Arc<RouteGuard>,
        identity: IdentitySubscription,
        requirement: watch::Receiver<RouteRequirement>,
    ) -> Self {
        Self::spawn_inner(guard, identity, requirement, None)
    }

    /// Session for a route whose requirement never changes.
    pub fn spawn_fixed(guard: Arc<RouteGuard>, identity: IdentitySubscription, requirement: RouteRequirement) -> Self {
        let (tx, rx) = watch::channel(requirement);
        Self::spawn_inner(guard, identity, rx, Some(tx))
    }

    fn spawn_inner(
        guard: Arc<RouteGuard>,
        mut identity: IdentitySubscription,
        mut requirement: watch::Receiver<RouteRequirement>,
        keepalive: Option<watch::Sender<RouteRequirement>>,
    ) -> Self {
        let (publish, view) = watch::channel(GuardState::pending());
        let closed = Arc::new(AtomicBool::new(false));
        let counter = Arc::new(AtomicU64::new(0));
        let task_closed = closed.clone();

        let task = tokio::spawn(async move {
            let _keepalive = keepalive;
            let Some(mut auth) = identity.current() else {
                return;
            };
            let mut current = *requirement.borrow_and_update();

            loop {
                let ticket = GuardTicket::issue(&counter, &task_closed);
                if !ticket.is_current() {
                    break;
                }
                publish.send_replace(GuardState::pending());

                let cycle = tokio::select! {
                    state = guard.evaluate(&auth, current, &ticket) => Cycle::Evaluated(state),
                    change = next_change(&mut identity, &mut requirement) => Cycle::Interrupted(change),
                };
                let change = match cycle {
                    Cycle::Evaluated(state) => {
                        if ticket.is_current() {
                            publish.send_replace(state);
                        }
                        next_change(&mut identity, &mut requirement).await
                    }
                    Cycle::Interrupted(change) => {
                        debug!("guard inputs changed mid-evaluation; discarding cycle");
                        change
                    }
                };
                match change {
                    Change::Identity(state) => auth = state,
                    Change::Requirement(next) => current = next,
                    Change::Closed => break,
                }
            }
        });

        Self { view, closed, task }
    }

    pub fn state(&self) -> GuardState {
        *self.view.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<GuardState> {
        self.view.clone()
    }

    /// Stop re-evaluating. Nothing is published or redirected afterwards.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.task.abort();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for GuardSession {
    fn drop(&mut self) {
        self.close();
    }
}
