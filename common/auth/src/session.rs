//! Current-user state and change subscriptions.
//!
//! The session starts in the loading state until the first sign-in or
//! sign-out is reported, so consumers can hold off redirects until the
//! identity is actually known.

use serde::Serialize;
use tokio::sync::watch;

use crate::identity::Identity;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    pub identity: Option<Identity>,
    pub loading: bool,
}

impl AuthState {
    pub fn loading() -> Self {
        Self {
            identity: None,
            loading: true,
        }
    }

    pub fn signed_in(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            loading: false,
        }
    }

    pub fn signed_out() -> Self {
        Self {
            identity: None,
            loading: false,
        }
    }
}

/// Owns the authoritative [`AuthState`]; created once by the composition root.
pub struct IdentitySession {
    state: watch::Sender<AuthState>,
}

impl Default for IdentitySession {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentitySession {
    pub fn new() -> Self {
        let (state, _) = watch::channel(AuthState::loading());
        Self { state }
    }

    pub fn current(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.state.borrow().identity.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn sign_in(&self, identity: Identity) {
        self.state.send_replace(AuthState::signed_in(identity));
    }

    pub fn sign_out(&self) {
        self.state.send_replace(AuthState::signed_out());
    }

    pub fn watch(&self) -> IdentitySubscription {
        IdentitySubscription {
            rx: Some(self.state.subscribe()),
        }
    }
}

/// Handle returned by [`IdentitySession::watch`]. Once unsubscribed it never
/// yields another state.
pub struct IdentitySubscription {
    rx: Option<watch::Receiver<AuthState>>,
}

impl IdentitySubscription {
    /// Latest state, or `None` after unsubscribe.
    pub fn current(&self) -> Option<AuthState> {
        self.rx.as_ref().map(|rx| rx.borrow().clone())
    }

    /// Wait for the next state change. Returns `None` when unsubscribed or
    /// when the session has been dropped.
    pub async fn changed(&mut self) -> Option<AuthState> {
        let rx = self.rx.as_mut()?;
        if rx.changed().await.is_ok() {
            return Some(rx.borrow_and_update().clone());
        }
        self.rx = None;
        None
    }

    pub fn unsubscribe(&mut self) {
        self.rx = None;
    }

    pub fn is_active(&self) -> bool {
        self.rx.is_some()
    }
}
