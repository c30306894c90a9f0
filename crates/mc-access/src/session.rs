//! Session Store
//!
//! Single source of truth for who is signed in. State machine:
//!
//! ```text
//! Resolving ──(provider reports)──► Authenticated | Anonymous
//! Anonymous ──sign-in──► Authenticated
//! Authenticated ──sign-out / external loss──► Anonymous
//! ```
//!
//! The store subscribes to the identity provider once in [`SessionStore::start`]
//! and unsubscribes in [`SessionStore::dispose`] (or on drop).

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use mc_common::{AuthError, ProfileUpdate, Session};

use crate::identity::{FederatedProvider, IdentityProvider};
use crate::notice::Notifier;

/// Current session status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "session", rename_all = "camelCase")]
pub enum SessionState {
    /// Waiting for the provider's first report
    Resolving,
    Authenticated(Session),
    Anonymous,
}

impl SessionState {
    pub fn is_resolving(&self) -> bool {
        matches!(self, SessionState::Resolving)
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    fn from_provider(session: Option<Session>) -> Self {
        match session {
            Some(s) => SessionState::Authenticated(s),
            None => SessionState::Anonymous,
        }
    }
}

pub struct SessionStore {
    identity: Arc<dyn IdentityProvider>,
    notifier: Notifier,
    state: Arc<watch::Sender<SessionState>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionStore {
    pub fn new(identity: Arc<dyn IdentityProvider>, notifier: Notifier) -> Self {
        let (state, _) = watch::channel(SessionState::Resolving);
        Self {
            identity,
            notifier,
            state: Arc::new(state),
            listener: Mutex::new(None),
        }
    }

    /// Subscribe to provider changes. Calling twice is a no-op.
    pub fn start(&self) {
        let mut listener = self.listener.lock();
        if listener.is_some() {
            return;
        }

        let mut subscription = self.identity.subscribe();
        let state = self.state.clone();
        let provider = self.identity.name().to_string();

        *listener = Some(tokio::spawn(async move {
            while let Some(mut change) = subscription.next().await {
                // Skip to the newest report so queued echoes cannot roll state back
                while let Some(newer) = subscription.try_next() {
                    change = newer;
                }
                let next = SessionState::from_provider(change);
                match &next {
                    SessionState::Authenticated(s) => {
                        info!(provider = %provider, email = ?s.email, "Session authenticated")
                    }
                    _ => info!(provider = %provider, "Session anonymous"),
                }
                publish(&state, next);
            }
            debug!(provider = %provider, "Identity subscription closed");
        }));
        debug!(provider = %self.identity.name(), "Session store started");
    }

    /// Unsubscribe from the provider. State is left as it was.
    pub fn dispose(&self) {
        if let Some(handle) = self.listener.lock().take() {
            handle.abort();
            debug!("Session store disposed");
        }
    }

    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn is_resolving(&self) -> bool {
        self.state.borrow().is_resolving()
    }

    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        match self.identity.sign_in_with_password(email, password).await {
            Ok(session) => {
                info!(email = %email, "Signed in");
                self.set_authenticated(session.clone());
                self.notifier.success("Signed in successfully!");
                Ok(session)
            }
            Err(e) => {
                warn!(email = %email, error = %e, "Sign-in failed");
                self.notifier.error(e.to_string());
                Err(e)
            }
        }
    }

    pub async fn sign_in_with_federated(&self, provider: FederatedProvider) -> Result<Session, AuthError> {
        match self.identity.sign_in_with_federated(provider).await {
            Ok(session) => {
                info!(?provider, email = ?session.email, "Signed in with federated provider");
                self.set_authenticated(session.clone());
                Ok(session)
            }
            Err(e) => {
                warn!(?provider, error = %e, "Federated sign-in failed");
                self.notifier.error(e.to_string());
                Err(e)
            }
        }
    }

    /// Create an account and set its profile in one step
    pub async fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: Option<String>,
        photo_url: Option<String>,
    ) -> Result<Session, AuthError> {
        let result = async {
            let session = self.identity.create_account(email, password).await?;
            if display_name.is_none() && photo_url.is_none() {
                return Ok(session);
            }
            self.identity
                .update_profile(&ProfileUpdate { display_name, photo_url })
                .await
        }
        .await;

        match result {
            Ok(session) => {
                info!(email = %email, "Account created");
                self.set_authenticated(session.clone());
                self.notifier.success("Registration Successful! Welcome to Medix Camp.");
                Ok(session)
            }
            Err(e) => {
                warn!(email = %email, error = %e, "Account creation failed");
                self.notifier.error(e.to_string());
                Err(e)
            }
        }
    }

    /// Sign out. Provider errors are only logged; local state is always cleared.
    pub async fn sign_out(&self) {
        match self.identity.sign_out().await {
            Ok(()) => self.notifier.success("Signed out successfully!"),
            Err(e) => warn!(error = %e, "Provider sign-out failed, clearing local session anyway"),
        }
        publish(&self.state, SessionState::Anonymous);
    }

    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<Session, AuthError> {
        match self.identity.update_profile(&update).await {
            Ok(session) => {
                self.set_authenticated(session.clone());
                Ok(session)
            }
            Err(e) => {
                warn!(error = %e, "Profile update failed");
                self.notifier.error(e.to_string());
                Err(e)
            }
        }
    }

    fn set_authenticated(&self, session: Session) {
        publish(&self.state, SessionState::Authenticated(session));
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Publish only real changes so watchers are not woken for echoes
fn publish(state: &watch::Sender<SessionState>, next: SessionState) {
    state.send_if_modified(|current| {
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    });
}
