//! Identity Provider
//!
//! Seam between the session store and whatever service actually owns the
//! credentials. Implementations push session changes through an
//! [`IdentitySubscription`]; dropping the subscription unsubscribes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use mc_common::{AuthError, ProfileUpdate, Session};

/// Federated sign-in providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FederatedProvider {
    Google,
}

/// Stream of session changes from an identity provider.
///
/// Each item is the full current state: `Some(session)` when signed in,
/// `None` when signed out. The provider delivers the state at subscription
/// time as the first item.
pub struct IdentitySubscription {
    rx: mpsc::UnboundedReceiver<Option<Session>>,
}

impl IdentitySubscription {
    pub fn new(rx: mpsc::UnboundedReceiver<Option<Session>>) -> Self {
        Self { rx }
    }

    /// Next change, or `None` once the provider has gone away
    pub async fn next(&mut self) -> Option<Option<Session>> {
        self.rx.recv().await
    }

    /// Next already-delivered change without waiting
    pub fn try_next(&mut self) -> Option<Option<Session>> {
        self.rx.try_recv().ok()
    }
}

/// External identity service
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    async fn sign_in_with_federated(&self, provider: FederatedProvider) -> Result<Session, AuthError>;

    /// Create an account and sign it in
    async fn create_account(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Update the signed-in user's profile and return the updated session
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<Session, AuthError>;

    /// Subscribe to session changes
    fn subscribe(&self) -> IdentitySubscription;
}
