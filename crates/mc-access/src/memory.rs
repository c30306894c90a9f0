//! In-Memory Identity Provider
//!
//! Process-local stand-in for the hosted identity service. Used by the dev
//! shell and by tests. Supports injected failures and simulated changes from
//! another tab (`expire_session`, `restore_session`).

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tokio::sync::mpsc;
use tracing::{debug, info};

use mc_common::{AuthError, ProfileUpdate, Session};

use crate::identity::{FederatedProvider, IdentityProvider, IdentitySubscription};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone)]
struct Account {
    uid: String,
    email: String,
    password: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
}

impl Account {
    fn session(&self) -> Session {
        Session {
            uid: self.uid.clone(),
            email: Some(self.email.clone()),
            display_name: self.display_name.clone(),
            photo_url: self.photo_url.clone(),
            id_token: uuid::Uuid::new_v4().to_string(),
            signed_in_at: chrono::Utc::now(),
        }
    }
}

#[derive(Default)]
struct Inner {
    /// Keyed by lowercased email
    accounts: HashMap<String, Account>,
    /// Email the federated popup "returns" for each provider
    federated: HashMap<FederatedProvider, String>,
    current: Option<Session>,
    subscribers: Vec<mpsc::UnboundedSender<Option<Session>>>,
    failures: VecDeque<AuthError>,
}

impl Inner {
    fn publish(&mut self) {
        let current = self.current.clone();
        self.subscribers.retain(|tx| tx.send(current.clone()).is_ok());
    }

    fn take_failure(&mut self) -> Result<(), AuthError> {
        match self.failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn sign_in(&mut self, account: &Account) -> Session {
        let session = account.session();
        self.current = Some(session.clone());
        self.publish();
        session
    }
}

/// Identity provider backed by a process-local account table
#[derive(Default)]
pub struct MemoryIdentityProvider {
    inner: Mutex<Inner>,
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(self, email: &str, password: &str, display_name: Option<&str>) -> Self {
        self.add_account(email, password, display_name);
        self
    }

    pub fn add_account(&self, email: &str, password: &str, display_name: Option<&str>) {
        let key = email.trim().to_lowercase();
        let account = Account {
            uid: uuid::Uuid::new_v4().to_string(),
            email: email.trim().to_string(),
            password: Some(password.to_string()),
            display_name: display_name.map(str::to_string),
            photo_url: None,
        };
        self.inner.lock().accounts.insert(key, account);
    }

    /// Configure the account a federated sign-in resolves to
    pub fn link_federated(&self, provider: FederatedProvider, email: &str, display_name: Option<&str>) {
        let key = email.trim().to_lowercase();
        let mut inner = self.inner.lock();
        inner.accounts.entry(key.clone()).or_insert_with(|| Account {
            uid: uuid::Uuid::new_v4().to_string(),
            email: email.trim().to_string(),
            password: None,
            display_name: display_name.map(str::to_string),
            photo_url: None,
        });
        inner.federated.insert(provider, key);
    }

    /// Make the next provider call fail with `err`
    pub fn fail_next(&self, err: AuthError) {
        self.inner.lock().failures.push_back(err);
    }

    /// Simulate the session ending elsewhere (another tab, token revoked)
    pub fn expire_session(&self) {
        let mut inner = self.inner.lock();
        if inner.current.take().is_some() {
            info!("Session expired externally");
            inner.publish();
        }
    }

    /// Simulate a sign-in performed elsewhere
    pub fn restore_session(&self, email: &str) -> Option<Session> {
        let mut inner = self.inner.lock();
        let account = inner.accounts.get(&email.trim().to_lowercase())?.clone();
        Some(inner.sign_in(&account))
    }

    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.subscribers.retain(|tx| !tx.is_closed());
        inner.subscribers.len()
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    fn name(&self) -> &str {
        "memory"
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let mut inner = self.inner.lock();
        inner.take_failure()?;

        let account = inner
            .accounts
            .get(&email.trim().to_lowercase())
            .filter(|a| a.password.as_deref() == Some(password))
            .cloned()
            .ok_or(AuthError::InvalidCredential)?;

        debug!(email = %account.email, "Password sign-in accepted");
        Ok(inner.sign_in(&account))
    }

    async fn sign_in_with_federated(&self, provider: FederatedProvider) -> Result<Session, AuthError> {
        let mut inner = self.inner.lock();
        inner.take_failure()?;

        let account = inner
            .federated
            .get(&provider)
            .and_then(|key| inner.accounts.get(key))
            .cloned()
            .ok_or_else(|| AuthError::provider("Popup closed by user"))?;

        debug!(email = %account.email, ?provider, "Federated sign-in accepted");
        Ok(inner.sign_in(&account))
    }

    async fn create_account(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let mut inner = self.inner.lock();
        inner.take_failure()?;

        let key = email.trim().to_lowercase();
        if inner.accounts.contains_key(&key) {
            return Err(AuthError::EmailInUse { email: email.to_string() });
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword {
                message: format!("Password should be at least {} characters", MIN_PASSWORD_LEN),
            });
        }

        let account = Account {
            uid: uuid::Uuid::new_v4().to_string(),
            email: email.trim().to_string(),
            password: Some(password.to_string()),
            display_name: None,
            photo_url: None,
        };
        inner.accounts.insert(key, account.clone());
        info!(email = %account.email, "Account created");
        Ok(inner.sign_in(&account))
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let mut inner = self.inner.lock();
        inner.take_failure()?;
        if inner.current.take().is_some() {
            inner.publish();
        }
        Ok(())
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<Session, AuthError> {
        let mut inner = self.inner.lock();
        inner.take_failure()?;

        let mut session = inner.current.clone().ok_or(AuthError::NoSession)?;
        update.apply(&mut session);

        if let Some(account) = session
            .email
            .as_deref()
            .and_then(|e| inner.accounts.get_mut(&e.to_lowercase()))
        {
            account.display_name = session.display_name.clone();
            account.photo_url = session.photo_url.clone();
        }

        // Profile edits do not fire a change notification
        inner.current = Some(session.clone());
        Ok(session)
    }

    fn subscribe(&self) -> IdentitySubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        // Deliver the current state first
        if tx.send(inner.current.clone()).is_ok() {
            inner.subscribers.push(tx);
        }
        IdentitySubscription::new(rx)
    }
}
