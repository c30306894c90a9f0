//! Role Resolver
//!
//! Follows the session and keeps the current user's [`Role`] in a watch
//! channel.
//!
//! - No lookup is issued while the session is resolving or anonymous.
//! - Lookups run as spawned tasks. A result is applied only if the email it
//!   was issued for is still the current one; anything else is dropped.
//! - A failed lookup leaves the state loading (or keeps a cached role), never
//!   downgrades it.
//! - The cache is keyed by lowercased email and emptied on sign-out.
//!   Switching users drops the previous user's entry. The directory is always
//!   asked with the email exactly as the session carries it.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use mc_common::{DirectoryError, Role, RoleLookupError, RoleRecord};
use mc_config::RoleCacheConfig;

use crate::directory::UserDirectory;
use crate::session::SessionState;

/// Role of the current session as far as the resolver knows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RoleState {
    /// Nobody to resolve for
    Idle,
    /// Lookup in flight with nothing cached
    Pending { email: String },
    /// `refreshing` is set while a background revalidation runs
    Resolved {
        email: Option<String>,
        role: Role,
        refreshing: bool,
    },
}

impl RoleState {
    /// Role if this state belongs to `email`
    pub fn role_for(&self, email: Option<&str>) -> Option<Role> {
        match self {
            RoleState::Resolved { email: e, role, .. } if e.as_deref() == email => Some(*role),
            _ => None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            RoleState::Resolved { role, .. } => Some(*role),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, RoleState::Pending { .. })
    }
}

/// Cache windows for resolved roles
#[derive(Debug, Clone, Copy)]
pub struct RoleCacheSettings {
    pub stale_after: Duration,
    pub evict_after: Duration,
}

impl Default for RoleCacheSettings {
    fn default() -> Self {
        Self::from(&RoleCacheConfig::default())
    }
}

impl From<&RoleCacheConfig> for RoleCacheSettings {
    fn from(config: &RoleCacheConfig) -> Self {
        Self {
            stale_after: config.stale_after(),
            evict_after: config.evict_after(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedRole {
    role: Role,
    fetched_at: Instant,
}

/// Who the resolver is working for
#[derive(Debug, Clone)]
struct Subject {
    /// Lowercased cache key
    key: String,
    /// Email as the session reports it
    email: String,
}

struct Inner {
    directory: Arc<dyn UserDirectory>,
    settings: RoleCacheSettings,
    cache: DashMap<String, CachedRole>,
    state: watch::Sender<RoleState>,
    /// Guards both lookup issue and completion
    current: Mutex<Option<Subject>>,
    last_error: Mutex<Option<RoleLookupError>>,
    follower: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Clone)]
pub struct RoleResolver {
    inner: Arc<Inner>,
}

impl RoleResolver {
    pub fn new(directory: Arc<dyn UserDirectory>, settings: RoleCacheSettings) -> Self {
        let (state, _) = watch::channel(RoleState::Idle);
        Self {
            inner: Arc::new(Inner {
                directory,
                settings,
                cache: DashMap::new(),
                state,
                current: Mutex::new(None),
                last_error: Mutex::new(None),
                follower: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> RoleState {
        self.inner.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<RoleState> {
        self.inner.state.subscribe()
    }

    pub fn current_role(&self) -> Option<Role> {
        self.inner.state.borrow().role()
    }

    /// Most recent lookup failure, cleared by the next success
    pub fn last_error(&self) -> Option<RoleLookupError> {
        self.inner.last_error.lock().clone()
    }

    /// Follow a session channel until it closes or [`dispose`](Self::dispose) is called
    pub fn bind(&self, mut session_rx: watch::Receiver<SessionState>) {
        let mut follower = self.inner.follower.lock();
        if let Some(previous) = follower.take() {
            previous.abort();
        }

        let resolver = self.clone();
        *follower = Some(tokio::spawn(async move {
            loop {
                let session = session_rx.borrow_and_update().clone();
                resolver.on_session(&session);
                if session_rx.changed().await.is_err() {
                    debug!("Session channel closed, role resolver stops following");
                    break;
                }
            }
        }));
    }

    pub fn dispose(&self) {
        if let Some(handle) = self.inner.follower.lock().take() {
            handle.abort();
        }
    }

    /// React to a session change
    pub fn on_session(&self, session: &SessionState) {
        let mut current = self.inner.current.lock();

        match session {
            SessionState::Resolving => {
                *current = None;
                self.publish(RoleState::Idle);
            }
            SessionState::Anonymous => {
                if current.take().is_some() {
                    debug!("Session ended, clearing role cache");
                }
                self.inner.cache.clear();
                self.publish(RoleState::Idle);
            }
            SessionState::Authenticated(s) => match (s.email_key(), s.email.as_deref()) {
                (None, _) | (_, None) => {
                    // Nothing to look up by
                    *current = None;
                    self.publish(RoleState::Resolved {
                        email: None,
                        role: Role::LEAST_PRIVILEGED,
                        refreshing: false,
                    });
                }
                (Some(key), Some(email)) => {
                    let subject = Subject { key, email: email.trim().to_string() };
                    if current.as_ref().map(|c| c.key.as_str()) == Some(subject.key.as_str()) {
                        return;
                    }
                    if let Some(previous) = current.replace(subject.clone()) {
                        self.inner.cache.remove(&previous.key);
                        debug!(previous = %previous.key, email = %subject.key, "Session switched user");
                    }
                    self.start_lookup(subject, false);
                }
            },
        }
    }

    /// Revalidate the current user's role. Returns false when there is nobody to refresh.
    pub fn refresh(&self) -> bool {
        let current = self.inner.current.lock();
        match current.clone() {
            Some(subject) => {
                self.start_lookup(subject, true);
                true
            }
            None => false,
        }
    }

    /// Drop the cached role for one email
    pub fn invalidate(&self, email: &str) {
        self.inner.cache.remove(&email.to_lowercase());
    }

    /// Drop every cached role
    pub fn clear(&self) {
        self.inner.cache.clear();
    }

    /// Caller must hold `current`
    fn start_lookup(&self, subject: Subject, force: bool) {
        let settings = self.inner.settings;
        let email = subject.key.clone();
        let cached = self
            .inner
            .cache
            .get(&email)
            .map(|entry| (entry.role, entry.fetched_at.elapsed()));

        match cached {
            Some((_, age)) if age >= settings.evict_after => {
                self.inner.cache.remove(&email);
                self.publish(RoleState::Pending { email: email.clone() });
            }
            Some((role, age)) if age < settings.stale_after && !force => {
                debug!(email = %email, %role, "Role served from cache");
                self.publish(RoleState::Resolved { email: Some(email), role, refreshing: false });
                return;
            }
            Some((role, _)) => {
                self.publish(RoleState::Resolved { email: Some(email.clone()), role, refreshing: true });
            }
            None => {
                self.publish(RoleState::Pending { email: email.clone() });
            }
        }

        let resolver = self.clone();
        tokio::spawn(async move {
            let result = resolver.inner.directory.find_role(&subject.email).await;
            resolver.complete(subject.key, result);
        });
    }

    fn complete(&self, email: String, result: Result<Option<RoleRecord>, DirectoryError>) {
        let current = self.inner.current.lock();
        let current_key = current.as_ref().map(|subject| subject.key.as_str());
        if current_key != Some(email.as_str()) {
            debug!(email = %email, current = ?current_key, "Discarding stale role lookup");
            return;
        }

        match result {
            Ok(record) => {
                let role = record.map(RoleRecord::into_role).unwrap_or(Role::LEAST_PRIVILEGED);
                self.inner.cache.insert(
                    email.clone(),
                    CachedRole { role, fetched_at: Instant::now() },
                );
                *self.inner.last_error.lock() = None;
                info!(email = %email, %role, "Role resolved");
                self.publish(RoleState::Resolved { email: Some(email), role, refreshing: false });
            }
            Err(source) => {
                let err = RoleLookupError::new(email.clone(), source);
                warn!(error = %err, "Role lookup failed, role stays unresolved");
                *self.inner.last_error.lock() = Some(err);

                // A cached role survives a failed refresh
                self.inner.state.send_if_modified(|state| match state {
                    RoleState::Resolved { email: Some(e), refreshing, .. } if *e == email && *refreshing => {
                        *refreshing = false;
                        true
                    }
                    _ => false,
                });
            }
        }
    }

    fn publish(&self, next: RoleState) {
        self.inner.state.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
    }
}
