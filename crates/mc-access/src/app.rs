//! App Container
//!
//! Owns the session store, role resolver, navigator and dashboard shell and
//! wires them together. One per browser context, shared by `Arc`.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

use mc_common::{AuthError, DirectoryError, Notice, Session, UserRecord};
use mc_config::GateConfig;

use crate::dashboard::DashboardShell;
use crate::directory::UserDirectory;
use crate::guard::{AccessPolicy, RedirectTargets};
use crate::identity::{FederatedProvider, IdentityProvider};
use crate::navigator::{Navigation, Navigator};
use crate::notice::Notifier;
use crate::role::{RoleCacheSettings, RoleResolver, RoleState};
use crate::routes::{normalize_path, Route};
use crate::session::{SessionState, SessionStore};

/// Upper bound on how long a navigation waits for its guard
pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(15);

pub struct App {
    directory: Arc<dyn UserDirectory>,
    notifier: Notifier,
    sessions: Arc<SessionStore>,
    roles: RoleResolver,
    navigator: Arc<Navigator>,
    dashboard: DashboardShell,
    settle_timeout: Duration,
}

impl App {
    pub fn new(
        config: &GateConfig,
        identity: Arc<dyn IdentityProvider>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        let notifier = Notifier::new();
        let sessions = Arc::new(SessionStore::new(identity, notifier.clone()));
        let roles = RoleResolver::new(directory.clone(), RoleCacheSettings::from(&config.roles));
        let navigator = Arc::new(Navigator::new(
            AccessPolicy::from(&config.policy),
            RedirectTargets::from(&config.routes),
        ));
        let dashboard = DashboardShell::new(sessions.clone(), roles.clone(), navigator.clone());

        Self {
            directory,
            notifier,
            sessions,
            roles,
            navigator,
            dashboard,
            settle_timeout: DEFAULT_SETTLE_TIMEOUT,
        }
    }

    pub fn with_settle_timeout(mut self, timeout: Duration) -> Self {
        self.settle_timeout = timeout;
        self
    }

    /// Subscribe to the identity provider and start following the session
    pub fn start(&self) {
        self.sessions.start();
        self.roles.bind(self.sessions.watch());
        info!("Access layer started");
    }

    pub fn shutdown(&self) {
        self.roles.dispose();
        self.sessions.dispose();
        info!("Access layer stopped");
    }

    pub fn session(&self) -> SessionState {
        self.sessions.current()
    }

    pub fn role(&self) -> RoleState {
        self.roles.state()
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn roles(&self) -> &RoleResolver {
        &self.roles
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn dashboard(&self) -> &DashboardShell {
        &self.dashboard
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notifier.subscribe()
    }

    /// Navigate to `path`. Gives up with [`Navigation::Loading`] if the guard
    /// has not settled within the settle timeout.
    pub async fn navigate(&self, path: &str) -> Navigation {
        let mut session_rx = self.sessions.watch();
        let mut role_rx = self.roles.watch();

        let navigation = self.navigator.navigate(path, &mut session_rx, &mut role_rx);
        match tokio::time::timeout(self.settle_timeout, navigation).await {
            Ok(navigation) => navigation,
            Err(_) => {
                warn!(path = %path, timeout = ?self.settle_timeout, "Guard did not settle in time");
                Navigation::Loading { path: normalize_path(path) }
            }
        }
    }

    /// Password sign-in. Returns the location to continue at.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<String, AuthError> {
        self.sessions.sign_in(email, password).await?;
        Ok(self.navigator.after_sign_in())
    }

    /// Google sign-in. First-time users get a participant record.
    pub async fn sign_in_with_google(&self) -> Result<String, AuthError> {
        let session = self.sessions.sign_in_with_federated(FederatedProvider::Google).await?;

        if let Err(e) = self.ensure_user_record(&session).await {
            warn!(error = %e, "Could not verify user record after Google sign-in");
            self.notifier.error(e.message());
            return Err(e.into());
        }

        self.notifier.success("Signed in successfully!");
        Ok(self.navigator.after_sign_in())
    }

    /// Create an account, set its profile and store its participant record
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: Option<String>,
        photo_url: Option<String>,
    ) -> Result<String, AuthError> {
        let session = self
            .sessions
            .create_account(email, password, display_name.clone(), photo_url.clone())
            .await?;

        let record_email = session.email.clone().unwrap_or_else(|| email.to_string());
        let record = UserRecord::new_participant(record_email, display_name, photo_url);
        if let Err(e) = self.directory.create_user(&record).await {
            warn!(email = %email, error = %e, "Failed to store user record");
            self.notifier.error("Registration failed. Please try again.");
            return Err(e.into());
        }

        Ok(self.navigator.after_sign_in())
    }

    pub async fn logout(&self) -> Route {
        self.dashboard.logout().await
    }

    async fn ensure_user_record(&self, session: &Session) -> Result<(), RecordError> {
        let Some(email) = session.email.as_deref() else {
            // Nothing to key a record on
            return Ok(());
        };

        let existing = self.directory.find_user(email).await.map_err(RecordError::Lookup)?;
        if existing.is_some() {
            return Ok(());
        }

        let record = UserRecord::new_participant(email, session.display_name.clone(), session.photo_url.clone());
        self.directory.create_user(&record).await.map_err(RecordError::Create)?;
        info!(email = %email, "Created user record for first Google sign-in");
        Ok(())
    }
}

/// Which step of the first-sign-in record check failed
#[derive(Debug, thiserror::Error)]
enum RecordError {
    #[error("user lookup failed: {0}")]
    Lookup(DirectoryError),
    #[error("user creation failed: {0}")]
    Create(DirectoryError),
}

impl RecordError {
    fn message(&self) -> &'static str {
        match self {
            RecordError::Lookup(_) => "Something went wrong",
            RecordError::Create(_) => "Google Sign-in failed.",
        }
    }
}

impl From<RecordError> for AuthError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::Lookup(e) | RecordError::Create(e) => AuthError::Directory(e),
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.roles.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryIdentityProvider;
    use async_trait::async_trait;
    use mc_common::{NoticeLevel, RoleRecord};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingDirectory {
        users: Mutex<Vec<UserRecord>>,
        fail_lookups: bool,
    }

    #[async_trait]
    impl UserDirectory for RecordingDirectory {
        async fn find_role(&self, email: &str) -> Result<Option<RoleRecord>, DirectoryError> {
            Ok(self
                .users
                .lock()
                .iter()
                .find(|u| u.email == email)
                .map(|u| RoleRecord { role: u.role.clone() }))
        }

        async fn find_user(&self, email: &str) -> Result<Option<UserRecord>, DirectoryError> {
            if self.fail_lookups {
                return Err(DirectoryError::status(500, "/users"));
            }
            Ok(self.users.lock().iter().find(|u| u.email == email).cloned())
        }

        async fn create_user(&self, record: &UserRecord) -> Result<(), DirectoryError> {
            self.users.lock().push(record.clone());
            Ok(())
        }
    }

    fn app(directory: Arc<RecordingDirectory>) -> (Arc<MemoryIdentityProvider>, App) {
        let idp = Arc::new(MemoryIdentityProvider::new());
        idp.add_account("carol@example.com", "secret3", Some("Carol"));
        idp.link_federated(FederatedProvider::Google, "carol@example.com", Some("Carol"));
        let app = App::new(&GateConfig::default(), idp.clone(), directory);
        (idp, app)
    }

    #[tokio::test]
    async fn test_register_stores_participant_record() {
        let directory = Arc::new(RecordingDirectory::default());
        let (_idp, app) = app(directory.clone());

        let next = app
            .register("dave@example.com", "secret4", Some("Dave".to_string()), None)
            .await
            .unwrap();
        assert_eq!(next, "/");

        let users = directory.users.lock();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "dave@example.com");
        assert_eq!(users[0].role.as_deref(), Some("user"));
        assert_eq!(users[0].name.as_deref(), Some("Dave"));
    }

    #[tokio::test]
    async fn test_google_sign_in_creates_record_once() {
        let directory = Arc::new(RecordingDirectory::default());
        let (_idp, app) = app(directory.clone());

        app.sign_in_with_google().await.unwrap();
        app.logout().await;
        app.sign_in_with_google().await.unwrap();
        assert_eq!(directory.users.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_google_sign_in_reports_directory_failure() {
        let directory = Arc::new(RecordingDirectory { fail_lookups: true, ..Default::default() });
        let (_idp, app) = app(directory.clone());
        let mut notices = app.notices();

        let err = app.sign_in_with_google().await.unwrap_err();
        assert!(matches!(err, AuthError::Directory(_)));
        let notice = notices.recv().await.unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.message, "Something went wrong");
        assert!(directory.users.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigate_times_out_to_loading() {
        let directory = Arc::new(RecordingDirectory::default());
        let (_idp, app) = app(directory);
        // Never started, so the session stays resolving
        let app = app.with_settle_timeout(Duration::from_secs(2));

        let navigation = app.navigate("/dashboard/").await;
        assert_eq!(navigation, Navigation::Loading { path: "/dashboard".to_string() });
    }
}
