//! Navigator
//!
//! Resolves a requested path to a route, runs its guard and remembers where
//! a sign-in redirect should come back to.

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::guard::{AccessPolicy, Guard, GuardDecision, RedirectTargets};
use crate::role::RoleState;
use crate::routes::Route;
use crate::session::SessionState;

/// Outcome of one navigation attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "navigation", rename_all = "camelCase")]
pub enum Navigation {
    Render { route: Route },
    /// Guard still verifying; show the loading placeholder
    Loading { path: String },
    #[serde(rename_all = "camelCase")]
    Redirect { to: String, return_to: Option<String> },
}

impl Navigation {
    pub fn is_loading(&self) -> bool {
        matches!(self, Navigation::Loading { .. })
    }
}

pub struct Navigator {
    policy: AccessPolicy,
    targets: RedirectTargets,
    location: Mutex<String>,
    return_to: Mutex<Option<String>>,
}

impl Navigator {
    pub fn new(policy: AccessPolicy, targets: RedirectTargets) -> Self {
        let location = Mutex::new(targets.home.clone());
        Self {
            policy,
            targets,
            location,
            return_to: Mutex::new(None),
        }
    }

    /// Last rendered or redirected-to location
    pub fn location(&self) -> String {
        self.location.lock().clone()
    }

    /// Path a pending sign-in will return to
    pub fn return_to(&self) -> Option<String> {
        self.return_to.lock().clone()
    }

    pub fn guard_for(&self, route: &Route) -> Option<Guard> {
        route
            .guard()
            .map(|kind| Guard::new(kind, self.policy, self.targets.clone()))
    }

    /// Decide with the state at hand, without waiting
    pub fn decide(&self, path: &str, session: &SessionState, role: &RoleState) -> Navigation {
        let route = Route::parse(path);
        let decision = match self.guard_for(&route) {
            Some(guard) => guard.evaluate(session, role, &route.path()),
            None => GuardDecision::Allowed,
        };
        self.apply(route, decision)
    }

    /// Navigate to `path`, waiting for the guard to settle
    pub async fn navigate(
        &self,
        path: &str,
        session_rx: &mut watch::Receiver<SessionState>,
        role_rx: &mut watch::Receiver<RoleState>,
    ) -> Navigation {
        let route = Route::parse(path);
        let decision = match self.guard_for(&route) {
            Some(guard) => guard.settle(session_rx, role_rx, &route.path()).await,
            None => GuardDecision::Allowed,
        };
        self.apply(route, decision)
    }

    /// Where to go once sign-in succeeds. Consumes the stored return path.
    pub fn after_sign_in(&self) -> String {
        let target = self
            .return_to
            .lock()
            .take()
            .unwrap_or_else(|| self.targets.home.clone());
        *self.location.lock() = target.clone();
        target
    }

    /// Unguarded jump, e.g. home after logout. Drops any pending return path.
    pub fn go(&self, path: &str) -> Route {
        let route = Route::parse(path);
        self.return_to.lock().take();
        *self.location.lock() = route.path();
        route
    }

    pub fn home(&self) -> &str {
        &self.targets.home
    }

    fn apply(&self, route: Route, decision: GuardDecision) -> Navigation {
        match decision {
            GuardDecision::Allowed => {
                debug!(path = %route.path(), "Rendering route");
                if !self.is_sign_in_flow(&route) {
                    self.return_to.lock().take();
                }
                *self.location.lock() = route.path();
                Navigation::Render { route }
            }
            GuardDecision::Verifying => Navigation::Loading { path: route.path() },
            GuardDecision::DeniedUnauthenticated { redirect_to, return_to } => {
                info!(path = %return_to, redirect = %redirect_to, "Sign-in required");
                *self.return_to.lock() = Some(return_to.clone());
                *self.location.lock() = redirect_to.clone();
                Navigation::Redirect { to: redirect_to, return_to: Some(return_to) }
            }
            GuardDecision::DeniedUnauthorized { redirect_to } => {
                info!(path = %route.path(), redirect = %redirect_to, "Role not permitted");
                self.return_to.lock().take();
                *self.location.lock() = redirect_to.clone();
                Navigation::Redirect { to: redirect_to, return_to: None }
            }
        }
    }

    /// Pages a redirected user passes through on the way to signing in
    fn is_sign_in_flow(&self, route: &Route) -> bool {
        matches!(route, Route::Register) || route.path() == self.targets.sign_in
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(AccessPolicy::default(), RedirectTargets::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::DashboardView;
    use mc_common::{Role, Session};
    use std::time::Duration;

    fn alice() -> SessionState {
        SessionState::Authenticated(Session::new("uid-a", Some("alice@example.com".to_string())))
    }

    fn alice_as(role: Role) -> RoleState {
        RoleState::Resolved { email: Some("alice@example.com".to_string()), role, refreshing: false }
    }

    #[test]
    fn test_public_routes_render_for_anyone() {
        let nav = Navigator::default();
        let outcome = nav.decide("/available-camps", &SessionState::Resolving, &RoleState::Idle);
        assert_eq!(outcome, Navigation::Render { route: Route::AvailableCamps });
        assert_eq!(nav.location(), "/available-camps");
    }

    #[test]
    fn test_sign_in_redirect_records_return_path() {
        let nav = Navigator::default();
        let outcome = nav.decide("/dashboard/manage-camps/", &SessionState::Anonymous, &RoleState::Idle);
        assert_eq!(
            outcome,
            Navigation::Redirect {
                to: "/join-us".to_string(),
                return_to: Some("/dashboard/manage-camps".to_string()),
            }
        );
        assert_eq!(nav.return_to().as_deref(), Some("/dashboard/manage-camps"));

        assert_eq!(nav.after_sign_in(), "/dashboard/manage-camps");
        // Consumed
        assert_eq!(nav.return_to(), None);
        assert_eq!(nav.after_sign_in(), "/");
    }

    #[test]
    fn test_return_path_survives_only_the_sign_in_flow() {
        let nav = Navigator::default();
        nav.decide("/dashboard/manage-camps", &SessionState::Anonymous, &RoleState::Idle);

        // Arriving at sign-in or register through the redirect keeps it
        nav.decide("/join-us", &SessionState::Anonymous, &RoleState::Idle);
        nav.decide("/register", &SessionState::Anonymous, &RoleState::Idle);
        assert_eq!(nav.return_to().as_deref(), Some("/dashboard/manage-camps"));

        // Wandering off drops it, so a later direct visit to sign-in goes home
        nav.decide("/about-us", &SessionState::Anonymous, &RoleState::Idle);
        nav.decide("/join-us", &SessionState::Anonymous, &RoleState::Idle);
        assert_eq!(nav.return_to(), None);
        assert_eq!(nav.after_sign_in(), "/");
    }

    #[test]
    fn test_go_drops_return_path() {
        let nav = Navigator::default();
        nav.decide("/dashboard", &SessionState::Anonymous, &RoleState::Idle);
        assert!(nav.return_to().is_some());

        nav.go("/");
        assert_eq!(nav.after_sign_in(), "/");
    }

    #[test]
    fn test_forbidden_redirect_keeps_no_return_path() {
        let nav = Navigator::default();
        let outcome = nav.decide("/dashboard/registered-camps", &alice(), &alice_as(Role::Organizer));
        assert_eq!(outcome, Navigation::Redirect { to: "/forbidden".to_string(), return_to: None });
        assert_eq!(nav.return_to(), None);
        assert_eq!(nav.location(), "/forbidden");
    }

    #[test]
    fn test_loading_does_not_move_location() {
        let nav = Navigator::default();
        nav.go("/about-us");
        let pending = RoleState::Pending { email: "alice@example.com".to_string() };
        let outcome = nav.decide("/dashboard/add-camp", &alice(), &pending);
        assert!(outcome.is_loading());
        assert_eq!(nav.location(), "/about-us");
    }

    #[tokio::test]
    async fn test_navigate_waits_for_role() {
        let nav = Navigator::default();
        let (session_tx, mut session_rx) = watch::channel(alice());
        let (role_tx, mut role_rx) = watch::channel(RoleState::Pending { email: "alice@example.com".to_string() });

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            role_tx.send_replace(alice_as(Role::Organizer));
            drop(session_tx);
        });

        let outcome = nav.navigate("/dashboard/add-camp", &mut session_rx, &mut role_rx).await;
        assert_eq!(outcome, Navigation::Render { route: Route::Dashboard { view: DashboardView::AddCamp } });
    }
}
