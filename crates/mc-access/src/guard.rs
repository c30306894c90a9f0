//! Route Guards
//!
//! One decision function shared by the three guard kinds:
//!
//! | session        | role                    | private | organizer / participant |
//! |----------------|-------------------------|---------|-------------------------|
//! | resolving      | any                     | verify  | verify                  |
//! | anonymous      | any                     | sign-in | sign-in                 |
//! | authenticated  | unresolved / other user | allow   | verify                  |
//! | authenticated  | resolved                | allow   | allow or forbidden      |
//!
//! A denial is final for the navigation that produced it.

use serde::Serialize;
use tokio::sync::watch;

use mc_common::Role;
use mc_config::{PolicyConfig, RoutesConfig};

use crate::role::RoleState;
use crate::session::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardKind {
    /// Any signed-in user
    Private,
    Organizer,
    Participant,
}

/// Which roles each role-gated guard admits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    /// Treat organizers as participants on participant-only routes
    pub participant_admits_organizer: bool,
}

impl From<&PolicyConfig> for AccessPolicy {
    fn from(config: &PolicyConfig) -> Self {
        Self {
            participant_admits_organizer: config.participant_admits_organizer,
        }
    }
}

impl AccessPolicy {
    pub fn permits(&self, kind: GuardKind, role: Role) -> bool {
        match kind {
            GuardKind::Private => true,
            GuardKind::Organizer => role == Role::Organizer,
            GuardKind::Participant => {
                role == Role::Participant || (self.participant_admits_organizer && role == Role::Organizer)
            }
        }
    }
}

/// Where denied navigations are sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTargets {
    pub home: String,
    pub sign_in: String,
    pub forbidden: String,
}

impl Default for RedirectTargets {
    fn default() -> Self {
        Self::from(&RoutesConfig::default())
    }
}

impl From<&RoutesConfig> for RedirectTargets {
    fn from(config: &RoutesConfig) -> Self {
        Self {
            home: config.home.clone(),
            sign_in: config.sign_in.clone(),
            forbidden: config.forbidden.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "camelCase")]
pub enum GuardDecision {
    /// Render the loading placeholder
    Verifying,
    Allowed,
    /// Send to sign-in; `return_to` is where sign-in should come back to
    #[serde(rename_all = "camelCase")]
    DeniedUnauthenticated { redirect_to: String, return_to: String },
    #[serde(rename_all = "camelCase")]
    DeniedUnauthorized { redirect_to: String },
}

impl GuardDecision {
    pub fn is_final(&self) -> bool {
        !matches!(self, GuardDecision::Verifying)
    }
}

#[derive(Debug, Clone)]
pub struct Guard {
    kind: GuardKind,
    policy: AccessPolicy,
    targets: RedirectTargets,
}

impl Guard {
    pub fn new(kind: GuardKind, policy: AccessPolicy, targets: RedirectTargets) -> Self {
        Self { kind, policy, targets }
    }

    pub fn private(targets: RedirectTargets) -> Self {
        Self::new(GuardKind::Private, AccessPolicy::default(), targets)
    }

    pub fn kind(&self) -> GuardKind {
        self.kind
    }

    /// Decide for `requested_path` given the current session and role
    pub fn evaluate(&self, session: &SessionState, role: &RoleState, requested_path: &str) -> GuardDecision {
        let session = match session {
            SessionState::Resolving => return GuardDecision::Verifying,
            SessionState::Anonymous => {
                return GuardDecision::DeniedUnauthenticated {
                    redirect_to: self.targets.sign_in.clone(),
                    return_to: requested_path.to_string(),
                }
            }
            SessionState::Authenticated(session) => session,
        };

        if self.kind == GuardKind::Private {
            return GuardDecision::Allowed;
        }

        // A role resolved for someone else counts as not resolved yet
        let email = session.email_key();
        match role.role_for(email.as_deref()) {
            None => GuardDecision::Verifying,
            Some(role) if self.policy.permits(self.kind, role) => GuardDecision::Allowed,
            Some(_) => GuardDecision::DeniedUnauthorized {
                redirect_to: self.targets.forbidden.clone(),
            },
        }
    }

    /// Wait until the decision is no longer [`GuardDecision::Verifying`].
    ///
    /// Returns `Verifying` only if both channels close before that happens.
    pub async fn settle(
        &self,
        session_rx: &mut watch::Receiver<SessionState>,
        role_rx: &mut watch::Receiver<RoleState>,
        requested_path: &str,
    ) -> GuardDecision {
        let mut session_open = true;
        let mut role_open = true;

        loop {
            let session = session_rx.borrow_and_update().clone();
            let role = role_rx.borrow_and_update().clone();
            let decision = self.evaluate(&session, &role, requested_path);
            if decision.is_final() || (!session_open && !role_open) {
                return decision;
            }

            tokio::select! {
                changed = session_rx.changed(), if session_open => {
                    session_open = changed.is_ok();
                }
                changed = role_rx.changed(), if role_open => {
                    role_open = changed.is_ok();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mc_common::Session;
    use std::time::Duration;

    fn alice() -> SessionState {
        SessionState::Authenticated(Session::new("uid-a", Some("alice@example.com".to_string())))
    }

    fn resolved(email: &str, role: Role) -> RoleState {
        RoleState::Resolved { email: Some(email.to_string()), role, refreshing: false }
    }

    fn guard(kind: GuardKind) -> Guard {
        Guard::new(kind, AccessPolicy::default(), RedirectTargets::default())
    }

    #[test]
    fn test_resolving_session_verifies() {
        for kind in [GuardKind::Private, GuardKind::Organizer, GuardKind::Participant] {
            let decision = guard(kind).evaluate(&SessionState::Resolving, &RoleState::Idle, "/dashboard");
            assert_eq!(decision, GuardDecision::Verifying);
        }
    }

    #[test]
    fn test_anonymous_goes_to_sign_in_with_return_path() {
        for kind in [GuardKind::Private, GuardKind::Organizer, GuardKind::Participant] {
            let decision = guard(kind).evaluate(
                &SessionState::Anonymous,
                &RoleState::Idle,
                "/dashboard/manage-camps",
            );
            assert_eq!(
                decision,
                GuardDecision::DeniedUnauthenticated {
                    redirect_to: "/join-us".to_string(),
                    return_to: "/dashboard/manage-camps".to_string(),
                }
            );
        }
    }

    #[test]
    fn test_private_does_not_wait_for_role() {
        let decision = guard(GuardKind::Private).evaluate(&alice(), &RoleState::Idle, "/dashboard");
        assert_eq!(decision, GuardDecision::Allowed);
    }

    #[test]
    fn test_role_guards_verify_while_role_unresolved() {
        let pending = RoleState::Pending { email: "alice@example.com".to_string() };
        for kind in [GuardKind::Organizer, GuardKind::Participant] {
            assert_eq!(guard(kind).evaluate(&alice(), &pending, "/x"), GuardDecision::Verifying);
            assert_eq!(guard(kind).evaluate(&alice(), &RoleState::Idle, "/x"), GuardDecision::Verifying);
        }
    }

    #[test]
    fn test_role_for_other_user_is_ignored() {
        let bobs_role = resolved("bob@example.com", Role::Organizer);
        let decision = guard(GuardKind::Organizer).evaluate(&alice(), &bobs_role, "/dashboard/add-camp");
        assert_eq!(decision, GuardDecision::Verifying);
    }

    #[test]
    fn test_role_matrix() {
        let organizer = resolved("alice@example.com", Role::Organizer);
        let participant = resolved("alice@example.com", Role::Participant);
        let forbidden = GuardDecision::DeniedUnauthorized { redirect_to: "/forbidden".to_string() };

        assert_eq!(guard(GuardKind::Organizer).evaluate(&alice(), &organizer, "/x"), GuardDecision::Allowed);
        assert_eq!(guard(GuardKind::Organizer).evaluate(&alice(), &participant, "/x"), forbidden);
        assert_eq!(guard(GuardKind::Participant).evaluate(&alice(), &participant, "/x"), GuardDecision::Allowed);
        assert_eq!(guard(GuardKind::Participant).evaluate(&alice(), &organizer, "/x"), forbidden);
    }

    #[test]
    fn test_lenient_participant_policy() {
        let policy = AccessPolicy { participant_admits_organizer: true };
        let guard = Guard::new(GuardKind::Participant, policy, RedirectTargets::default());
        let organizer = resolved("alice@example.com", Role::Organizer);
        assert_eq!(guard.evaluate(&alice(), &organizer, "/x"), GuardDecision::Allowed);
        assert!(!policy.permits(GuardKind::Organizer, Role::Participant));
    }

    #[test]
    fn test_refreshing_role_counts_as_resolved() {
        let refreshing = RoleState::Resolved {
            email: Some("alice@example.com".to_string()),
            role: Role::Organizer,
            refreshing: true,
        };
        assert_eq!(
            guard(GuardKind::Organizer).evaluate(&alice(), &refreshing, "/x"),
            GuardDecision::Allowed
        );
    }

    #[tokio::test]
    async fn test_settle_waits_for_role() {
        let (session_tx, mut session_rx) = watch::channel(SessionState::Resolving);
        let (role_tx, mut role_rx) = watch::channel(RoleState::Idle);
        let guard = guard(GuardKind::Organizer);

        let handle = tokio::spawn(async move {
            guard.settle(&mut session_rx, &mut role_rx, "/dashboard/add-camp").await
        });

        session_tx.send_replace(alice());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!handle.is_finished());

        role_tx.send_replace(resolved("alice@example.com", Role::Organizer));
        let decision = tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
        assert_eq!(decision, GuardDecision::Allowed);
    }

    #[tokio::test]
    async fn test_settle_gives_up_when_channels_close() {
        let (session_tx, mut session_rx) = watch::channel(SessionState::Resolving);
        let (role_tx, mut role_rx) = watch::channel(RoleState::Idle);
        drop(session_tx);
        drop(role_tx);

        let decision = guard(GuardKind::Private).settle(&mut session_rx, &mut role_rx, "/dashboard").await;
        assert_eq!(decision, GuardDecision::Verifying);
    }
}
