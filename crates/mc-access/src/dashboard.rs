//! Dashboard Shell
//!
//! Role-filtered side navigation, header and logout for everything under
//! `/dashboard`. Items reserved for another role are left out, never shown
//! disabled.

use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use mc_common::{NavItem, Role};

use crate::navigator::Navigator;
use crate::role::RoleResolver;
use crate::routes::Route;
use crate::session::{SessionState, SessionStore};

pub const LOADING_MESSAGE: &str = "Loading dashboard...";

const DEFAULT_TITLE: &str = "Dashboard";

pub const NAV_ITEMS: &[NavItem] = &[
    NavItem::common("Dashboard Home", "/dashboard", "home"),
    NavItem::for_role("Organizer Profile", "/dashboard/organizer-profile", "user-circle", Role::Organizer),
    NavItem::for_role("Add Camp", "/dashboard/add-camp", "plus-circle", Role::Organizer),
    NavItem::for_role("Manage Camps", "/dashboard/manage-camps", "clipboard-document-list", Role::Organizer),
    NavItem::for_role(
        "Manage Registered Camps",
        "/dashboard/manage-registered-camps",
        "users",
        Role::Organizer,
    ),
    NavItem::for_role("Participant Profile", "/dashboard/participant-profile", "user-circle", Role::Participant),
    NavItem::for_role("Registered Camps", "/dashboard/registered-camps", "calendar-days", Role::Participant),
    NavItem::for_role("Payment History", "/dashboard/payment-history", "currency-dollar", Role::Participant),
    NavItem::for_role("Analytics", "/dashboard/analytics", "chart-bar", Role::Participant),
];

/// Common items plus the ones reserved for `role`, in menu order
pub fn visible_items(role: Role) -> Vec<NavItem> {
    NAV_ITEMS.iter().copied().filter(|item| item.visible_to(role)).collect()
}

/// Content of the `/dashboard` index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DashboardHome {
    OrganizerOverview,
    ParticipantOverview,
}

pub fn dashboard_home(role: Role) -> DashboardHome {
    match role {
        Role::Organizer => DashboardHome::OrganizerOverview,
        Role::Participant => DashboardHome::ParticipantOverview,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardHeader {
    pub title: String,
    pub role_label: &'static str,
}

impl DashboardHeader {
    pub fn new(display_name: Option<&str>, role: Role) -> Self {
        let title = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_TITLE)
            .to_string();
        Self { title, role_label: role.label() }
    }
}

/// What the shell renders right now
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "shell", rename_all = "camelCase")]
pub enum ShellView {
    Loading { message: &'static str },
    Ready {
        header: DashboardHeader,
        items: Vec<NavItem>,
        home: DashboardHome,
    },
}

pub struct DashboardShell {
    sessions: Arc<SessionStore>,
    roles: RoleResolver,
    navigator: Arc<Navigator>,
}

impl DashboardShell {
    pub fn new(sessions: Arc<SessionStore>, roles: RoleResolver, navigator: Arc<Navigator>) -> Self {
        Self { sessions, roles, navigator }
    }

    /// Loading until the role for the current session is known
    pub fn view(&self) -> ShellView {
        let state = self.sessions.current();
        let Some(session) = state.session() else {
            return ShellView::Loading { message: LOADING_MESSAGE };
        };

        match self.roles.state().role_for(session.email_key().as_deref()) {
            Some(role) => ShellView::Ready {
                header: DashboardHeader::new(session.display_name.as_deref(), role),
                items: visible_items(role),
                home: dashboard_home(role),
            },
            None => ShellView::Loading { message: LOADING_MESSAGE },
        }
    }

    /// Sign out and go home, whether or not the provider accepted the sign-out
    pub async fn logout(&self) -> Route {
        self.sessions.sign_out().await;
        self.roles.on_session(&SessionState::Anonymous);
        let route = self.navigator.go(self.navigator.home());
        info!(location = %route.path(), "Logged out");
        route
    }
}
