//! Medix Camp Access Layer
//!
//! Decides which dashboard views a visitor may see:
//! - SessionStore: who is signed in, fed by an IdentityProvider subscription
//! - RoleResolver: the signed-in user's role from the user directory, with stale-result discard
//! - Guard: private, organizer and participant route guards
//! - Navigator: route table lookup, guard settling and sign-in return paths
//! - DashboardShell: role-filtered navigation menu, header and logout
//! - App: container wiring all of the above with start/shutdown

pub mod app;
pub mod dashboard;
pub mod directory;
pub mod guard;
pub mod identity;
pub mod memory;
pub mod navigator;
pub mod notice;
pub mod role;
pub mod routes;
pub mod session;

pub use app::{App, DEFAULT_SETTLE_TIMEOUT};
pub use dashboard::{dashboard_home, visible_items, DashboardHeader, DashboardHome, DashboardShell, ShellView, NAV_ITEMS};
pub use directory::{HttpUserDirectory, UserDirectory};
pub use guard::{AccessPolicy, Guard, GuardDecision, GuardKind, RedirectTargets};
pub use identity::{FederatedProvider, IdentityProvider, IdentitySubscription};
pub use memory::MemoryIdentityProvider;
pub use navigator::{Navigation, Navigator};
pub use notice::Notifier;
pub use role::{RoleCacheSettings, RoleResolver, RoleState};
pub use routes::{DashboardView, Route};
pub use session::{SessionState, SessionStore};

// Re-export the shared types callers need alongside the access layer
pub use mc_common::{AuthError, Notice, NoticeLevel, Role, Session};

pub type Result<T> = std::result::Result<T, AuthError>;
