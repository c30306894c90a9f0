//! Client Route Table
//!
//! ```text
//! /                                      public
//! /available-camps                       public
//! /camp-details/{id}                     public
//! /about-us                              public
//! /join-us, /register                    public (sign-in / sign-up)
//! /dashboard                             private
//! /dashboard/{organizer view}            organizer
//! /dashboard/{participant view}          participant
//! /forbidden                             public
//! *                                      not found
//! ```

use serde::Serialize;

use mc_common::Role;

use crate::guard::GuardKind;

/// Nested dashboard views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DashboardView {
    Home,
    OrganizerProfile,
    AddCamp,
    ManageCamps,
    ManageRegisteredCamps,
    ParticipantProfile,
    RegisteredCamps,
    PaymentHistory,
    Analytics,
}

impl DashboardView {
    pub const ALL: [DashboardView; 9] = [
        DashboardView::Home,
        DashboardView::OrganizerProfile,
        DashboardView::AddCamp,
        DashboardView::ManageCamps,
        DashboardView::ManageRegisteredCamps,
        DashboardView::ParticipantProfile,
        DashboardView::RegisteredCamps,
        DashboardView::PaymentHistory,
        DashboardView::Analytics,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            DashboardView::Home => "/dashboard",
            DashboardView::OrganizerProfile => "/dashboard/organizer-profile",
            DashboardView::AddCamp => "/dashboard/add-camp",
            DashboardView::ManageCamps => "/dashboard/manage-camps",
            DashboardView::ManageRegisteredCamps => "/dashboard/manage-registered-camps",
            DashboardView::ParticipantProfile => "/dashboard/participant-profile",
            DashboardView::RegisteredCamps => "/dashboard/registered-camps",
            DashboardView::PaymentHistory => "/dashboard/payment-history",
            DashboardView::Analytics => "/dashboard/analytics",
        }
    }

    /// Role a view is reserved for; the index is open to every signed-in user
    pub fn required_role(&self) -> Option<Role> {
        match self {
            DashboardView::Home => None,
            DashboardView::OrganizerProfile
            | DashboardView::AddCamp
            | DashboardView::ManageCamps
            | DashboardView::ManageRegisteredCamps => Some(Role::Organizer),
            DashboardView::ParticipantProfile
            | DashboardView::RegisteredCamps
            | DashboardView::PaymentHistory
            | DashboardView::Analytics => Some(Role::Participant),
        }
    }

    pub fn guard(&self) -> GuardKind {
        match self.required_role() {
            None => GuardKind::Private,
            Some(Role::Organizer) => GuardKind::Organizer,
            Some(Role::Participant) => GuardKind::Participant,
        }
    }

    fn from_segment(segment: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|view| view.path().rsplit('/').next() == Some(segment) && *view != DashboardView::Home)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "route", rename_all = "kebab-case")]
pub enum Route {
    Home,
    AvailableCamps,
    CampDetails { id: String },
    AboutUs,
    JoinUs,
    Register,
    Dashboard { view: DashboardView },
    Forbidden,
    NotFound { path: String },
}

impl Route {
    /// Match a location against the route table
    pub fn parse(location: &str) -> Route {
        let path = normalize_path(location);
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [] => Route::Home,
            ["available-camps"] => Route::AvailableCamps,
            ["camp-details", id] => Route::CampDetails { id: (*id).to_string() },
            ["about-us"] => Route::AboutUs,
            ["join-us"] => Route::JoinUs,
            ["register"] => Route::Register,
            ["forbidden"] => Route::Forbidden,
            ["dashboard"] => Route::Dashboard { view: DashboardView::Home },
            ["dashboard", segment] => match DashboardView::from_segment(segment) {
                Some(view) => Route::Dashboard { view },
                None => Route::NotFound { path },
            },
            _ => Route::NotFound { path },
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::AvailableCamps => "/available-camps".to_string(),
            Route::CampDetails { id } => format!("/camp-details/{}", id),
            Route::AboutUs => "/about-us".to_string(),
            Route::JoinUs => "/join-us".to_string(),
            Route::Register => "/register".to_string(),
            Route::Dashboard { view } => view.path().to_string(),
            Route::Forbidden => "/forbidden".to_string(),
            Route::NotFound { path } => path.clone(),
        }
    }

    /// Guard protecting this route, `None` for public routes
    pub fn guard(&self) -> Option<GuardKind> {
        match self {
            Route::Dashboard { view } => Some(view.guard()),
            _ => None,
        }
    }
}

/// Strip query, fragment, duplicate and trailing slashes
pub fn normalize_path(location: &str) -> String {
    let end = location.find(['?', '#']).unwrap_or(location.len());
    let segments: Vec<&str> = location[..end].split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}
