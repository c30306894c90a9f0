//! Medix Camp Common Types
//!
//! Shared between the access layer and the dev shell:
//! - Session snapshot published by the identity provider
//! - Role enumeration and backend role records
//! - User directory records
//! - Dashboard navigation descriptors
//! - User-visible notices

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod error;
pub mod role;

pub use error::{AuthError, DirectoryError, RoleLookupError};
pub use role::{Role, RoleRecord, UnknownRole};

// ============================================================================
// Session Types
// ============================================================================

/// Authenticated identity for the current browser context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Provider-assigned user id
    pub uid: String,
    /// Federated accounts may not expose an email
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    /// Opaque credential issued by the provider
    #[serde(skip_serializing)]
    #[serde(default)]
    pub id_token: String,
    pub signed_in_at: DateTime<Utc>,
}

impl Session {
    pub fn new(uid: impl Into<String>, email: Option<String>) -> Self {
        Self {
            uid: uid.into(),
            email,
            display_name: None,
            photo_url: None,
            id_token: String::new(),
            signed_in_at: Utc::now(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_photo_url(mut self, url: impl Into<String>) -> Self {
        self.photo_url = Some(url.into());
        self
    }

    pub fn with_id_token(mut self, token: impl Into<String>) -> Self {
        self.id_token = token.into();
        self
    }

    /// Lowercased email used as the role cache key
    pub fn email_key(&self) -> Option<String> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_lowercase)
    }
}

/// Fields accepted by a profile update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

impl ProfileUpdate {
    pub fn apply(&self, session: &mut Session) {
        if let Some(name) = &self.display_name {
            session.display_name = Some(name.clone());
        }
        if let Some(url) = &self.photo_url {
            session.photo_url = Some(url.clone());
        }
    }
}

// ============================================================================
// User Directory Types
// ============================================================================

/// User record as stored by the REST backend (`POST /users`, `GET /users?email=`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Raw backend value; normalize with [`Role::normalize`]
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_log_in: Option<DateTime<Utc>>,
}

impl UserRecord {
    /// Record written on sign-up. New accounts always start as participants,
    /// stored under the legacy `"user"` value the backend expects.
    pub fn new_participant(email: impl Into<String>, name: Option<String>, photo: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            email: email.into(),
            name,
            role: Some("user".to_string()),
            photo,
            created_at: Some(now),
            last_log_in: Some(now),
        }
    }

    pub fn role(&self) -> Role {
        Role::normalize(self.role.as_deref())
    }
}

// ============================================================================
// Navigation Types
// ============================================================================

/// Static dashboard navigation entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavItem {
    pub label: &'static str,
    pub path: &'static str,
    pub icon: &'static str,
    /// `None` means the item is shown to every role
    pub required_role: Option<Role>,
}

impl NavItem {
    pub const fn common(label: &'static str, path: &'static str, icon: &'static str) -> Self {
        Self { label, path, icon, required_role: None }
    }

    pub const fn for_role(label: &'static str, path: &'static str, icon: &'static str, role: Role) -> Self {
        Self { label, path, icon, required_role: Some(role) }
    }

    pub fn visible_to(&self, role: Role) -> bool {
        self.required_role.map_or(true, |required| required == role)
    }
}

// ============================================================================
// Notices
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// User-visible outcome of a credential action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Success, message: message.into(), created_at: Utc::now() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, message: message.into(), created_at: Utc::now() }
    }
}
