//! Authorization Roles
//!
//! The backend stores roles as loose strings. Older records say `"user"`, newer
//! ones say `"participant"`. Both are folded into [`Role::Participant`] here so
//! nothing past the directory boundary ever compares raw strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Coarse authorization role for a signed-in user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Creates and manages camps and their registrations
    Organizer,
    /// Browses camps, registers, pays and leaves feedback
    #[serde(alias = "user")]
    Participant,
}

impl Role {
    /// Role granted when the directory has no opinion
    pub const LEAST_PRIVILEGED: Role = Role::Participant;

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Organizer => "organizer",
            Role::Participant => "participant",
        }
    }

    /// Capitalized label used in the dashboard header
    pub fn label(&self) -> &'static str {
        match self {
            Role::Organizer => "Organizer",
            Role::Participant => "Participant",
        }
    }

    /// Normalize a raw backend value.
    ///
    /// Absent or unrecognized values fall back to [`Role::LEAST_PRIVILEGED`].
    pub fn normalize(raw: Option<&str>) -> Role {
        match raw {
            None => Role::LEAST_PRIVILEGED,
            Some(value) => value.parse().unwrap_or_else(|_| {
                warn!(role = %value, "Unrecognized role value, using least-privileged role");
                Role::LEAST_PRIVILEGED
            }),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known role
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "organizer" => Ok(Role::Organizer),
            "participant" | "user" => Ok(Role::Participant),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Body of `GET /users/role/{email}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleRecord {
    #[serde(default)]
    pub role: Option<String>,
}

impl RoleRecord {
    pub fn into_role(self) -> Role {
        Role::normalize(self.role.as_deref())
    }
}
