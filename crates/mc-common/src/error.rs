//! Error Types

use thiserror::Error;

/// Failure of a credential action against the identity provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredential,

    #[error("Email already in use: {email}")]
    EmailInUse { email: String },

    #[error("Weak password: {message}")]
    WeakPassword { message: String },

    #[error("No signed-in user")]
    NoSession,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Identity provider error: {message}")]
    Provider { message: String },

    #[error("User directory error: {0}")]
    Directory(#[from] DirectoryError),
}

impl AuthError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider { message: message.into() }
    }

    /// Whether the failure leaves local session state untouched
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Directory(_))
    }
}

/// Failure talking to the REST user directory
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl DirectoryError {
    pub fn status(status: u16, url: impl Into<String>) -> Self {
        Self::Status { status, url: url.into() }
    }
}

/// A role lookup that failed. Callers treat this as "still loading".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Role lookup for {email} failed: {source}")]
pub struct RoleLookupError {
    pub email: String,
    #[source]
    pub source: DirectoryError,
}

impl RoleLookupError {
    pub fn new(email: impl Into<String>, source: DirectoryError) -> Self {
        Self { email: email.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_error_converts_into_auth_error() {
        let err: AuthError = DirectoryError::Timeout.into();
        assert!(err.is_transient());
        assert_eq!(err.to_string(), "User directory error: Request timed out");
    }

    #[test]
    fn test_role_lookup_error_message() {
        let err = RoleLookupError::new("a@b.c", DirectoryError::status(503, "http://api/users/role/a@b.c"));
        assert!(err.to_string().contains("a@b.c"));
        assert!(err.to_string().contains("503"));
    }
}
