//! Medix Camp Configuration
//!
//! Layered configuration for the access layer:
//! 1. Built-in defaults
//! 2. Optional TOML file
//! 3. `MC_*` environment variables
//!
//! ```toml
//! [api]
//! base_url = "http://localhost:5000"
//! timeout_secs = 10
//!
//! [roles]
//! stale_after_secs = 0
//! evict_after_secs = 600
//!
//! [routes]
//! home = "/"
//! sign_in = "/join-us"
//! forbidden = "/forbidden"
//!
//! [policy]
//! participant_admits_organizer = false
//!
//! [[dev.accounts]]
//! email = "alice@example.com"
//! password = "secret1"
//! display_name = "Alice"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// REST backend settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Per-request timeout for directory calls. 0 disables the timeout.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            timeout_secs: 10,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Role cache windows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleCacheConfig {
    /// After this long a cached role is still shown but revalidated
    pub stale_after_secs: u64,
    /// After this long a cached role is dropped entirely
    pub evict_after_secs: u64,
}

impl Default for RoleCacheConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: 0,
            evict_after_secs: 600,
        }
    }
}

impl RoleCacheConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn evict_after(&self) -> Duration {
        Duration::from_secs(self.evict_after_secs)
    }
}

/// Well-known client routes used for redirects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutesConfig {
    pub home: String,
    pub sign_in: String,
    pub forbidden: String,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            home: "/".to_string(),
            sign_in: "/join-us".to_string(),
            forbidden: "/forbidden".to_string(),
        }
    }
}

/// Authorization matrix switches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Let organizers through participant-only routes
    pub participant_admits_organizer: bool,
}

/// Seed account for the in-memory identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevAccount {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevConfig {
    pub accounts: Vec<DevAccount>,
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub api: ApiConfig,
    pub roles: RoleCacheConfig,
    pub routes: RoutesConfig,
    pub policy: PolicyConfig,
    pub dev: DevConfig,
}

impl GateConfig {
    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&text)?;
        info!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Load from an optional file, overlay the process environment and validate
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load(p)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `MC_*` variables from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay `MC_*` variables from an arbitrary lookup
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MC_API_BASE_URL") {
            self.api.base_url = v;
        }
        if let Some(v) = lookup("MC_API_TIMEOUT_SECS") {
            self.api.timeout_secs = parse_env("MC_API_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("MC_ROLE_STALE_AFTER_SECS") {
            self.roles.stale_after_secs = parse_env("MC_ROLE_STALE_AFTER_SECS", &v)?;
        }
        if let Some(v) = lookup("MC_ROLE_EVICT_AFTER_SECS") {
            self.roles.evict_after_secs = parse_env("MC_ROLE_EVICT_AFTER_SECS", &v)?;
        }
        if let Some(v) = lookup("MC_PARTICIPANT_ADMITS_ORGANIZER") {
            self.policy.participant_admits_organizer = match v.to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" | "" => false,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        key: "MC_PARTICIPANT_ADMITS_ORGANIZER".to_string(),
                        value: v,
                    })
                }
            };
        }
        debug!(base_url = %self.api.base_url, "Applied environment overrides");
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.api.base_url.as_str();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "api.base_url must be an http(s) URL, got '{}'",
                url
            )));
        }

        for (name, path) in [
            ("routes.home", &self.routes.home),
            ("routes.sign_in", &self.routes.sign_in),
            ("routes.forbidden", &self.routes.forbidden),
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::Invalid(format!("{} must start with '/', got '{}'", name, path)));
            }
        }

        if self.roles.evict_after_secs < self.roles.stale_after_secs {
            return Err(ConfigError::Invalid(
                "roles.evict_after_secs must not be shorter than roles.stale_after_secs".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_env(key: &str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = GateConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.routes.sign_in, "/join-us");
        assert_eq!(config.api.timeout(), Some(Duration::from_secs(10)));
        assert!(!config.policy.participant_admits_organizer);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = GateConfig::from_toml(
            r#"
            [api]
            base_url = "https://api.medix.example"

            [policy]
            participant_admits_organizer = true
            "#,
        )
        .unwrap();
        assert_eq!(config.api.base_url, "https://api.medix.example");
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.roles.evict_after_secs, 600);
        assert!(config.policy.participant_admits_organizer);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("MC_API_BASE_URL", "http://backend:8080"),
            ("MC_API_TIMEOUT_SECS", "0"),
            ("MC_PARTICIPANT_ADMITS_ORGANIZER", "yes"),
        ]
        .into_iter()
        .collect();

        let mut config = GateConfig::default();
        config
            .apply_env_from(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.api.base_url, "http://backend:8080");
        assert_eq!(config.api.timeout(), None);
        assert!(config.policy.participant_admits_organizer);
    }

    #[test]
    fn test_bad_env_value_is_rejected() {
        let mut config = GateConfig::default();
        let err = config
            .apply_env_from(|k| (k == "MC_ROLE_EVICT_AFTER_SECS").then(|| "ten".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = GateConfig::default();
        config.api.base_url = "ftp://nope".to_string();
        assert!(config.validate().is_err());

        let mut config = GateConfig::default();
        config.routes.forbidden = "forbidden".to_string();
        assert!(config.validate().is_err());

        let mut config = GateConfig::default();
        config.roles.stale_after_secs = 60;
        config.roles.evict_after_secs = 30;
        assert!(config.validate().is_err());
    }
}
