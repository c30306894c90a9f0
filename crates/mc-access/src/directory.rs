//! User Directory
//!
//! REST backend that owns user records and their roles.
//!
//! Endpoints:
//! - `GET /users/role/{email}` → `{ "role": "..." }` or 404
//! - `GET /users?email={email}` → user record or 404
//! - `POST /users` → create a user record

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

use mc_common::{DirectoryError, RoleRecord, UserRecord};
use mc_config::ApiConfig;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Role record for `email`, `None` when the backend has no record
    async fn find_role(&self, email: &str) -> Result<Option<RoleRecord>, DirectoryError>;

    /// Full user record for `email`, `None` when the backend has no record
    async fn find_user(&self, email: &str) -> Result<Option<UserRecord>, DirectoryError>;

    async fn create_user(&self, record: &UserRecord) -> Result<(), DirectoryError>;
}

/// [`UserDirectory`] over HTTP
pub struct HttpUserDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUserDirectory {
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, DirectoryError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| DirectoryError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, DirectoryError> {
        Self::new(config.base_url.clone(), config.timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn find_role(&self, email: &str) -> Result<Option<RoleRecord>, DirectoryError> {
        let url = self.url(&format!("/users/role/{}", urlencoding::encode(email)));
        debug!(url = %url, "Fetching role");

        let response = self.client.get(&url).send().await.map_err(map_reqwest)?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let record = response.json::<RoleRecord>().await.map_err(map_reqwest)?;
                Ok(Some(record))
            }
            status => Err(DirectoryError::status(status.as_u16(), url)),
        }
    }

    async fn find_user(&self, email: &str) -> Result<Option<UserRecord>, DirectoryError> {
        let url = self.url("/users");
        debug!(url = %url, email = %email, "Fetching user record");

        let response = self
            .client
            .get(&url)
            .query(&[("email", email)])
            .send()
            .await
            .map_err(map_reqwest)?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body = response.json::<serde_json::Value>().await.map_err(map_reqwest)?;
                // Some backends answer 200 with an empty body for unknown users
                if body.get("email").is_none() {
                    return Ok(None);
                }
                serde_json::from_value(body)
                    .map(Some)
                    .map_err(|e| DirectoryError::Decode(e.to_string()))
            }
            status => Err(DirectoryError::status(status.as_u16(), url)),
        }
    }

    async fn create_user(&self, record: &UserRecord) -> Result<(), DirectoryError> {
        let url = self.url("/users");
        debug!(url = %url, email = %record.email, "Creating user record");

        let response = self
            .client
            .post(&url)
            .json(record)
            .send()
            .await
            .map_err(map_reqwest)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(DirectoryError::status(response.status().as_u16(), url))
        }
    }
}

fn map_reqwest(e: reqwest::Error) -> DirectoryError {
    if e.is_timeout() {
        DirectoryError::Timeout
    } else if e.is_decode() {
        DirectoryError::Decode(e.to_string())
    } else {
        DirectoryError::Transport(e.to_string())
    }
}
