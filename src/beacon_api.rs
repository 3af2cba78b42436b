// src/beacon_api.rs

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use crate::audit::AuditTrail;

/// A bearer token is only considered usable while more than this many
/// seconds remain before its expiry.
pub const TOKEN_SAFETY_MARGIN_SECS: i64 = 300;

const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

fn default_expires_in() -> u64 {
    DEFAULT_EXPIRES_IN_SECS
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("login rejected: {status} - {body:?}")]
    Rejected {
        status: StatusCode,
        body: Option<String>,
    },
}

/// Successful response body from the login endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginGrant {
    pub access_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

/// The process-wide bearer credential. Owned and mutated exclusively by
/// [`TokenManager`]; other components only observe it through
/// `is_valid`/`ensure_valid`.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub bearer_token: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn from_grant(grant: &LoginGrant, now: DateTime<Utc>) -> Self {
        Self {
            bearer_token: grant.access_token.clone(),
            expires_at: now + Duration::seconds(grant.expires_in as i64),
        }
    }

    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at - Duration::seconds(TOKEN_SAFETY_MARGIN_SECS)
    }
}

#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn login(&self) -> Result<LoginGrant, AuthError>;
}

/// Credentialed login against `{base}/auth/login`.
pub struct HttpAuthGateway {
    http_client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl HttpAuthGateway {
    pub fn new(http_client: Client, base_url: &str, username: String, password: String) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username,
            password,
        }
    }
}

#[async_trait]
impl AuthGateway for HttpAuthGateway {
    async fn login(&self) -> Result<LoginGrant, AuthError> {
        let url = format!("{}/auth/login", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .json(&json!({
                "username": self.username,
                "password": self.password,
            }))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::OK {
            Ok(response.json::<LoginGrant>().await?)
        } else {
            let body = response.text().await.ok();
            Err(AuthError::Rejected { status, body })
        }
    }
}

/// Holds the [`AuthSession`] and refreshes it through the gateway when
/// it is absent, near expiry, or has been invalidated.
pub struct TokenManager {
    gateway: Arc<dyn AuthGateway>,
    session: Mutex<Option<AuthSession>>,
    audit: Arc<AuditTrail>,
}

impl TokenManager {
    pub fn new(gateway: Arc<dyn AuthGateway>, audit: Arc<AuditTrail>) -> Self {
        Self {
            gateway,
            session: Mutex::new(None),
            audit,
        }
    }

    /// Performs a fresh login and replaces the session on success. On
    /// failure the session stays unset and the error carries the
    /// rejection status and body for logging.
    pub async fn authenticate(&self) -> Result<(), AuthError> {
        match self.gateway.login().await {
            Ok(grant) => {
                let session = AuthSession::from_grant(&grant, Utc::now());
                self.audit.info(format!(
                    "Authentication successful, token valid until {}",
                    session.expires_at.format("%Y-%m-%d %H:%M:%S")
                ));
                *self.session.lock().await = Some(session);
                Ok(())
            }
            Err(e) => {
                self.audit.error(format!("Authentication failed: {}", e));
                Err(e)
            }
        }
    }

    pub async fn is_valid(&self) -> bool {
        let guard = self.session.lock().await;
        guard
            .as_ref()
            .map(|session| session.is_usable(Utc::now()))
            .unwrap_or(false)
    }

    /// Clears the session. Called when the upstream auth endpoint
    /// reports the credential unauthorized; the next cycle will
    /// re-authenticate.
    pub async fn invalidate(&self) {
        info!("Clearing access token");
        *self.session.lock().await = None;
    }

    /// No-op while the current session is usable, otherwise performs a
    /// full `authenticate`.
    pub async fn ensure_valid(&self) -> Result<(), AuthError> {
        if self.is_valid().await {
            return Ok(());
        }
        info!("Token invalid or expired, attempting to re-authenticate");
        self.authenticate().await
    }
}
