/// Client for the authentication endpoints
///
/// Keeps the session in a shared `SessionGuard`. Network calls honour the
/// configured request timeout; dropping a returned future cancels the call.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use uuid::Uuid;

use crate::client::session::{AuthInfo, SessionGuard};
use crate::configuration::ClientSettings;

#[derive(Debug)]
pub enum ClientError {
    /// The server rejected the credentials or token
    Unauthorized,
    /// No cached session to act on
    NoSession,
    /// The cached session was cleared or replaced while a call was in flight
    SessionChanged,
    Transport(String),
    UnexpectedStatus(u16),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Unauthorized => write!(f, "Unauthorized"),
            ClientError::NoSession => write!(f, "No active session"),
            ClientError::SessionChanged => write!(f, "Session changed during request"),
            ClientError::Transport(msg) => write!(f, "Transport error: {}", msg),
            ClientError::UnexpectedStatus(status) => write!(f, "Unexpected status: {}", status),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
    user_id: Uuid,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LogoutRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Clone)]
pub struct AuthApiClient {
    http_client: reqwest::Client,
    base_url: String,
    session: Arc<SessionGuard>,
}

impl AuthApiClient {
    pub fn new(
        base_url: String,
        timeout: Duration,
        session: Arc<SessionGuard>,
    ) -> Result<Self, ClientError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url,
            session,
        })
    }

    pub fn from_settings(
        settings: &ClientSettings,
        session: Arc<SessionGuard>,
    ) -> Result<Self, ClientError> {
        Self::new(
            settings.base_url.clone(),
            Duration::from_millis(settings.timeout_ms),
            session,
        )
    }

    pub fn session(&self) -> &Arc<SessionGuard> {
        &self.session
    }

    /// Access token to attach to an outgoing request, if the cached one is still fresh
    pub fn bearer_token(&self) -> Option<String> {
        self.session
            .get_valid_auth_info()
            .map(|info| info.access_token)
    }

    /// Log in and cache the resulting session
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthInfo, ClientError> {
        let response = self
            .http_client
            .post(format!("{}/auth/login", self.base_url))
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let auth_info: AuthInfo = response.json().await?;
                self.session.store_session(auth_info.clone());
                tracing::info!(user_id = %auth_info.user_id, "Logged in");
                Ok(auth_info)
            }
            StatusCode::NOT_FOUND => Err(ClientError::Unauthorized),
            status => Err(ClientError::UnexpectedStatus(status.as_u16())),
        }
    }

    /// Trade the cached refresh token for a new access token.
    ///
    /// Works from the raw cached session, since the access token is usually
    /// already stale when this is called. A rejection ends the session.
    /// Either outcome only applies if that session is still the cached one
    /// when the response arrives.
    pub async fn refresh(&self) -> Result<AuthInfo, ClientError> {
        let current = self.session.current().ok_or(ClientError::NoSession)?;

        let response = self
            .http_client
            .post(format!("{}/auth/refresh", self.base_url))
            .json(&RefreshRequest {
                refresh_token: &current.refresh_token,
                user_id: current.user_id,
            })
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let access_token = response.text().await?;
                self.session
                    .replace_access_token_if(&current.refresh_token, current.user_id, access_token)
                    .ok_or_else(|| {
                        tracing::info!("Session changed during refresh, discarding new token");
                        ClientError::SessionChanged
                    })
            }
            StatusCode::NOT_FOUND => {
                if self.session.clear_session_if(&current.refresh_token) {
                    tracing::info!("Refresh rejected, session cleared");
                }
                Err(ClientError::Unauthorized)
            }
            status => Err(ClientError::UnexpectedStatus(status.as_u16())),
        }
    }

    /// Revoke the refresh token server-side (best effort) and drop the session.
    ///
    /// A session stored while the call was in flight is kept.
    pub async fn logout(&self) {
        let Some(current) = self.session.current() else {
            return;
        };

        let result = self
            .http_client
            .post(format!("{}/auth/logout", self.base_url))
            .json(&LogoutRequest {
                refresh_token: &current.refresh_token,
            })
            .send()
            .await;

        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to notify server of logout");
        }
        self.session.clear_session_if(&current.refresh_token);
    }
}
