/// Client Session Guard
///
/// Holds the locally cached session (at most one) and decides, without a
/// network call, whether its access token is still worth sending. The check
/// mirrors the server only as an optimization: see `token_validator`.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::client::token_validator::is_token_valid_at;

/// The cached login session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthInfo {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: Uuid,
}

#[derive(Default)]
pub struct SessionGuard {
    session: Mutex<Option<AuthInfo>>,
}

impl SessionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `auth_info` carries an access token that has not expired
    pub fn is_session_valid(auth_info: &AuthInfo) -> bool {
        is_token_valid_at(&auth_info.access_token, Utc::now())
    }

    /// Cached session if its access token is still valid.
    ///
    /// A stale session is cleared as a side effect.
    pub fn get_valid_auth_info(&self) -> Option<AuthInfo> {
        self.get_valid_auth_info_at(Utc::now())
    }

    pub fn get_valid_auth_info_at(&self, now: DateTime<Utc>) -> Option<AuthInfo> {
        // Check and clear under one lock so a concurrent store is never undone
        let mut session = self.session.lock();
        let valid = session
            .as_ref()
            .map(|info| is_token_valid_at(&info.access_token, now))?;

        if valid {
            (*session).clone()
        } else {
            tracing::debug!("Access token is invalid or expired, clearing session");
            *session = None;
            None
        }
    }

    /// Cached session regardless of token freshness. Used by the refresh path.
    pub fn current(&self) -> Option<AuthInfo> {
        (*self.session.lock()).clone()
    }

    pub fn store_session(&self, auth_info: AuthInfo) {
        *self.session.lock() = Some(auth_info);
    }

    /// Replace the access token, but only while the cached session is still
    /// the one identified by `refresh_token` and `user_id`.
    ///
    /// Returns `None` and leaves the cache untouched if the session was
    /// cleared or replaced in the meantime.
    pub fn replace_access_token_if(
        &self,
        refresh_token: &str,
        user_id: Uuid,
        access_token: String,
    ) -> Option<AuthInfo> {
        let mut session = self.session.lock();
        let info = session
            .as_mut()
            .filter(|info| info.refresh_token == refresh_token && info.user_id == user_id)?;
        info.access_token = access_token;
        Some(info.clone())
    }

    /// Clear the session only if it still holds `refresh_token`.
    /// Returns whether it was cleared.
    pub fn clear_session_if(&self, refresh_token: &str) -> bool {
        let mut session = self.session.lock();
        match session.as_ref() {
            Some(info) if info.refresh_token == refresh_token => {
                *session = None;
                tracing::debug!("Session cleared");
                true
            }
            _ => false,
        }
    }

    /// Idempotent
    pub fn clear_session(&self) {
        if self.session.lock().take().is_some() {
            tracing::debug!("Session cleared");
        }
    }
}
