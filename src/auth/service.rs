/// Authentication Service
///
/// The single entry point request handlers use. Login and refresh are
/// independent, stateless flows over the shared components below. Neither
/// flow writes anything when it fails.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::claims::{TokenClaims, TokenKind};
use crate::auth::jwt::TokenCodec;
use crate::auth::password::{generate_salted_hash, validate_new_password, verify_password};
use crate::auth::refresh_token::RefreshTokenStore;
use crate::auth::users::{UserDirectory, UserRecord};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError, ValidationError};

/// Username and password as submitted. Never stored.
#[derive(Clone)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Tokens handed out by a successful login
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: Uuid,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserDirectory>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    codec: TokenCodec,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        config: &JwtSettings,
    ) -> Self {
        Self {
            users,
            refresh_tokens,
            codec: TokenCodec::from_settings(config),
            access_ttl: Duration::seconds(config.access_token_expiry),
            refresh_ttl: Duration::seconds(config.refresh_token_expiry),
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Verify credentials and issue an access/refresh token pair
    ///
    /// # Errors
    /// - `AuthError::CredentialInvalid` for an unknown user or a wrong password alike
    /// - `StorageError::Unavailable` if a backing store cannot be reached
    #[tracing::instrument(name = "login", skip(self, credential), fields(username = %credential.username))]
    pub async fn login(&self, credential: Credential) -> Result<TokenPair, AppError> {
        let user = self
            .users
            .find_by_username(&credential.username)
            .await?
            .ok_or(AuthError::CredentialInvalid)?;

        if !verify_password(&credential.password, &user.password) {
            return Err(AuthError::CredentialInvalid.into());
        }

        let issued_at = Utc::now();
        let claims = TokenClaims::new(user.username.clone());
        let access_token = self
            .codec
            .issue_at(&claims, TokenKind::Access, self.access_ttl, issued_at)?;
        let refresh_token = self
            .codec
            .issue_at(&claims, TokenKind::Refresh, self.refresh_ttl, issued_at)?;
        let refresh_expires_at = expiry(issued_at, self.refresh_ttl)?;

        // Last fallible step: nothing observable exists until this succeeds
        self.refresh_tokens
            .save(&refresh_token, &user.username, refresh_expires_at)
            .await?;

        tracing::info!(user_id = %user.id, "User logged in");

        Ok(TokenPair {
            access_token,
            refresh_token,
            user_id: user.id,
        })
    }

    /// Exchange a refresh token for a new access token
    ///
    /// The refresh token itself is not rotated.
    ///
    /// # Errors
    /// Any token, store or user cross-check failure, as an `AuthError`
    #[tracing::instrument(name = "refresh", skip(self, refresh_token))]
    pub async fn refresh(
        &self,
        refresh_token: &str,
        user_id: Option<Uuid>,
    ) -> Result<String, AppError> {
        let claims = self.codec.verify(refresh_token, TokenKind::Refresh)?;

        let stored_username = self
            .refresh_tokens
            .find_username(refresh_token)
            .await?
            .ok_or(AuthError::RefreshTokenUnknown)?;

        let user = self
            .users
            .find_by_username(&claims.user_name)
            .await?
            .ok_or(AuthError::UserMismatch)?;

        if user.username != stored_username {
            return Err(AuthError::UserMismatch.into());
        }
        if user_id.map_or(false, |id| id != user.id) {
            return Err(AuthError::UserMismatch.into());
        }

        let access_token = self
            .codec
            .issue(&claims, TokenKind::Access, self.access_ttl)?;

        tracing::info!(user_id = %user.id, "Access token refreshed");

        Ok(access_token)
    }

    /// Revoke a refresh token. Unknown tokens are ignored.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AppError> {
        let removed = self.refresh_tokens.remove(refresh_token).await?;
        tracing::info!(removed, "Refresh token revoked");
        Ok(())
    }

    /// Register a new user
    ///
    /// # Errors
    /// - `ValidationError` for a blank username or an unacceptable password
    /// - `StorageError::Duplicate` if the username is taken
    #[tracing::instrument(name = "register", skip(self, credential), fields(username = %credential.username))]
    pub async fn register(&self, credential: Credential) -> Result<Uuid, AppError> {
        if credential.username.trim().is_empty() {
            return Err(ValidationError::EmptyField("username".to_string()).into());
        }
        validate_new_password(&credential.password)?;

        let record = UserRecord::new(
            credential.username,
            generate_salted_hash(&credential.password),
        );
        let user_id = record.id;
        self.users.insert(record).await?;

        tracing::info!(user_id = %user_id, "User registered");
        Ok(user_id)
    }
}

fn expiry(issued_at: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, AppError> {
    issued_at
        .checked_add_signed(ttl)
        .ok_or_else(|| AppError::Internal(format!("Token expiry out of range for ttl {}", ttl)))
}
