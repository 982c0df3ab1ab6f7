/// Refresh Token Store
///
/// Records which user every refresh token was issued to. A token missing from
/// the store is never honored, however valid its signature.
///
/// Records are keyed by the SHA-256 of the token string, never the plaintext.
/// Each record carries the token's expiry. Expired records are never returned
/// and are evicted whenever a new token is saved.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::error::StorageError;

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Associate `token` with `username` until `expires_at`, replacing any
    /// prior mapping
    async fn save(
        &self,
        token: &str,
        username: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Owner of `token`, unless it is unknown or past its expiry
    async fn find_username(&self, token: &str) -> Result<Option<String>, StorageError>;

    /// Forget `token`. Returns whether a record existed.
    async fn remove(&self, token: &str) -> Result<bool, StorageError>;
}

/// Hash a refresh token using SHA-256
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

struct StoredToken {
    username: String,
    expires_at: DateTime<Utc>,
}

/// Mutex-guarded map store
#[derive(Default)]
pub struct InMemoryRefreshTokenStore {
    tokens: Mutex<HashMap<String, StoredToken>>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held, expired or not
    pub fn len(&self) -> usize {
        self.tokens.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.lock().is_empty()
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn save(
        &self,
        token: &str,
        username: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let key = hash_token(token);
        let now = Utc::now();

        let mut tokens = self.tokens.lock();
        let before = tokens.len();
        tokens.retain(|_, stored| stored.expires_at > now);
        let evicted = before - tokens.len();
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted expired refresh tokens");
        }

        tokens.insert(
            key,
            StoredToken {
                username: username.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn find_username(&self, token: &str) -> Result<Option<String>, StorageError> {
        let key = hash_token(token);
        let now = Utc::now();
        Ok(self
            .tokens
            .lock()
            .get(&key)
            .filter(|stored| stored.expires_at > now)
            .map(|stored| stored.username.clone()))
    }

    async fn remove(&self, token: &str) -> Result<bool, StorageError> {
        let key = hash_token(token);
        Ok(self.tokens.lock().remove(&key).is_some())
    }
}

/// Postgres-backed store over the `refresh_tokens` table
///
/// `token_hash` is the primary key, so concurrent saves are serialized by the
/// database's unique index.
pub struct PgRefreshTokenStore {
    pool: PgPool,
}

impl PgRefreshTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Delete every record whose expiry has passed. Returns how many went.
    pub async fn purge_expired(&self) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= $1")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn save(
        &self,
        token: &str,
        username: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let evicted = self.purge_expired().await?;
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted expired refresh tokens");
        }

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (token_hash, username, expires_at, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (token_hash)
            DO UPDATE SET username = EXCLUDED.username, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(hash_token(token))
        .bind(username)
        .bind(expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_username(&self, token: &str) -> Result<Option<String>, StorageError> {
        let username = sqlx::query_scalar::<_, String>(
            "SELECT username FROM refresh_tokens WHERE token_hash = $1 AND expires_at > $2",
        )
        .bind(hash_token(token))
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(username)
    }

    async fn remove(&self, token: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
            .bind(hash_token(token))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
