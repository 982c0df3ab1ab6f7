/// User Directory
///
/// Looks up identity records by username. The authentication flows only read
/// from it; signup is the one writer.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::password::PasswordRecord;
use crate::error::StorageError;

/// A registered user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub password: PasswordRecord,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(username: impl Into<String>, password: PasswordRecord) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            password,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StorageError>;

    /// Insert a new user.
    ///
    /// # Errors
    /// `StorageError::Duplicate` if the username is taken
    async fn insert(&self, user: UserRecord) -> Result<(), StorageError>;
}

/// Map-backed directory for tests and database-less deployments
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StorageError> {
        Ok(self.users.read().get(username).cloned())
    }

    async fn insert(&self, user: UserRecord) -> Result<(), StorageError> {
        let mut users = self.users.write();
        if users.contains_key(&user.username) {
            return Err(StorageError::Duplicate(user.username));
        }
        users.insert(user.username.clone(), user);
        Ok(())
    }
}

/// Postgres-backed directory over the `users` table
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StorageError> {
        let row = sqlx::query_as::<_, (Uuid, String, String, String, DateTime<Utc>)>(
            r#"
            SELECT id, username, password_digest, salt, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, username, digest, salt, created_at)| UserRecord {
            id,
            username,
            password: PasswordRecord { digest, salt },
            created_at,
        }))
    }

    async fn insert(&self, user: UserRecord) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, password_digest, salt, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password.digest)
        .bind(&user.password.salt)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
