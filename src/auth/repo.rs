use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;

use crate::auth::repo_types::{PasswordReset, User, UserSummary};
use crate::db::is_unique_violation;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("username or email already taken")]
    Duplicate,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Persistence for user accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user. Uniqueness is decided by the store, not by callers.
    async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, StoreError>;

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;

    async fn update_password_hash(&self, user_id: i64, password_hash: &str) -> anyhow::Result<()>;

    /// Reset tokens are only ever seen here as digests; the raw token is
    /// never persisted.
    async fn set_reset_token(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()>;

    async fn find_reset(&self, token_hash: &str) -> anyhow::Result<Option<PasswordReset>>;

    /// Replace the password and clear the reset token, but only if
    /// `token_hash` is still the user's current one. Returns `false` otherwise.
    async fn consume_reset_token(
        &self,
        user_id: i64,
        token_hash: &str,
        password_hash: &str,
    ) -> anyhow::Result<bool>;

    async fn list(&self) -> anyhow::Result<Vec<UserSummary>>;
}

const USER_COLUMNS: &str = "id, username, email, password_hash, created_at";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_one(&self, column: &str, value: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await
            .with_context(|| format!("find user by {column}"))?;
        Ok(user)
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, StoreError> {
        let sql = format!(
            "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .bind(email)
            .bind(password_hash)
            .fetch_one(&self.db)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Duplicate
                } else {
                    StoreError::Other(anyhow::Error::new(e).context("insert user"))
                }
            })
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find user by id")?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.find_one("email", email).await
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        self.find_one("username", username).await
    }

    async fn update_password_hash(&self, user_id: i64, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query(r#"UPDATE users SET password_hash = $2 WHERE id = $1"#)
            .bind(user_id)
            .bind(password_hash)
            .execute(&self.db)
            .await
            .context("update password hash")?;
        Ok(())
    }

    async fn set_reset_token(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET reset_token_hash = $2, reset_token_expires_at = $3
             WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.db)
        .await
        .context("set reset token")?;
        Ok(())
    }

    async fn find_reset(&self, token_hash: &str) -> anyhow::Result<Option<PasswordReset>> {
        let reset = sqlx::query_as::<_, PasswordReset>(
            r#"
            SELECT id AS user_id, reset_token_expires_at AS expires_at
              FROM users
             WHERE reset_token_hash = $1 AND reset_token_expires_at IS NOT NULL
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.db)
        .await
        .context("find password reset")?;
        Ok(reset)
    }

    async fn consume_reset_token(
        &self,
        user_id: i64,
        token_hash: &str,
        password_hash: &str,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
               SET password_hash = $3, reset_token_hash = NULL, reset_token_expires_at = NULL
             WHERE id = $1 AND reset_token_hash = $2
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(password_hash)
        .execute(&self.db)
        .await
        .context("consume reset token")?;
        Ok(result.rows_affected() == 1)
    }

    async fn list(&self) -> anyhow::Result<Vec<UserSummary>> {
        let rows = sqlx::query_as::<_, UserSummary>(
            r#"SELECT username, email FROM users ORDER BY id ASC"#,
        )
        .fetch_all(&self.db)
        .await
        .context("list users")?;
        Ok(rows)
    }
}
