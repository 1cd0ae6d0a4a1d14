use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string, never exposed
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Pending password reset, found by the digest of its token.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct PasswordReset {
    pub user_id: i64,
    pub expires_at: OffsetDateTime,
}

/// Public projection used by the user listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct UserSummary {
    pub username: String,
    pub email: String,
}
