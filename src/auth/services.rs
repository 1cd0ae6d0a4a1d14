use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use lazy_static::lazy_static;
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use sha2::{Digest, Sha256};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{info, warn};

use crate::{
    auth::{
        jwt::JwtKeys,
        repo::StoreError,
        repo_types::{User, UserSummary},
    },
    config::MAX_TTL_MINUTES,
    error::{AppError, AppResult},
    state::AppState,
};

pub const INVALID_CREDENTIALS: &str = "Invalid credentials";
pub const INVALID_RESET_TOKEN: &str = "Invalid or expired reset token";
const DUPLICATE_ACCOUNT: &str = "Username or email already exists";
const PASSWORD_RANGE: &str = "Password must be between 8 and 20 characters long";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Treat missing and blank strings alike.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn len(s: &str) -> usize {
    s.chars().count()
}

/// Validated signup input, with username trimmed and email normalized.
#[derive(Debug, PartialEq, Eq)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Checks run in a fixed order so the first failure is deterministic.
pub fn validate_signup(
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
) -> AppResult<NewAccount> {
    let username = present(username).ok_or_else(|| AppError::validation("Username is required"))?;
    let email = present(email).ok_or_else(|| AppError::validation("Email is required"))?;
    let password = present(password).ok_or_else(|| AppError::validation("Password is required"))?;

    let username = username.trim().to_string();
    let email = email.trim().to_lowercase();

    if !(3..=20).contains(&len(&username)) {
        return Err(AppError::validation(
            "Username must be between 3 and 20 characters long",
        ));
    }
    if len(&email) > 120 {
        return Err(AppError::validation("Email must be 120 characters or fewer"));
    }
    if !is_valid_email(&email) {
        return Err(AppError::validation("Invalid email address"));
    }
    if !(8..=20).contains(&len(&password)) {
        return Err(AppError::validation(PASSWORD_RANGE));
    }

    Ok(NewAccount {
        username,
        email,
        password,
    })
}

pub async fn signup(
    state: &AppState,
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
) -> AppResult<User> {
    let account = validate_signup(username, email, password)?;

    // Fast path only; the unique constraints decide races.
    let email_taken = state.users.find_by_email(&account.email).await?.is_some();
    let username_taken = state
        .users
        .find_by_username(&account.username)
        .await?
        .is_some();
    if email_taken || username_taken {
        warn!(username = %account.username, "signup with existing username or email");
        return Err(AppError::Conflict(DUPLICATE_ACCOUNT.into()));
    }

    let hash = state.passwords.hash(&account.password).await?;

    let user = state
        .users
        .create(&account.username, &account.email, &hash)
        .await
        .map_err(|e| match e {
            StoreError::Duplicate => {
                warn!(username = %account.username, "signup lost uniqueness race");
                AppError::Conflict(DUPLICATE_ACCOUNT.into())
            }
            StoreError::Other(e) => AppError::Internal(e),
        })?;

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok(user)
}

/// Returns the signed token and the user it was issued for.
pub async fn signin(
    state: &AppState,
    email: Option<String>,
    password: Option<String>,
) -> AppResult<(String, User)> {
    let (Some(email), Some(password)) = (present(email), present(password)) else {
        return Err(AppError::validation("Email and password are required"));
    };
    let email = email.trim().to_lowercase();

    let user = match state.users.find_by_email(&email).await? {
        Some(user) => user,
        None => {
            state.passwords.verify_dummy(&password).await?;
            warn!("signin failed");
            return Err(AppError::unauthorized(INVALID_CREDENTIALS));
        }
    };

    if !state.passwords.verify(&password, &user.password_hash).await? {
        warn!("signin failed");
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    }

    let token = JwtKeys::from(&state.config.jwt).sign(user.id)?;
    info!(user_id = user.id, "user signed in");
    Ok((token, user))
}

pub async fn change_password(
    state: &AppState,
    user_id: i64,
    current_password: Option<String>,
    new_password: Option<String>,
) -> AppResult<()> {
    let (Some(current), Some(new)) = (present(current_password), present(new_password)) else {
        return Err(AppError::validation(
            "Current password and new password are required",
        ));
    };
    if len(&new) < 8 {
        return Err(AppError::validation(
            "New password must be at least 8 characters long",
        ));
    }

    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("Invalid or expired token"))?;

    if !state.passwords.verify(&current, &user.password_hash).await? {
        warn!(user_id, "change password with wrong current password");
        return Err(AppError::validation("Current password is incorrect"));
    }

    let hash = state.passwords.hash(&new).await?;
    state.users.update_password_hash(user_id, &hash).await?;
    info!(user_id, "password changed");
    Ok(())
}

fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hex SHA-256 of a reset token. Only this form is stored.
pub(crate) fn reset_token_digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Issues a reset token if the email belongs to an account. The caller
/// cannot tell whether it did; the token is only handed back when the
/// deployment is configured to expose it.
pub async fn request_password_reset(
    state: &AppState,
    email: Option<String>,
) -> AppResult<Option<String>> {
    let email = present(email)
        .ok_or_else(|| AppError::validation("Email is required"))?
        .trim()
        .to_lowercase();

    let Some(user) = state.users.find_by_email(&email).await? else {
        info!("password reset requested for unknown email");
        return Ok(None);
    };

    let token = generate_reset_token();
    let ttl = state.config.reset.ttl_minutes.clamp(1, MAX_TTL_MINUTES);
    let expires_at = OffsetDateTime::now_utc() + TimeDuration::minutes(ttl);
    state
        .users
        .set_reset_token(user.id, &reset_token_digest(&token), expires_at)
        .await?;
    info!(user_id = user.id, "password reset token issued");

    Ok(state.config.reset.token_in_response.then_some(token))
}

pub async fn reset_password(
    state: &AppState,
    token: Option<String>,
    password: Option<String>,
) -> AppResult<()> {
    let (Some(token), Some(password)) = (present(token), present(password)) else {
        return Err(AppError::validation("Token and password are required"));
    };
    if !(8..=20).contains(&len(&password)) {
        return Err(AppError::validation(PASSWORD_RANGE));
    }

    let digest = reset_token_digest(&token);
    let reset = state
        .users
        .find_reset(&digest)
        .await?
        .ok_or_else(|| AppError::validation(INVALID_RESET_TOKEN))?;

    if reset.expires_at <= OffsetDateTime::now_utc() {
        warn!(user_id = reset.user_id, "expired reset token");
        return Err(AppError::validation(INVALID_RESET_TOKEN));
    }

    let hash = state.passwords.hash(&password).await?;
    if !state
        .users
        .consume_reset_token(reset.user_id, &digest, &hash)
        .await?
    {
        warn!(user_id = reset.user_id, "reset token already used");
        return Err(AppError::validation(INVALID_RESET_TOKEN));
    }

    info!(user_id = reset.user_id, "password reset");
    Ok(())
}

pub async fn list_users(state: &AppState) -> AppResult<Vec<UserSummary>> {
    Ok(state.users.list().await?)
}
