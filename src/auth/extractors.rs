use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use super::jwt::JwtKeys;
use crate::{error::AppError, state::AppState};

/// Extracts and validates the bearer token, yielding the id of an
/// existing user.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub i64);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?;

        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::unauthorized("Invalid Authorization header"))?;

        let keys = JwtKeys::from_ref(state);
        let user_id = keys.verify(token).map_err(|e| {
            warn!(reason = %e, "rejected bearer token");
            AppError::unauthorized("Invalid or expired token")
        })?;

        // A valid token for a deleted account is still an auth failure.
        match state.users.find_by_id(user_id).await? {
            Some(_) => Ok(AuthUser(user_id)),
            None => {
                warn!(user_id, "token for unknown user");
                Err(AppError::unauthorized("Invalid or expired token"))
            }
        }
    }
}
