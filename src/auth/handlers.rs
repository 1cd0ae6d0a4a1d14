use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{
            ChangePasswordRequest, MessageResponse, PublicUser, ResetPasswordRequest,
            ResetRequest, ResetRequestResponse, SigninRequest, SignupRequest, SignupResponse,
            TokenResponse,
        },
        extractors::AuthUser,
        jwt::JwtKeys,
        repo_types::{User, UserSummary},
        services,
    },
    error::{AppError, AppResult},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/signin", post(signin))
        .route("/auth/users", get(list_users))
        .route("/auth/password-reset/request", post(request_password_reset))
        .route("/auth/password-reset", post(reset_password))
        .route("/auth/change-password", put(change_password))
}

/// Unwraps a JSON body, turning extractor rejections into our 400 body.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            warn!(reason = %rejection.body_text(), "rejected request body");
            Err(AppError::validation("Invalid JSON body"))
        }
    }
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<SignupResponse>)> {
    let body = json_body(payload)?;
    let user = services::signup(&state, body.username, body.email, body.password).await?;
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "User created successfully",
            user: user.into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn signin(
    State(state): State<AppState>,
    payload: Result<Json<SigninRequest>, JsonRejection>,
) -> AppResult<Json<TokenResponse>> {
    let body = json_body(payload)?;
    let (token, user) = services::signin(&state, body.email, body.password).await?;
    Ok(Json(TokenResponse {
        token,
        token_type: "Bearer",
        expires_in: JwtKeys::from_ref(&state).ttl_secs(),
        user: user.into(),
    }))
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<UserSummary>>> {
    Ok(Json(services::list_users(&state).await?))
}

#[instrument(skip(state, payload))]
pub async fn request_password_reset(
    State(state): State<AppState>,
    payload: Result<Json<ResetRequest>, JsonRejection>,
) -> AppResult<Json<ResetRequestResponse>> {
    let body = json_body(payload)?;
    let reset_token = services::request_password_reset(&state, body.email).await?;
    Ok(Json(ResetRequestResponse {
        message: "If the account exists, a password reset has been issued",
        reset_token,
    }))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> AppResult<Json<MessageResponse>> {
    let body = json_body(payload)?;
    services::reset_password(&state, body.token, body.password).await?;
    Ok(Json(MessageResponse {
        message: "Password has been reset",
    }))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> AppResult<Json<MessageResponse>> {
    let body = json_body(payload)?;
    services::change_password(&state, user_id, body.current_password, body.new_password).await?;
    Ok(Json(MessageResponse {
        message: "Password changed successfully",
    }))
}
