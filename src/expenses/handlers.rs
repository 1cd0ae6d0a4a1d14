use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{ExpenseList, ExpenseRequest, MessageResponse},
    repo_types::Expense,
    services,
};
use crate::{
    auth::{extractors::AuthUser, handlers::json_body},
    error::{AppError, AppResult},
    state::AppState,
};

pub fn expense_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/expenses", get(list_expenses).post(create_expense))
        .route("/auth/expenses/:id", put(update_expense).delete(delete_expense))
}

/// Ids that do not parse cannot name an owned row.
fn expense_id(path: Result<Path<i64>, PathRejection>) -> AppResult<i64> {
    path.map(|Path(id)| id)
        .map_err(|_| AppError::not_found(services::NOT_FOUND))
}

#[instrument(skip(state))]
pub async fn list_expenses(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<ExpenseList>> {
    let (data, sum) = services::list(&state, user_id).await?;
    Ok(Json(ExpenseList { data, sum }))
}

#[instrument(skip(state, payload))]
pub async fn create_expense(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<ExpenseRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Expense>)> {
    let body = json_body(payload)?;
    let expense = services::create(&state, user_id, body).await?;
    Ok((StatusCode::CREATED, Json(expense)))
}

#[instrument(skip(state, path, payload))]
pub async fn update_expense(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ExpenseRequest>, JsonRejection>,
) -> AppResult<Json<Expense>> {
    let id = expense_id(path)?;
    let body = json_body(payload)?;
    Ok(Json(services::update(&state, user_id, id, body).await?))
}

#[instrument(skip(state, path))]
pub async fn delete_expense(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<MessageResponse>> {
    let id = expense_id(path)?;
    services::delete(&state, user_id, id).await?;
    Ok(Json(MessageResponse {
        message: "Expense deleted successfully",
    }))
}
