use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{info, warn};

use super::{
    dto::ExpenseRequest,
    repo_types::{Expense, ExpensePatch, NewExpense},
};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

pub const NOT_FOUND: &str = "Expense not found";

const DESCRIPTION_MAX: usize = 255;
const CATEGORY_MAX: usize = 150;

/// Largest value NUMERIC(10,2) holds.
fn max_amount() -> Decimal {
    Decimal::new(9_999_999_999, 2)
}

/// `Ok(None)` for absent or blank input.
fn parse_amount(raw: Option<Value>) -> AppResult<Option<Decimal>> {
    let text = match raw {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(_) => return Err(AppError::validation("Amount must be a valid number")),
    };
    let amount = Decimal::from_str(&text)
        .map_err(|_| AppError::validation("Amount must be a valid number"))?;
    Ok(Some(amount))
}

fn check_amount(amount: Decimal) -> AppResult<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(AppError::validation("Amount must be a positive number"));
    }
    if amount.normalize().scale() > 2 {
        return Err(AppError::validation(
            "Amount must have at most two decimal places",
        ));
    }
    if amount > max_amount() {
        return Err(AppError::validation("Amount is too large"));
    }
    Ok(amount.round_dp(2))
}

fn check_text(value: String, field: &str, max: usize) -> AppResult<String> {
    let value = value.trim().to_string();
    if value.chars().count() > max {
        return Err(AppError::validation(format!(
            "{field} must be {max} characters or fewer"
        )));
    }
    Ok(value)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub fn validate_new(body: ExpenseRequest) -> AppResult<NewExpense> {
    let amount = parse_amount(body.amount)?;
    let (Some(amount), Some(description), Some(category)) = (
        amount,
        non_blank(body.description),
        non_blank(body.category),
    ) else {
        return Err(AppError::validation(
            "Amount, description and category are required",
        ));
    };

    Ok(NewExpense {
        amount: check_amount(amount)?,
        description: check_text(description, "Description", DESCRIPTION_MAX)?,
        category: check_text(category, "Category", CATEGORY_MAX)?,
    })
}

/// Supplied fields obey the same rules as on create; blank strings are
/// rejected rather than treated as "unchanged".
pub fn validate_patch(body: ExpenseRequest) -> AppResult<ExpensePatch> {
    let amount_supplied = !matches!(body.amount, None | Some(Value::Null));
    let amount = match parse_amount(body.amount)? {
        Some(a) => Some(check_amount(a)?),
        None if amount_supplied => {
            return Err(AppError::validation("Amount must be a valid number"));
        }
        None => None,
    };

    let text = |value: Option<String>, field: &str, max: usize| -> AppResult<Option<String>> {
        match value {
            None => Ok(None),
            Some(v) if v.trim().is_empty() => {
                Err(AppError::validation(format!("{field} cannot be empty")))
            }
            Some(v) => check_text(v, field, max).map(Some),
        }
    };

    Ok(ExpensePatch {
        amount,
        description: text(body.description, "Description", DESCRIPTION_MAX)?,
        category: text(body.category, "Category", CATEGORY_MAX)?,
    })
}

/// Sum of amounts, rounded to cents.
pub fn total(items: &[Expense]) -> Decimal {
    items
        .iter()
        .map(|e| e.amount)
        .sum::<Decimal>()
        .round_dp(2)
}

pub async fn list(state: &AppState, owner_id: i64) -> AppResult<(Vec<Expense>, Decimal)> {
    let items = state.expenses.list(owner_id).await?;
    let sum = total(&items);
    Ok((items, sum))
}

pub async fn create(state: &AppState, owner_id: i64, body: ExpenseRequest) -> AppResult<Expense> {
    let new = validate_new(body)?;
    let expense = state.expenses.create(owner_id, &new).await?;
    info!(owner_id, expense_id = expense.id, "expense created");
    Ok(expense)
}

pub async fn update(
    state: &AppState,
    owner_id: i64,
    id: i64,
    body: ExpenseRequest,
) -> AppResult<Expense> {
    let patch = validate_patch(body)?;
    match state.expenses.update(owner_id, id, &patch).await? {
        Some(expense) => {
            info!(owner_id, expense_id = id, "expense updated");
            Ok(expense)
        }
        None => {
            warn!(owner_id, expense_id = id, "update of missing or foreign expense");
            Err(AppError::not_found(NOT_FOUND))
        }
    }
}

pub async fn delete(state: &AppState, owner_id: i64, id: i64) -> AppResult<()> {
    if state.expenses.delete(owner_id, id).await? {
        info!(owner_id, expense_id = id, "expense deleted");
        Ok(())
    } else {
        warn!(owner_id, expense_id = id, "delete of missing or foreign expense");
        Err(AppError::not_found(NOT_FOUND))
    }
}
