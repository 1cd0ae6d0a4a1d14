use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::repo_types::Expense;

/// Body of POST and PUT. `amount` may arrive as a number or a numeric
/// string (HTML number inputs submit strings).
#[derive(Debug, Default, Deserialize)]
pub struct ExpenseRequest {
    pub amount: Option<Value>,
    pub description: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExpenseList {
    #[serde(rename = "Data")]
    pub data: Vec<Expense>,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub sum: Decimal,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
