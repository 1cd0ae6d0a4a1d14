use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;

use super::repo_types::{Expense, ExpensePatch, NewExpense};

/// Owner-scoped expense persistence. Every method filters on `owner_id`.
#[async_trait]
pub trait ExpenseStore: Send + Sync {
    async fn list(&self, owner_id: i64) -> anyhow::Result<Vec<Expense>>;
    async fn create(&self, owner_id: i64, expense: &NewExpense) -> anyhow::Result<Expense>;
    /// `None` when the row is missing or owned by someone else.
    async fn update(
        &self,
        owner_id: i64,
        id: i64,
        patch: &ExpensePatch,
    ) -> anyhow::Result<Option<Expense>>;
    /// `false` when the row is missing or owned by someone else.
    async fn delete(&self, owner_id: i64, id: i64) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgExpenseStore {
    db: PgPool,
}

impl PgExpenseStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ExpenseStore for PgExpenseStore {
    async fn list(&self, owner_id: i64) -> anyhow::Result<Vec<Expense>> {
        let rows = sqlx::query_as::<_, Expense>(
            r#"
            SELECT id, owner_id, amount, description, category, created_at
              FROM expenses
             WHERE owner_id = $1
             ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.db)
        .await
        .context("list expenses")?;
        Ok(rows)
    }

    async fn create(&self, owner_id: i64, expense: &NewExpense) -> anyhow::Result<Expense> {
        let row = sqlx::query_as::<_, Expense>(
            r#"
            INSERT INTO expenses (owner_id, amount, description, category)
            VALUES ($1, $2, $3, $4)
            RETURNING id, owner_id, amount, description, category, created_at
            "#,
        )
        .bind(owner_id)
        .bind(expense.amount)
        .bind(&expense.description)
        .bind(&expense.category)
        .fetch_one(&self.db)
        .await
        .context("insert expense")?;
        Ok(row)
    }

    async fn update(
        &self,
        owner_id: i64,
        id: i64,
        patch: &ExpensePatch,
    ) -> anyhow::Result<Option<Expense>> {
        let row = sqlx::query_as::<_, Expense>(
            r#"
            UPDATE expenses
               SET amount      = COALESCE($3, amount),
                   description = COALESCE($4, description),
                   category    = COALESCE($5, category)
             WHERE id = $1 AND owner_id = $2
            RETURNING id, owner_id, amount, description, category, created_at
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(patch.amount)
        .bind(patch.description.as_deref())
        .bind(patch.category.as_deref())
        .fetch_optional(&self.db)
        .await
        .context("update expense")?;
        Ok(row)
    }

    async fn delete(&self, owner_id: i64, id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query(r#"DELETE FROM expenses WHERE id = $1 AND owner_id = $2"#)
            .bind(id)
            .bind(owner_id)
            .execute(&self.db)
            .await
            .context("delete expense")?;
        Ok(result.rows_affected() == 1)
    }
}
