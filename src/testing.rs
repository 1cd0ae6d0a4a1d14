//! In-memory stores backing `AppState::fake()`.

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::auth::repo::{StoreError, UserStore};
use crate::auth::repo_types::{PasswordReset, User, UserSummary};
use crate::expenses::repo::ExpenseStore;
use crate::expenses::repo_types::{Expense, ExpensePatch, NewExpense};

struct UserRow {
    user: User,
    /// (token digest, expiry)
    reset: Option<(String, OffsetDateTime)>,
}

#[derive(Default)]
pub struct MemoryUserStore {
    rows: RwLock<Vec<UserRow>>,
}

impl MemoryUserStore {
    async fn find(&self, pred: impl Fn(&User) -> bool) -> anyhow::Result<Option<User>> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .find(|r| pred(&r.user))
            .map(|r| r.user.clone()))
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, StoreError> {
        // Check and insert under one write lock, like a unique index.
        let mut rows = self.rows.write().await;
        if rows
            .iter()
            .any(|r| r.user.username == username || r.user.email == email)
        {
            return Err(StoreError::Duplicate);
        }
        let user = User {
            id: rows.len() as i64 + 1,
            username: username.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            created_at: OffsetDateTime::now_utc(),
        };
        rows.push(UserRow {
            user: user.clone(),
            reset: None,
        });
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        self.find(|u| u.id == id).await
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.find(|u| u.email == email).await
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        self.find(|u| u.username == username).await
    }

    async fn update_password_hash(&self, user_id: i64, password_hash: &str) -> anyhow::Result<()> {
        if let Some(r) = self.rows.write().await.iter_mut().find(|r| r.user.id == user_id) {
            r.user.password_hash = password_hash.into();
        }
        Ok(())
    }

    async fn set_reset_token(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        if let Some(r) = self.rows.write().await.iter_mut().find(|r| r.user.id == user_id) {
            r.reset = Some((token_hash.into(), expires_at));
        }
        Ok(())
    }

    async fn find_reset(&self, token_hash: &str) -> anyhow::Result<Option<PasswordReset>> {
        Ok(self.rows.read().await.iter().find_map(|r| match &r.reset {
            Some((hash, expires_at)) if hash == token_hash => Some(PasswordReset {
                user_id: r.user.id,
                expires_at: *expires_at,
            }),
            _ => None,
        }))
    }

    async fn consume_reset_token(
        &self,
        user_id: i64,
        token_hash: &str,
        password_hash: &str,
    ) -> anyhow::Result<bool> {
        let mut rows = self.rows.write().await;
        match rows.iter_mut().find(|r| {
            r.user.id == user_id && matches!(&r.reset, Some((hash, _)) if hash == token_hash)
        }) {
            Some(r) => {
                r.user.password_hash = password_hash.into();
                r.reset = None;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list(&self) -> anyhow::Result<Vec<UserSummary>> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .map(|r| UserSummary {
                username: r.user.username.clone(),
                email: r.user.email.clone(),
            })
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryExpenseStore {
    state: RwLock<(i64, Vec<Expense>)>, // (last id, rows)
}

#[async_trait]
impl ExpenseStore for MemoryExpenseStore {
    async fn list(&self, owner_id: i64) -> anyhow::Result<Vec<Expense>> {
        let guard = self.state.read().await;
        let mut rows: Vec<Expense> = guard
            .1
            .iter()
            .filter(|e| e.owner_id == owner_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn create(&self, owner_id: i64, expense: &NewExpense) -> anyhow::Result<Expense> {
        let mut guard = self.state.write().await;
        guard.0 += 1;
        let row = Expense {
            id: guard.0,
            owner_id,
            amount: expense.amount,
            description: expense.description.clone(),
            category: expense.category.clone(),
            created_at: OffsetDateTime::now_utc(),
        };
        guard.1.push(row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        owner_id: i64,
        id: i64,
        patch: &ExpensePatch,
    ) -> anyhow::Result<Option<Expense>> {
        let mut guard = self.state.write().await;
        let Some(row) = guard
            .1
            .iter_mut()
            .find(|e| e.id == id && e.owner_id == owner_id)
        else {
            return Ok(None);
        };
        if let Some(amount) = patch.amount {
            row.amount = amount;
        }
        if let Some(description) = &patch.description {
            row.description = description.clone();
        }
        if let Some(category) = &patch.category {
            row.category = category.clone();
        }
        Ok(Some(row.clone()))
    }

    async fn delete(&self, owner_id: i64, id: i64) -> anyhow::Result<bool> {
        let mut guard = self.state.write().await;
        let before = guard.1.len();
        guard.1.retain(|e| !(e.id == id && e.owner_id == owner_id));
        Ok(guard.1.len() < before)
    }
}
