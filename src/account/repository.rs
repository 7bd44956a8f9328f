//! Account Repository
//!
//! CRUD against the accounts table. Every query error is classified through
//! `DomainError::from` before it leaves this module.

use sqlx::{PgExecutor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::db::Database;
use crate::domain::{
    Account, AccountPatch, AccountWithCredential, DomainError, DomainResult, ListParams,
    NewAccount,
};

const ACCOUNT_COLUMNS: &str = "id, email, name, date_of_birth, credits, created_at, updated_at";

/// Repository for account rows
#[derive(Debug, Clone)]
pub struct AccountRepository {
    db: Database,
}

impl AccountRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new account. Assigns an id when absent, lower-cases the
    /// email and defaults credits to 0.
    pub async fn create(&self, params: NewAccount) -> DomainResult<Account> {
        let mut conn = self.db.acquire().await?;

        let id = params.id.unwrap_or_else(Uuid::new_v4);
        let account: Account = sqlx::query_as(&format!(
            r#"
            INSERT INTO accounts (id, email, credential_hash, name, date_of_birth, credits)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(params.email.to_lowercase())
        .bind(&params.credential_hash)
        .bind(&params.name)
        .bind(params.date_of_birth)
        .bind(params.credits.unwrap_or(0))
        .fetch_one(&mut *conn)
        .await?;

        tracing::info!(account_id = %account.id, "Account created");
        Ok(account)
    }

    pub async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Account>> {
        let mut conn = self.db.acquire().await?;
        select_account(&mut *conn, id).await
    }

    /// Lookup by email (case-insensitive), including the credential hash
    pub async fn find_by_email(&self, email: &str) -> DomainResult<Option<AccountWithCredential>> {
        let mut conn = self.db.acquire().await?;

        let account = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS}, credential_hash FROM accounts WHERE email = $1"
        ))
        .bind(email.to_lowercase())
        .fetch_optional(&mut *conn)
        .await?;

        Ok(account)
    }

    /// Newest accounts first
    pub async fn list(&self, params: ListParams) -> DomainResult<Vec<Account>> {
        validate_list_params(&params)?;
        let mut conn = self.db.acquire().await?;

        let accounts = sqlx::query_as(&format!(
            r#"
            SELECT {ACCOUNT_COLUMNS}
            FROM accounts
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(&mut *conn)
        .await?;

        Ok(accounts)
    }

    /// Apply a partial update.
    ///
    /// Returns `None` without writing when the patch is empty, and `None`
    /// when no row matched `id`.
    pub async fn update(&self, id: Uuid, patch: &AccountPatch) -> DomainResult<Option<Account>> {
        let Some(mut query) = build_update(id, patch) else {
            return Ok(None);
        };

        let mut conn = self.db.acquire().await?;
        let account: Option<Account> = query
            .build_query_as()
            .fetch_optional(&mut *conn)
            .await?;

        if let Some(ref account) = account {
            tracing::info!(account_id = %account.id, "Account updated");
        }
        Ok(account)
    }

    /// Delete by id; `AccountNotFound` when nothing was deleted
    pub async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let mut conn = self.db.acquire().await?;

        let rows_affected = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            return Err(DomainError::account_not_found(id));
        }

        tracing::info!(account_id = %id, "Account deleted");
        Ok(())
    }
}

/// Fetch one account on any executor (pool connection or open transaction)
pub async fn select_account<'e, E>(executor: E, id: Uuid) -> DomainResult<Option<Account>>
where
    E: PgExecutor<'e>,
{
    let account = sqlx::query_as(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(account)
}

/// Build `UPDATE ... RETURNING` with only the provided fields.
/// `None` for an empty patch.
fn build_update(id: Uuid, patch: &AccountPatch) -> Option<QueryBuilder<'static, Postgres>> {
    if patch.is_empty() {
        return None;
    }

    let mut query = QueryBuilder::new("UPDATE accounts SET ");
    let mut sets = query.separated(", ");
    if let Some(ref email) = patch.email {
        sets.push("email = ").push_bind_unseparated(email.to_lowercase());
    }
    if let Some(ref credential_hash) = patch.credential_hash {
        sets.push("credential_hash = ")
            .push_bind_unseparated(credential_hash.clone());
    }
    if let Some(ref name) = patch.name {
        sets.push("name = ").push_bind_unseparated(name.clone());
    }
    if let Some(date_of_birth) = patch.date_of_birth {
        sets.push("date_of_birth = ").push_bind_unseparated(date_of_birth);
    }
    sets.push("updated_at = NOW()");

    query.push(" WHERE id = ").push_bind(id);
    query.push(" RETURNING ").push(ACCOUNT_COLUMNS);
    Some(query)
}

fn validate_list_params(params: &ListParams) -> DomainResult<()> {
    if params.limit < 0 {
        return Err(DomainError::invalid_argument("limit must not be negative"));
    }
    if params.offset < 0 {
        return Err(DomainError::invalid_argument("offset must not be negative"));
    }
    Ok(())
}
