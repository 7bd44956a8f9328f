//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::account::AccountRepository;
use crate::db::Database;
use crate::domain::{Account, AccountPatch, Amount, DomainError, ListParams, NewAccount};
use crate::error::AppError;
use crate::handlers::{TransferCommand, TransferHandler, TransferResult};

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct TransferRequest {
    pub source_id: Uuid,
    pub destination_id: Uuid,
    /// Kept as raw JSON so fractional or string amounts get a proper 400
    pub amount: serde_json::Value,
}

impl TransferRequest {
    pub fn into_command(self) -> Result<TransferCommand, AppError> {
        let amount = match &self.amount {
            serde_json::Value::Number(n) => Amount::from_json(n)
                .map_err(|e| DomainError::invalid_argument(e.to_string()))?,
            other => {
                return Err(DomainError::invalid_argument(format!(
                    "amount must be a positive integer (got {})",
                    other
                ))
                .into())
            }
        };

        Ok(TransferCommand::new(
            self.source_id,
            self.destination_id,
            i64::from(amount),
        ))
    }
}

#[derive(Debug, Serialize)]
pub struct AccountListResponse {
    pub accounts: Vec<Account>,
    pub limit: i64,
    pub offset: i64,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<Database> {
    Router::new()
        .route("/accounts", post(create_account).get(list_accounts))
        .route(
            "/accounts/:account_id",
            get(get_account).patch(update_account).delete(delete_account),
        )
        .route("/transfers", post(transfer))
}

// =========================================================================
// Accounts
// =========================================================================

/// Create a new account
async fn create_account(
    State(db): State<Database>,
    Json(request): Json<NewAccount>,
) -> Result<(StatusCode, Json<Account>), AppError> {
    validate_new_account(&request)?;

    let account = AccountRepository::new(db).create(request).await?;

    Ok((StatusCode::CREATED, Json(account)))
}

/// List accounts, newest first
async fn list_accounts(
    State(db): State<Database>,
    Query(params): Query<ListParams>,
) -> Result<Json<AccountListResponse>, AppError> {
    let accounts = AccountRepository::new(db).list(params).await?;

    Ok(Json(AccountListResponse {
        accounts,
        limit: params.limit,
        offset: params.offset,
    }))
}

/// Get account by ID
async fn get_account(
    State(db): State<Database>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<Account>, AppError> {
    let account = AccountRepository::new(db)
        .find_by_id(account_id)
        .await?
        .ok_or_else(|| DomainError::account_not_found(account_id))?;

    Ok(Json(account))
}

/// Partially update an account
async fn update_account(
    State(db): State<Database>,
    Path(account_id): Path<Uuid>,
    Json(patch): Json<AccountPatch>,
) -> Result<Json<Account>, AppError> {
    if patch.is_empty() {
        return Err(AppError::InvalidRequest("no fields to update".to_string()));
    }
    if let Some(ref email) = patch.email {
        validate_email(email)?;
    }

    let account = AccountRepository::new(db)
        .update(account_id, &patch)
        .await?
        .ok_or_else(|| DomainError::account_not_found(account_id))?;

    Ok(Json(account))
}

/// Delete an account
async fn delete_account(
    State(db): State<Database>,
    Path(account_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    AccountRepository::new(db).delete(account_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

// =========================================================================
// Transfers
// =========================================================================

/// Transfer credits between two accounts
async fn transfer(
    State(db): State<Database>,
    Json(request): Json<TransferRequest>,
) -> Result<Json<TransferResult>, AppError> {
    let command = request.into_command()?;

    let result = TransferHandler::new(db).execute(command).await?;

    Ok(Json(result))
}

// =========================================================================
// Validation
// =========================================================================

fn validate_new_account(request: &NewAccount) -> Result<(), AppError> {
    validate_email(&request.email)?;
    if request.name.trim().is_empty() {
        return Err(AppError::InvalidRequest("name must not be empty".to_string()));
    }
    if request.credential_hash.is_empty() {
        return Err(AppError::InvalidRequest(
            "credential_hash must not be empty".to_string(),
        ));
    }
    if matches!(request.credits, Some(c) if c < 0) {
        return Err(AppError::InvalidRequest(
            "credits must not be negative".to_string(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AppError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.contains('@'),
        None => false,
    };
    if !valid {
        return Err(AppError::InvalidRequest(format!("invalid email: {}", email)));
    }
    Ok(())
}
