//! Error handling module
//!
//! Application error type and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::DomainError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // Core errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Server errors (5xx)
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AppError {
    /// HTTP status, machine-readable code and optional details
    fn parts(&self) -> (StatusCode, &'static str, Option<String>) {
        match self {
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, "not_found", Some(what.clone())),

            AppError::Domain(domain_err) => match domain_err {
                DomainError::InvalidArgument(msg) => {
                    (StatusCode::BAD_REQUEST, "invalid_argument", Some(msg.clone()))
                }
                DomainError::InsufficientBalance { .. } => (
                    StatusCode::BAD_REQUEST,
                    "insufficient_balance",
                    Some(domain_err.to_string()),
                ),
                DomainError::AccountNotFound(_) => (
                    StatusCode::NOT_FOUND,
                    "account_not_found",
                    Some(domain_err.to_string()),
                ),
                DomainError::Conflict { message, .. } => {
                    (StatusCode::CONFLICT, "conflict", Some(message.clone()))
                }
                DomainError::TransactionConflict(e) => {
                    tracing::warn!("Transaction conflict surfaced: {:?}", e);
                    (StatusCode::CONFLICT, "transaction_conflict", None)
                }
                DomainError::Connection { attempts, source } => {
                    tracing::error!(attempts, "Connection error: {:?}", source);
                    (StatusCode::SERVICE_UNAVAILABLE, "connection_error", None)
                }
                DomainError::ServiceUnavailable { kind, source } => {
                    tracing::error!(kind = %kind, "Database error: {:?}", source);
                    (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", None)
                }
                DomainError::RetriesExhausted { .. } => {
                    tracing::error!("{}", domain_err);
                    (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", None)
                }
                DomainError::ShuttingDown => {
                    (StatusCode::SERVICE_UNAVAILABLE, "shutting_down", None)
                }
            },

            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None)
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        self.parts().0
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = self.parts();

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
