// ABOUTME: HTTP error type shared by every handler
// ABOUTME: Maps domain errors to status codes and a sanitized JSON error body

use agentbay_agents::ManagerError;
use agentbay_ledger::LedgerError;
use agentbay_storage::StorageError;
use agentbay_usage::MeteringError;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Main application error type that all handlers return
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    /// No caller identity on the request
    #[error("Authentication required")]
    Unauthenticated,

    /// Shared secret missing or wrong on an internal endpoint
    #[error("Invalid credentials")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Insufficient credits (balance {balance_cents} cents)")]
    InsufficientCredits { balance_cents: i64 },

    #[error("Provisioning failed: {0}")]
    Provisioning(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Structured error response format for API consistency
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: ErrorDetail,
    request_id: String,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    balance_cents: Option<i64>,
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    fn to_status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::InsufficientCredits { .. } => {
                (StatusCode::PAYMENT_REQUIRED, "INSUFFICIENT_CREDITS")
            }
            AppError::Provisioning(_) => (StatusCode::BAD_GATEWAY, "PROVISIONING_FAILED"),
            AppError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
        }
    }

    /// Message safe to show a client
    fn to_user_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::Unauthenticated => "Authentication required".to_string(),
            AppError::Unauthorized => "Invalid credentials".to_string(),
            AppError::NotFound(what) => format!("{what} not found"),
            AppError::InsufficientCredits { .. } => {
                "Add credits before resuming this agent".to_string()
            }
            AppError::Provisioning(msg) => format!("Provisioning failed: {msg}"),
            AppError::Storage(_) => "Data storage error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = Uuid::new_v4().to_string();
        let (status, code) = self.to_status_and_code();

        match &self {
            AppError::Storage(detail) => {
                error!(request_id = %request_id, storage_error = %detail, "Storage system error");
            }
            AppError::Provisioning(detail) => {
                warn!(request_id = %request_id, error = %detail, "Provisioning error surfaced");
            }
            _ => {
                info!(
                    request_id = %request_id,
                    error_code = %code,
                    error = %self,
                    "API error response"
                );
            }
        }

        let balance_cents = match &self {
            AppError::InsufficientCredits { balance_cents } => Some(*balance_cents),
            _ => None,
        };

        let body = ErrorResponse {
            success: false,
            error: ErrorDetail {
                code,
                message: self.to_user_message(),
                balance_cents,
            },
            request_id,
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, AppError>;

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(what) => AppError::NotFound(what),
            StorageError::InvalidInput(msg) | StorageError::InvalidStatus(msg) => {
                AppError::Validation(msg)
            }
            other => AppError::Storage(other.to_string()),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::NotFound(account_id) => {
                AppError::NotFound(format!("Credit ledger for account {account_id}"))
            }
            LedgerError::InvalidAmount(amount) => {
                AppError::Validation(format!("Amounts must be non-negative, got {amount}"))
            }
            LedgerError::Storage(inner) => inner.into(),
        }
    }
}

impl From<ManagerError> for AppError {
    fn from(e: ManagerError) -> Self {
        match e {
            ManagerError::Validation(msg) => AppError::Validation(msg),
            ManagerError::NotFound(what) => AppError::NotFound(what),
            ManagerError::InsufficientCredits { balance_cents } => {
                AppError::InsufficientCredits { balance_cents }
            }
            ManagerError::Provisioning(fleet) => AppError::Provisioning(fleet.to_string()),
            ManagerError::Storage(inner) => inner.into(),
            ManagerError::Ledger(inner) => inner.into(),
        }
    }
}

impl From<MeteringError> for AppError {
    fn from(e: MeteringError) -> Self {
        match e {
            MeteringError::Unauthorized => AppError::Unauthorized,
            MeteringError::Validation(msg) => AppError::Validation(msg),
            MeteringError::NotFound(account_id) => {
                AppError::NotFound(format!("Credit ledger for account {account_id}"))
            }
            MeteringError::Ledger(inner) => inner.into(),
            MeteringError::Storage(inner) => inner.into(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentbay_fleet::FleetError;

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::validation("x"), StatusCode::BAD_REQUEST),
            (AppError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (AppError::Unauthorized, StatusCode::UNAUTHORIZED),
            (AppError::NotFound("Agent".into()), StatusCode::NOT_FOUND),
            (
                AppError::InsufficientCredits { balance_cents: 0 },
                StatusCode::PAYMENT_REQUIRED,
            ),
            (AppError::Provisioning("down".into()), StatusCode::BAD_GATEWAY),
            (
                AppError::Storage("disk".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.to_status_and_code().0, expected);
        }
    }

    #[test]
    fn test_manager_errors_map_through() {
        let err: AppError = ManagerError::Provisioning(FleetError::Timeout("30s".into())).into();
        assert!(matches!(err, AppError::Provisioning(_)));

        let err: AppError = ManagerError::Storage(StorageError::Database("locked".into())).into();
        assert!(matches!(err, AppError::Storage(_)));
        // SQL detail never reaches the client
        assert_eq!(err.to_user_message(), "Data storage error");
    }

    #[test]
    fn test_storage_invalid_input_is_validation() {
        let err: AppError = StorageError::InvalidInput("bad provider".into()).into();
        assert!(matches!(err, AppError::Validation(msg) if msg == "bad provider"));
    }
}
