//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::store::StoreError;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Storage Errors**: the database failed; the only retriable class
/// - **Authentication Errors**: missing or invalid access token / payment API key
/// - **Resource Errors**: payment or wallet not found for this user
/// - **Business Logic Errors**: insufficient balance, non-pending payment, duplicate intent
/// - **Validation Errors**: invalid request data
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Storage operation failed (e.g., connection error, query error, commit failure).
    ///
    /// Returns HTTP 500 Internal Server Error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Access token or payment API key is missing or invalid.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Unauthorized")]
    Unauthorized,

    /// Requested payment does not exist or belongs to another user.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Payment not found")]
    PaymentNotFound,

    /// The user has never been credited, so there is nothing to spend.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Wallet not found. Please top up first")]
    WalletNotFound,

    /// Wallet balance does not cover the cost of the action.
    ///
    /// Returns HTTP 422 Unprocessable Entity.
    #[error("Insufficient balance. Required: {required} VND, available: {available} VND")]
    InsufficientFunds { required: i64, available: i64 },

    /// The payment is not in a state that allows the operation.
    ///
    /// Returns HTTP 409 Conflict.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The request collides with an existing resource.
    ///
    /// Returns HTTP 409 Conflict.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("Invalid request")]
    InvalidRequest(String),

    /// Unexpected internal failure that is not a storage error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Database(e) => AppError::Database(e),
            StoreError::WalletNotFound => AppError::WalletNotFound,
            StoreError::PaymentNotFound => AppError::PaymentNotFound,
            StoreError::InsufficientFunds { balance, required } => AppError::InsufficientFunds {
                required,
                available: balance,
            },
            StoreError::InvalidState { status } => {
                AppError::InvalidState(format!("payment is {status}, expected PENDING"))
            }
            StoreError::Conflict(message) => AppError::Conflict(message),
        }
    }
}

impl AppError {
    /// Whether this error came from storage rather than from the request.
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Internal(_))
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// # Status Code Mapping
///
/// - `Unauthorized` → 401 Unauthorized
/// - `PaymentNotFound` / `WalletNotFound` → 404 Not Found
/// - `InvalidState` / `Conflict` → 409 Conflict
/// - `InsufficientFunds` → 422 Unprocessable Entity
/// - `InvalidRequest` → 400 Bad Request
/// - `Database` / `Internal` → 500 Internal Server Error (hides details from client)
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Map each error variant to (HTTP status, error code, message)
        let (status, code, message) = match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", self.to_string()),
            AppError::PaymentNotFound => {
                (StatusCode::NOT_FOUND, "payment_not_found", self.to_string())
            }
            AppError::WalletNotFound => {
                (StatusCode::NOT_FOUND, "wallet_not_found", self.to_string())
            }
            AppError::InsufficientFunds { .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "insufficient_balance",
                self.to_string(),
            ),
            AppError::InvalidState(ref msg) => {
                (StatusCode::CONFLICT, "invalid_state", msg.clone())
            }
            AppError::Conflict(ref msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::Database(ref e) => {
                tracing::error!(error = %e, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Internal(ref msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        // Build JSON response body
        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
