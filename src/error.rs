//! Service error types with HTTP status code mapping.
//!
//! [`BookingError`] is the central error type. Each variant maps to a
//! specific HTTP status code and a structured JSON error response. Callers
//! only ever see the coarse status and message; the detailed cause is
//! logged where the error is produced.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::clients::ClientError;
use crate::domain::OrderId;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 4001,
///     "message": "insufficient funds",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                   |
/// |-----------|-----------------|-------------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request / 401         |
/// | 2000–2999 | State/Not Found | 404 Not Found / 409 Conflict  |
/// | 3000–3999 | Server          | 500 / 502                     |
/// | 4000–4999 | Ledger          | 422 Unprocessable Entity      |
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    /// The `X-User-Id` header is absent.
    #[error("not authenticated")]
    Unauthorized,

    /// Request validation failed (bad header, malformed body).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A ledger mutation was attempted without an `X-Request-Id`.
    #[error("missing request id")]
    MissingRequestId,

    /// An amount that must be non-negative was negative.
    #[error("negative amount: {0}")]
    NegativeAmount(i64),

    /// A credit would take the balance past the largest storable amount.
    #[error("balance limit exceeded")]
    BalanceOverflow,

    /// Order with the given ID was not found.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// A reservation was attempted with a token that already exists.
    #[error("request id already used: {0}")]
    TokenConflict(String),

    /// Settlement matched no pending entry (unknown, foreign, or settled).
    #[error("no pending operation for request id")]
    NotPending,

    /// A debit would have driven the balance below zero.
    #[error("insufficient funds")]
    InsufficientFunds,

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// A collaborating service call failed.
    #[error("collaborator error: {0}")]
    Collaborator(#[from] ClientError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BookingError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Unauthorized => 1000,
            Self::InvalidRequest(_) => 1001,
            Self::MissingRequestId => 1002,
            Self::NegativeAmount(_) => 1003,
            Self::BalanceOverflow => 1004,
            Self::OrderNotFound(_) => 2001,
            Self::TokenConflict(_) => 2002,
            Self::NotPending => 2003,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::Collaborator(_) => 3002,
            Self::InsufficientFunds => 4001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::InvalidRequest(_)
            | Self::MissingRequestId
            | Self::NegativeAmount(_)
            | Self::BalanceOverflow => StatusCode::BAD_REQUEST,
            Self::OrderNotFound(_) => StatusCode::NOT_FOUND,
            Self::TokenConflict(_) | Self::NotPending => StatusCode::CONFLICT,
            Self::InsufficientFunds => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PersistenceError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Collaborator(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<sqlx::Error> for BookingError {
    fn from(err: sqlx::Error) -> Self {
        Self::PersistenceError(err.to_string())
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        let message = match &self {
            // Detailed persistence and collaborator causes stay in the logs.
            Self::PersistenceError(_) | Self::Internal(_) => "internal error".to_string(),
            Self::Collaborator(_) => "collaborator unavailable".to_string(),
            other => other.to_string(),
        };
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message,
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
