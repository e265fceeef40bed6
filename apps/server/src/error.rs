//! # API Error Type
//!
//! Unified error type for route handlers.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Stockbook                              │
//! │                                                                         │
//! │  Handler: Result<Json<..>, ApiError>                                    │
//! │       │                                                                 │
//! │       ├── ValidationError ──► CoreError::Validation ──► 400             │
//! │       ├── CoreError::*NotFound ─────────────────────► 404               │
//! │       ├── stock / version / settlement conflicts ───► 409               │
//! │       ├── credit rules ─────────────────────────────► 422               │
//! │       ├── pool timeout / request timeout ───────────► 503               │
//! │       └── anything else (logged, not returned) ─────► 500               │
//! │                                                                         │
//! │  Body: { "success": false, "code": "NOT_FOUND", "message": "..." }      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use stockbook_core::{CoreError, ValidationError};
use stockbook_db::DbError;

/// Error returned from route handlers.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    /// Machine-readable code, SCREAMING_SNAKE_CASE
    pub code: &'static str,
    /// Human-readable message for display
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        ApiError {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{resource} not found: {id}"),
        )
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "success": false,
            "code": self.code,
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::ProductNotFound(id) => ApiError::not_found("Product", &id),
            CoreError::DebtorNotFound(id) => ApiError::not_found("Debtor", &id),
            CoreError::SaleNotFound(id) => ApiError::not_found("Sale", &id),
            CoreError::SaleItemNotFound(id) => ApiError::not_found("Sale item", &id),
            CoreError::InsufficientStock { .. } => {
                ApiError::new(StatusCode::CONFLICT, "INSUFFICIENT_STOCK", message)
            }
            CoreError::Conflict { .. } => ApiError::new(StatusCode::CONFLICT, "CONFLICT", message),
            CoreError::AlreadySettled { .. } => {
                ApiError::new(StatusCode::CONFLICT, "ALREADY_SETTLED", message)
            }
            CoreError::InvalidSaleStatus { .. } => {
                ApiError::new(StatusCode::CONFLICT, "INVALID_STATUS", message)
            }
            CoreError::EmptySale | CoreError::TooManyItems { .. } => ApiError::validation(message),
            CoreError::CreditRequiresDebtor | CoreError::CreditLimitExceeded { .. } => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "BUSINESS_RULE", message)
            }
            CoreError::Validation(inner) => ApiError::from(inner),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Domain(core) => ApiError::from(core),
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::new(
                StatusCode::CONFLICT,
                "DUPLICATE",
                format!("{field} '{value}' already exists"),
            ),
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::validation("Invalid reference")
            }
            DbError::PoolExhausted => ApiError::service_unavailable("Database is busy, try again"),
            DbError::ConnectionFailed(e) => {
                tracing::error!("Database connection failed: {}", e);
                ApiError::service_unavailable("Database unavailable")
            }
            DbError::MigrationFailed(e) => {
                tracing::error!("Migration failed: {}", e);
                ApiError::internal("Database operation failed")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                ApiError::internal("Database operation failed")
            }
            DbError::TransactionFailed(e) => {
                tracing::error!("Transaction failed: {}", e);
                ApiError::internal("Database transaction failed")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::internal("Database operation failed")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
