//! # Error Types
//!
//! Domain-specific error types for stockbook-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  stockbook-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  stockbook-db errors                                                   │
//! │  └── DbError          - Storage failures (wraps CoreError)             │
//! │                                                                         │
//! │  server errors                                                         │
//! │  └── ApiError         - HTTP status + response envelope                │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Client       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product id does not resolve, or the product was deactivated.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Debtor id does not resolve.
    #[error("Debtor not found: {0}")]
    DebtorNotFound(String),

    /// Sale id does not resolve.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Sale item id does not resolve within the given sale.
    #[error("Sale item not found: {0}")]
    SaleItemNotFound(String),

    /// Insufficient stock to complete a sale.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout (qty: 5)
    ///      │
    ///      ▼
    /// Check stock: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Cola 1.5L", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Nothing is written, the cashier adjusts the cart
    /// ```
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// A checkout must contain at least one line item.
    #[error("Sale has no items")]
    EmptySale,

    /// Too many line items in a single checkout.
    #[error("Sale cannot have more than {max} items")]
    TooManyItems { max: usize },

    /// Credit checkout without a debtor.
    #[error("Credit sales require a debtor")]
    CreditRequiresDebtor,

    /// The increase would push the debtor above their credit ceiling.
    #[error("Credit limit exceeded for {debtor}: limit {limit}, resulting balance {attempted}")]
    CreditLimitExceeded {
        debtor: String,
        limit: i64,
        attempted: i64,
    },

    /// The line item was already paid or voided.
    #[error("Sale item {item_id} is already {state}")]
    AlreadySettled { item_id: String, state: String },

    /// Sale is not in a state that allows the requested operation.
    #[error("Sale {sale_id} is {current_status}, cannot perform operation")]
    InvalidSaleStatus {
        sale_id: String,
        current_status: String,
    },

    /// The caller edited a stale copy of the record.
    #[error("{entity} {id} was modified concurrently (expected version {expected})")]
    Conflict {
        entity: String,
        id: String,
        expected: i64,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid phone, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., phone already registered).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::Required`].
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product: "Cola 1.5L".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Cola 1.5L: available 3, requested 5"
        );

        let err = CoreError::AlreadySettled {
            item_id: "item-1".to_string(),
            state: "voided".to_string(),
        };
        assert_eq!(err.to_string(), "Sale item item-1 is already voided");
    }

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(ValidationError::required("phone").to_string(), "phone is required");

        let err = ValidationError::MustBePositive {
            field: "amount".to_string(),
        };
        assert_eq!(err.to_string(), "amount must be positive");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("name").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
