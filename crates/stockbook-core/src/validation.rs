//! # Validation Module
//!
//! Input validation for Stockbook.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP extractors (serde)                                      │
//! │  └── Shape and type of the JSON body                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Business rules: lengths, ranges, formats                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                       │
//! │  ├── UNIQUE (debtor phone, sale idempotency key)                       │
//! │  └── CHECK / foreign key constraints                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::{DebtorPatch, NewDebtor, NewProduct, ProductPatch};
use crate::MAX_ITEM_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_NAME_LEN: usize = 200;
const MAX_NOTES_LEN: usize = 1_000;
const MAX_BARCODE_LEN: usize = 64;
const MAX_QUERY_LEN: usize = 100;

// =============================================================================
// String Validators
// =============================================================================

fn require_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::required(field));
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

/// Validates a product or debtor display name (1-200 characters).
///
/// ## Example
/// ```rust
/// use stockbook_core::validation::validate_name;
///
/// assert!(validate_name("Sugar 1kg").is_ok());
/// assert!(validate_name("   ").is_err());
/// ```
pub fn validate_name(name: &str) -> ValidationResult<()> {
    require_text("name", name, MAX_NAME_LEN)
}

/// Validates a barcode.
///
/// ## Rules
/// - 1 to 64 characters after trimming
/// - Letters, digits and hyphens only (EAN/UPC plus in-store codes)
pub fn validate_barcode(barcode: &str) -> ValidationResult<()> {
    require_text("barcode", barcode, MAX_BARCODE_LEN)?;

    if !barcode
        .trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(ValidationError::InvalidFormat {
            field: "barcode".to_string(),
            reason: "must contain only letters, digits and hyphens".to_string(),
        });
    }

    Ok(())
}

/// Validates a phone number.
///
/// ## Rules
/// - Optional leading `+`
/// - Digits, spaces, hyphens and parentheses
/// - 7 to 15 digits in total
///
/// ## Example
/// ```rust
/// use stockbook_core::validation::validate_phone;
///
/// assert!(validate_phone("+998 90 123-45-67").is_ok());
/// assert!(validate_phone("12ab").is_err());
/// ```
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    let phone = phone.trim();
    if phone.is_empty() {
        return Err(ValidationError::required("phone"));
    }

    let body = phone.strip_prefix('+').unwrap_or(phone);
    let well_formed = body
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')'));
    let digits = body.chars().filter(char::is_ascii_digit).count();

    if !well_formed || !(7..=15).contains(&digits) {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "expected 7 to 15 digits".to_string(),
        });
    }

    Ok(())
}

/// Validates free-text notes (at most 1000 characters, may be empty).
pub fn validate_notes(notes: &str) -> ValidationResult<()> {
    if notes.chars().count() > MAX_NOTES_LEN {
        return Err(ValidationError::TooLong {
            field: "notes".to_string(),
            max: MAX_NOTES_LEN,
        });
    }
    Ok(())
}

/// Validates the mandatory reason for voiding a credit line item.
pub fn validate_reason(reason: Option<&str>) -> ValidationResult<String> {
    let reason = reason.map(str::trim).unwrap_or_default();
    require_text("reason", reason, MAX_NOTES_LEN)?;
    Ok(reason.to_string())
}

/// Validates a search query and returns it trimmed.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.chars().count() > MAX_QUERY_LEN {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: MAX_QUERY_LEN,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line item quantity (1 to MAX_ITEM_QUANTITY).
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a money field that may be zero but not negative.
///
/// ## Example
/// ```rust
/// use stockbook_core::validation::validate_non_negative;
///
/// assert!(validate_non_negative("price", 0).is_ok());
/// assert!(validate_non_negative("price", -100).is_err());
/// ```
pub fn validate_non_negative(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a ledger amount (must be > 0).
pub fn validate_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Aggregate Validators
// =============================================================================

impl NewProduct {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_name(&self.name)?;
        if let Some(barcode) = self.barcode.as_deref().filter(|b| !b.trim().is_empty()) {
            validate_barcode(barcode)?;
        }
        validate_non_negative("cost", self.cost_cents)?;
        validate_non_negative("price", self.price_cents)?;
        validate_non_negative("quantity", self.quantity)?;
        validate_non_negative("minStock", self.min_stock.unwrap_or(0))?;
        Ok(())
    }
}

impl ProductPatch {
    pub fn validate(&self) -> ValidationResult<()> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(barcode) = self.barcode.as_deref().filter(|b| !b.trim().is_empty()) {
            validate_barcode(barcode)?;
        }
        for (field, value) in [
            ("cost", self.cost_cents),
            ("price", self.price_cents),
            ("quantity", self.quantity),
            ("minStock", self.min_stock),
        ] {
            if let Some(value) = value {
                validate_non_negative(field, value)?;
            }
        }
        Ok(())
    }
}

impl NewDebtor {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_name(&self.name)?;
        validate_phone(&self.phone)?;
        if let Some(limit) = self.max_debt_cents {
            validate_non_negative("maxDebtAmount", limit)?;
        }
        if let Some(notes) = &self.notes {
            validate_notes(notes)?;
        }
        Ok(())
    }
}

impl DebtorPatch {
    pub fn validate(&self) -> ValidationResult<()> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(phone) = &self.phone {
            validate_phone(phone)?;
        }
        if let Some(limit) = self.max_debt_cents {
            validate_non_negative("maxDebtAmount", limit)?;
        }
        if let Some(notes) = &self.notes {
            validate_notes(notes)?;
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_barcode() {
        assert!(validate_barcode("4780000000017").is_ok());
        assert!(validate_barcode("SHOP-12").is_ok());
        assert!(validate_barcode("").is_err());
        assert!(validate_barcode("has space").is_err());
        assert!(validate_barcode(&"1".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("+998901234567").is_ok());
        assert!(validate_phone("(90) 123 45 67").is_ok());
        assert!(validate_phone("").is_err());
        assert!(validate_phone("123").is_err());
        assert!(validate_phone("+99890abc4567").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_ITEM_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_reason() {
        assert_eq!(validate_reason(Some("  returned  ")).unwrap(), "returned");
        assert!(validate_reason(Some("   ")).is_err());
        assert!(validate_reason(None).is_err());
    }

    #[test]
    fn test_new_product_validation() {
        let mut draft = NewProduct {
            name: "Rice 5kg".to_string(),
            price_cents: 60_000,
            cost_cents: 52_000,
            quantity: 10,
            ..NewProduct::default()
        };
        assert!(draft.validate().is_ok());

        draft.price_cents = -1;
        assert!(draft.validate().is_err());
    }

    #[test]
    fn test_new_debtor_validation() {
        let draft = NewDebtor {
            name: "Aziz".to_string(),
            phone: "+998901112233".to_string(),
            ..NewDebtor::default()
        };
        assert!(draft.validate().is_ok());

        let no_phone = NewDebtor {
            phone: String::new(),
            ..draft
        };
        assert!(matches!(
            no_phone.validate(),
            Err(ValidationError::Required { ref field }) if field == "phone"
        ));
    }
}
