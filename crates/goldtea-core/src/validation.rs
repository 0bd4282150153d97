//! # Validation Module
//!
//! Input checks run before a write is accepted by the sync layer.
//!
//! ## Where Validation Sits
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Form input (UI)                                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DataService::add_* / update_*                                          │
//! │       │  ── THIS MODULE: reject before anything is invalidated ──       │
//! │       ▼                                                                 │
//! │  Cache invalidation → optimistic ack → background write                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A rejected write never touches a cache and never reaches the store.
//!
//! ## Usage
//! ```rust
//! use goldtea_core::validation::{validate_name, validate_page_size};
//!
//! assert!(validate_name("village", "Rampur").is_ok());
//! assert!(validate_page_size(0).is_err());
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{NewSale, Note, Pricing, Sale};
use crate::MAX_PAGE_SIZE;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_NAME_LEN: usize = 100;
const MAX_NOTE_LEN: usize = 20_000;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a human-entered name (village, customer, brand).
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 100 characters
pub fn validate_name(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

pub fn validate_non_negative(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

pub fn validate_quantity(quantity: f64) -> ValidationResult<()> {
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    Ok(())
}

/// Validates a requested page size.
///
/// ## Rules
/// - Between 1 and [`MAX_PAGE_SIZE`] inclusive
pub fn validate_page_size(size: usize) -> ValidationResult<()> {
    if size == 0 || size > MAX_PAGE_SIZE {
        return Err(ValidationError::OutOfRange {
            field: "page_size".to_string(),
            min: 1,
            max: MAX_PAGE_SIZE as i64,
        });
    }
    Ok(())
}

// =============================================================================
// Record Validators
// =============================================================================

pub fn validate_new_sale(sale: &NewSale) -> ValidationResult<()> {
    validate_name("village", &sale.village)?;
    validate_name("customer_name", &sale.customer_name)?;
    validate_non_negative("rate", sale.rate)?;
    validate_quantity(sale.quantity)?;
    if let Some(total) = sale.total_amount {
        validate_non_negative("total_amount", total)?;
    }
    if let Some(paid) = sale.amount_paid {
        validate_non_negative("amount_paid", paid)?;
    }
    Ok(())
}

/// Validates a sale being written back after an edit.
pub fn validate_sale(sale: &Sale) -> ValidationResult<()> {
    if sale.id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "sale_id".to_string(),
        });
    }
    validate_name("village", &sale.village)?;
    validate_name("customer_name", &sale.customer_name)?;
    validate_non_negative("rate", sale.rate)?;
    validate_quantity(sale.quantity)?;
    validate_non_negative("total_amount", sale.total_amount)?;
    validate_non_negative("amount_paid", sale.amount_paid)?;
    Ok(())
}

pub fn validate_pricing(pricing: &Pricing) -> ValidationResult<()> {
    validate_name("package", &pricing.package)?;
    validate_non_negative("rate", pricing.rate)
}

/// A note needs a title or some content.
pub fn validate_note(note: &Note) -> ValidationResult<()> {
    if note.title.trim().is_empty() && note.content.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "title".to_string(),
        });
    }
    if note.content.chars().count() > MAX_NOTE_LEN {
        return Err(ValidationError::TooLong {
            field: "content".to_string(),
            max: MAX_NOTE_LEN,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("village", "Rampur").is_ok());
        assert!(validate_name("village", "   ").is_err());
        assert!(validate_name("village", &"x".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(0.5).is_ok());
        assert!(validate_quantity(0.0).is_err());
        assert!(validate_quantity(f64::NAN).is_err());
    }

    #[test]
    fn test_validate_page_size() {
        assert!(validate_page_size(1).is_ok());
        assert!(validate_page_size(MAX_PAGE_SIZE).is_ok());
        assert!(validate_page_size(MAX_PAGE_SIZE + 1).is_err());
    }

    #[test]
    fn test_validate_pricing() {
        let now = Utc::now();
        assert!(validate_pricing(&Pricing::new("Mix", "100gm", Money::from_rupees(40), now)).is_ok());
        assert!(validate_pricing(&Pricing::new("Mix", "", Money::from_rupees(40), now)).is_err());
        assert!(validate_pricing(&Pricing::new("Mix", "1kg", Money::from_paise(-1), now)).is_err());
    }

    #[test]
    fn test_validate_note() {
        let now = Utc::now();
        assert!(validate_note(&Note::new("Stock", "", now)).is_ok());
        assert!(validate_note(&Note::new("", "order 5kg", now)).is_ok());
        assert!(validate_note(&Note::new(" ", " ", now)).is_err());
    }
}
