//! # Validation Module
//!
//! Contract checks applied at the store boundary.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: UI layer                                                     │
//! │  └── Basic format checks, immediate feedback                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (called by tally-db before every write)          │
//! │  ├── ids present and well-formed                                       │
//! │  ├── quantities / prices in range                                      │
//! │  └── totals consistent with the line items                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite constraints (NOT NULL, CHECK, PRIMARY KEY)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::validation::{validate_record_id, validate_quantity};
//!
//! validate_record_id("id", "trx-1760779800000-3fa1b2c4").unwrap();
//! validate_quantity(5).unwrap();
//! assert!(validate_quantity(0).is_err());
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::reference::ReferenceRecord;
use crate::types::{sum_line_items, Transaction};
use crate::{MAX_ITEM_QUANTITY, MAX_RECORD_ID_LEN, MAX_TRANSACTION_ITEMS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a record identifier.
///
/// ## Rules
/// - Must not be empty
/// - At most `MAX_RECORD_ID_LEN` characters
/// - No whitespace or control characters (ids end up in URLs and
///   idempotency headers)
pub fn validate_record_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.is_empty() {
        return Err(ValidationError::required(field));
    }

    if id.len() > MAX_RECORD_ID_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_RECORD_ID_LEN,
        });
    }

    if id.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must not contain whitespace".to_string(),
        });
    }

    if id.chars().any(char::is_control) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must not contain control characters".to_string(),
        });
    }

    Ok(())
}

/// Validates a display name (item name, customer name).
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required(field));
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if !(1..=MAX_ITEM_QUANTITY).contains(&qty) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates an amount that must not be negative. Zero is allowed (free items).
pub fn validate_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Record Validators
// =============================================================================

/// Validates a whole transaction before it is persisted.
///
/// Rejects anything the sync core could not later replay faithfully: missing
/// ids, empty or oversized carts, and totals that do not add up.
pub fn validate_transaction(tx: &Transaction) -> CoreResult<()> {
    validate_record_id("id", &tx.id)?;

    if tx.items.is_empty() {
        return Err(ValidationError::required("items").into());
    }
    if tx.items.len() > MAX_TRANSACTION_ITEMS {
        return Err(CoreError::TooManyItems {
            max: MAX_TRANSACTION_ITEMS,
        });
    }

    for item in &tx.items {
        validate_record_id("itemId", &item.item_id)?;
        validate_name("name", &item.name)?;
        validate_quantity(item.quantity)?;
        validate_amount("unitPrice", item.unit_price)?;
        if item.unit.trim().is_empty() {
            return Err(ValidationError::required("unit").into());
        }
    }

    let totals = &tx.totals;
    validate_amount("discount", totals.discount)?;
    validate_amount("tax", totals.tax)?;

    let subtotal = sum_line_items(&tx.items)?;
    if subtotal != totals.subtotal {
        return Err(CoreError::TotalsMismatch {
            field: "subtotal".into(),
            expected: subtotal.minor(),
            actual: totals.subtotal.minor(),
        });
    }

    if totals.discount > totals.subtotal {
        return Err(CoreError::DiscountExceedsSubtotal {
            discount: totals.discount.minor(),
            subtotal: totals.subtotal.minor(),
        });
    }

    let expected_total = totals
        .subtotal
        .checked_sub(totals.discount)
        .and_then(|m| m.checked_add(totals.tax))
        .ok_or_else(|| ValidationError::Overflow {
            field: "total".into(),
        })?;
    if expected_total != totals.total {
        return Err(CoreError::TotalsMismatch {
            field: "total".into(),
            expected: expected_total.minor(),
            actual: totals.total.minor(),
        });
    }

    if let Some(customer) = &tx.customer {
        validate_record_id("customer.id", &customer.id)?;
    }

    Ok(())
}

/// Validates a cached reference record before it is persisted.
pub fn validate_reference<R: ReferenceRecord>(record: &R) -> ValidationResult<()> {
    validate_record_id("id", record.id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LineItem, PaymentMethod, TransactionDraft};
    use chrono::Utc;

    fn sample() -> Transaction {
        let items = vec![LineItem {
            item_id: "kopi-susu".into(),
            name: "Kopi Susu".into(),
            unit_price: Money::from_minor(25_000),
            quantity: 5,
            unit: "cup".into(),
        }];
        TransactionDraft::new(items, PaymentMethod::Cash)
            .into_transaction(Utc::now())
            .unwrap()
    }

    #[test]
    fn test_validate_record_id() {
        assert!(validate_record_id("id", "t1").is_ok());
        assert!(validate_record_id("id", "").is_err());
        assert!(validate_record_id("id", "has space").is_err());
        assert!(validate_record_id("id", "trx-\u{7f}").is_err());
        assert!(validate_record_id("id", "trx-\u{1b}[0m").is_err());
        assert!(validate_record_id("id", "trx-\u{85}").is_err());
        assert!(validate_record_id("id", "trx-café").is_ok());
        assert!(validate_record_id("id", &"x".repeat(MAX_RECORD_ID_LEN + 1)).is_err());
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
    fn test_valid_transaction_passes() {
        assert!(validate_transaction(&sample()).is_ok());
    }

    #[test]
    fn test_empty_items_rejected() {
        let mut tx = sample();
        tx.items.clear();
        assert!(matches!(
            validate_transaction(&tx),
            Err(CoreError::Validation(ValidationError::Required { .. }))
        ));
    }

    #[test]
    fn test_tampered_total_rejected() {
        let mut tx = sample();
        tx.totals.total = Money::from_minor(1);
        let err = validate_transaction(&tx).unwrap_err();
        assert!(matches!(err, CoreError::TotalsMismatch { ref field, .. } if field == "total"));
    }

    #[test]
    fn test_tampered_subtotal_rejected() {
        let mut tx = sample();
        tx.totals.subtotal = Money::from_minor(10);
        assert!(matches!(
            validate_transaction(&tx),
            Err(CoreError::TotalsMismatch { .. })
        ));
    }

    #[test]
    fn test_negative_price_rejected() {
        let mut tx = sample();
        tx.items[0].unit_price = Money::from_minor(-1);
        assert!(validate_transaction(&tx).is_err());
    }
}
