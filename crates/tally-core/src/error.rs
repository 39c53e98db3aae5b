//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations on a transaction      │
//! │  └── ValidationError  - Field-level contract failures                  │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                      │
//! │  └── DbError          - Storage failures (+ wraps CoreError)           │
//! │                                                                         │
//! │  tally-sync errors (separate crate)                                    │
//! │  └── SyncError        - Network / remote / storage during a pass       │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → SyncError               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Contract errors are raised before anything is written, so a rejected
//! record never leaves a partial row behind.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule errors for transactions and reference records.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A transaction carries more line items than allowed.
    #[error("Transaction cannot have more than {max} items")]
    TooManyItems { max: usize },

    /// The discount is larger than the subtotal it applies to.
    #[error("Discount {discount} exceeds subtotal {subtotal}")]
    DiscountExceedsSubtotal { discount: i64, subtotal: i64 },

    /// Stored totals disagree with the line items.
    ///
    /// ## When This Occurs
    /// A caller hand-built a `Transaction` whose `subtotal` or `total` does
    /// not match what the items and adjustments add up to.
    #[error("{field} mismatch: expected {expected}, got {actual}")]
    TotalsMismatch {
        field: String,
        expected: i64,
        actual: i64,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Field-level validation errors.
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

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Invalid format (e.g., whitespace in an id).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Arithmetic on amounts overflowed.
    #[error("{field} overflowed")]
    Overflow { field: String },
}

impl ValidationError {
    pub(crate) fn required(field: &str) -> Self {
        ValidationError::Required {
            field: field.to_string(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
