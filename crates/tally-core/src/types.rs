//! # Domain Types
//!
//! The sale record that flows through the offline sync core.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ TransactionDraft│──►│   Transaction   │◄──│    LineItem     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  items          │   │  id (trx-ms-hex)│   │  item_id        │       │
//! │  │  discount, tax  │   │  totals         │   │  unit_price     │       │
//! │  │  payment_method │   │  synced         │   │  quantity, unit │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │     Totals      │   │  PaymentMethod  │                             │
//! │  │  subtotal       │   │  Cash, Card,    │                             │
//! │  │  discount, tax  │   │  Qris, Transfer │                             │
//! │  │  total          │   └─────────────────┘                             │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//! A `Transaction` serializes to camelCase JSON with the totals flattened
//! into the top-level object:
//! ```json
//! { "id": "t1", "items": [...], "subtotal": 125000, "discount": 0,
//!   "tax": 0, "total": 125000, "paymentMethod": "cash",
//!   "timestamp": "2026-10-18T09:30:00Z", "synced": false }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::validation;

// =============================================================================
// Payment Method
// =============================================================================

/// How the customer paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash payment.
    Cash,
    /// Card payment on an external terminal.
    Card,
    /// QR code payment.
    Qris,
    /// Bank transfer.
    Transfer,
}

impl PaymentMethod {
    /// Returns the wire name of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Qris => "qris",
            PaymentMethod::Transfer => "transfer",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Line Item
// =============================================================================

/// A line in a sale.
/// Uses snapshot pattern: name and price are frozen at sale time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Reference to the product record (may no longer exist in the cache).
    pub item_id: String,
    /// Display name at time of sale.
    pub name: String,
    /// Unit price at time of sale.
    pub unit_price: Money,
    /// Quantity sold, in `unit`.
    pub quantity: i64,
    /// Unit label ("pcs", "kg", "cup").
    pub unit: String,
}

impl LineItem {
    /// Line total (unit price × quantity), `None` on overflow.
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul_quantity(self.quantity)
    }
}

// =============================================================================
// Totals
// =============================================================================

/// Computed totals of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub total: Money,
}

impl Totals {
    /// Derives totals from line items and caller-supplied adjustments.
    ///
    /// `total = subtotal - discount + tax`. Tax is computed upstream; this
    /// only adds it.
    pub fn compute(items: &[LineItem], discount: Money, tax: Money) -> CoreResult<Self> {
        let subtotal = sum_line_items(items)?;

        if discount.is_negative() {
            return Err(ValidationError::Negative {
                field: "discount".into(),
            }
            .into());
        }
        if tax.is_negative() {
            return Err(ValidationError::Negative { field: "tax".into() }.into());
        }
        if discount > subtotal {
            return Err(CoreError::DiscountExceedsSubtotal {
                discount: discount.minor(),
                subtotal: subtotal.minor(),
            });
        }

        let total = subtotal
            .checked_sub(discount)
            .and_then(|m| m.checked_add(tax))
            .ok_or_else(|| ValidationError::Overflow {
                field: "total".into(),
            })?;

        Ok(Totals {
            subtotal,
            discount,
            tax,
            total,
        })
    }
}

/// Sums line totals with overflow checks.
pub(crate) fn sum_line_items(items: &[LineItem]) -> CoreResult<Money> {
    let mut subtotal = Money::zero();
    for item in items {
        subtotal = item
            .line_total()
            .and_then(|line| subtotal.checked_add(line))
            .ok_or_else(|| ValidationError::Overflow {
                field: "subtotal".into(),
            })?;
    }
    Ok(subtotal)
}

// =============================================================================
// Customer Snapshot
// =============================================================================

/// Customer details copied into the sale at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSnapshot {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

// =============================================================================
// Transaction
// =============================================================================

/// A recorded sale.
///
/// ## Invariants
/// - `items` and `totals` never change after creation
/// - `synced` moves from `false` to `true` once, never back
/// - never deleted by the sync core (audit trail)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub items: Vec<LineItem>,
    #[serde(flatten)]
    pub totals: Totals,
    pub payment_method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerSnapshot>,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
    pub synced: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cashier_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Transaction {
    /// Returns the grand total.
    #[inline]
    pub fn total(&self) -> Money {
        self.totals.total
    }

    /// Creation time as epoch milliseconds (the `timestamp` index key).
    #[inline]
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    /// True when both records carry the same sale, ignoring `synced`.
    pub fn same_content(&self, other: &Transaction) -> bool {
        self.id == other.id
            && self.items == other.items
            && self.totals == other.totals
            && self.payment_method == other.payment_method
            && self.customer == other.customer
            && self.timestamp == other.timestamp
            && self.cashier_id == other.cashier_id
            && self.note == other.note
    }
}

// =============================================================================
// Transaction Draft
// =============================================================================

/// What the UI hands over when a sale is rung up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDraft {
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub discount: Money,
    #[serde(default)]
    pub tax: Money,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub customer: Option<CustomerSnapshot>,
    #[serde(default)]
    pub cashier_id: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

impl TransactionDraft {
    /// Creates a draft with no adjustments.
    pub fn new(items: Vec<LineItem>, payment_method: PaymentMethod) -> Self {
        TransactionDraft {
            items,
            discount: Money::zero(),
            tax: Money::zero(),
            payment_method,
            customer: None,
            cashier_id: None,
            note: None,
        }
    }

    /// Turns the draft into an unsynced transaction created at `now`.
    pub fn into_transaction(self, now: DateTime<Utc>) -> CoreResult<Transaction> {
        let totals = Totals::compute(&self.items, self.discount, self.tax)?;

        let transaction = Transaction {
            id: generate_transaction_id(now),
            items: self.items,
            totals,
            payment_method: self.payment_method,
            customer: self.customer,
            timestamp: now,
            synced: false,
            cashier_id: self.cashier_id,
            note: self.note,
        };

        validation::validate_transaction(&transaction)?;
        Ok(transaction)
    }
}

/// Generates a transaction id: `trx-<epoch ms>-<8 hex chars>`.
///
/// The timestamp prefix keeps ids roughly sortable; the random suffix keeps
/// two sales rung up in the same millisecond apart.
pub fn generate_transaction_id(at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("trx-{}-{}", at.timestamp_millis(), &suffix[..8])
}
