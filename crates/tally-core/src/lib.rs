//! # tally-core: Pure Domain Types for the Tally Offline Sync Core
//!
//! This crate holds the types every other layer agrees on, with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    UI / business layer                          │   │
//! │  │    record_transaction, list_transactions, get_sync_stats        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               tally-sync (engine, connectivity, trigger)        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               tally-db (Durable Local Store)                    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │   types · money · reference · validation                        │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Transaction, LineItem, Totals, TransactionDraft
//! - [`money`] - Integer money in minor units
//! - [`reference`] - Cached Product / Customer records
//! - [`validation`] - Contract checks run before any write
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::Utc;
//! use tally_core::{LineItem, Money, PaymentMethod, TransactionDraft};
//!
//! let items = vec![LineItem {
//!     item_id: "nasi-goreng".into(),
//!     name: "Nasi Goreng".into(),
//!     unit_price: Money::from_minor(25_000),
//!     quantity: 5,
//!     unit: "plate".into(),
//! }];
//!
//! let tx = TransactionDraft::new(items, PaymentMethod::Cash)
//!     .into_transaction(Utc::now())
//!     .unwrap();
//!
//! assert_eq!(tx.total().minor(), 125_000);
//! assert!(!tx.synced);
//! ```

pub mod error;
pub mod money;
pub mod reference;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use reference::{Customer, Product, ReferenceRecord};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items in a single transaction.
pub const MAX_TRANSACTION_ITEMS: usize = 200;

/// Maximum quantity of a single line item.
pub const MAX_ITEM_QUANTITY: i64 = 9_999;

/// Maximum length of any record identifier.
pub const MAX_RECORD_ID_LEN: usize = 128;
