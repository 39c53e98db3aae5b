//! # Repository Module
//!
//! One repository per record family in the offline store.
//!
//! ## Record Families
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Durable Local Store                              │
//! │                                                                         │
//! │  transactions         TransactionRepository                            │
//! │  ├── key: id          put / get_by_id / get_all                        │
//! │  ├── idx: synced      query_by_index(Synced(false))                    │
//! │  └── idx: timestamp   query_by_index(Timestamp { from, to })           │
//! │                                                                         │
//! │  reference_records    ReferenceRepository                              │
//! │  └── key: (kind, id)  put / put_all / get / get_all  (full upserts)    │
//! │                                                                         │
//! │  settings             SettingsRepository                               │
//! │  └── key: key         get / set (typed JSON), advance_millis           │
//! │                                                                         │
//! │  Every call is one atomic SQLite statement (or one SQL transaction)    │
//! │  and durable before it returns.                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`TransactionRepository`](transaction::TransactionRepository) - Recorded sales and sync flags
//! - [`ReferenceRepository`](reference::ReferenceRepository) - Cached products / customers
//! - [`SettingsRepository`](settings::SettingsRepository) - Key-value settings, sync timestamps

pub mod reference;
pub mod settings;
pub mod transaction;
