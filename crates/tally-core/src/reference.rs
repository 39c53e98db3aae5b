//! # Cached Reference Records
//!
//! Products and customers fetched from the remote system and kept on the
//! device so checkout keeps working offline.
//!
//! Every record kind implements [`ReferenceRecord`]; the store keeps them in
//! one family keyed by `(kind, id)` and writes are always full upserts.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

/// A record cached from the remote system.
pub trait ReferenceRecord: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {
    /// Discriminator stored alongside the record ("product", "customer").
    const KIND: &'static str;

    /// Identifier, unique within `KIND`.
    fn id(&self) -> &str;

    /// When the remote system last changed the record.
    fn last_updated(&self) -> DateTime<Utc>;
}

// =============================================================================
// Product
// =============================================================================

/// A product as cached for offline lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub price: Money,
    pub unit: String,
    #[ts(as = "String")]
    pub last_updated: DateTime<Utc>,
}

impl ReferenceRecord for Product {
    const KIND: &'static str = "product";

    fn id(&self) -> &str {
        &self.id
    }

    fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A customer as cached for offline lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[ts(as = "String")]
    pub last_updated: DateTime<Utc>,
}

impl ReferenceRecord for Customer {
    const KIND: &'static str = "customer";

    fn id(&self) -> &str {
        &self.id
    }

    fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }
}

impl From<&Customer> for crate::types::CustomerSnapshot {
    fn from(customer: &Customer) -> Self {
        crate::types::CustomerSnapshot {
            id: customer.id.clone(),
            name: customer.name.clone(),
            phone: customer.phone.clone(),
        }
    }
}
