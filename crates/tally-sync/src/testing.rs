//! Shared fixtures for this crate's tests.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tally_core::{LineItem, Money, PaymentMethod, Transaction, TransactionDraft};
use tally_db::{Database, DbConfig};

use crate::endpoint::RemoteEndpoint;
use crate::error::{SyncError, SyncResult};
use crate::events::{SyncEventEmitter, SyncStatus};

/// A cash sale of two iced teas created at `ms`.
pub(crate) fn sale_at(ms: i64) -> Transaction {
    let items = vec![LineItem {
        item_id: "es-teh".into(),
        name: "Es Teh".into(),
        unit_price: Money::from_minor(5_000),
        quantity: 2,
        unit: "glass".into(),
    }];
    TransactionDraft::new(items, PaymentMethod::Cash)
        .into_transaction(Utc.timestamp_millis_opt(ms).unwrap())
        .unwrap()
}

pub(crate) async fn memory_db() -> Database {
    Database::open(DbConfig::in_memory()).await.unwrap()
}

/// Records every submission; fails the ids it is told to.
#[derive(Default)]
pub(crate) struct ScriptedEndpoint {
    submitted: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    fail_all: AtomicBool,
    delay: Option<Duration>,
}

impl ScriptedEndpoint {
    pub(crate) fn accepting() -> Self {
        Self::default()
    }

    pub(crate) fn failing(ids: &[&str]) -> Self {
        let endpoint = Self::default();
        endpoint
            .failing
            .lock()
            .unwrap()
            .extend(ids.iter().map(|id| id.to_string()));
        endpoint
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteEndpoint for ScriptedEndpoint {
    async fn submit(&self, tx: &Transaction) -> SyncResult<()> {
        self.submitted.lock().unwrap().push(tx.id.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let fail = self.fail_all.load(Ordering::SeqCst)
            || self.failing.lock().unwrap().contains(&tx.id);
        if fail {
            return Err(SyncError::RemoteUnavailable { status: 503 });
        }
        Ok(())
    }
}

/// Everything an engine emitted, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Emitted {
    Status(SyncStatus),
    Progress { pending: usize, synced: usize },
    Error { retryable: bool },
}

#[derive(Default)]
pub(crate) struct RecordingEmitter {
    events: Mutex<Vec<Emitted>>,
}

impl RecordingEmitter {
    pub(crate) fn events(&self) -> Vec<Emitted> {
        self.events.lock().unwrap().clone()
    }
}

impl SyncEventEmitter for RecordingEmitter {
    fn emit_status(&self, status: SyncStatus) {
        self.events.lock().unwrap().push(Emitted::Status(status));
    }

    fn emit_progress(&self, pending: usize, synced: usize) {
        self.events
            .lock()
            .unwrap()
            .push(Emitted::Progress { pending, synced });
    }

    fn emit_error(&self, _message: &str, retryable: bool) {
        self.events.lock().unwrap().push(Emitted::Error { retryable });
    }
}
