//! # Connectivity Monitor
//!
//! Tracks whether the device is online and tells interested parties when
//! that changes.
//!
//! ## Notification Rules
//! ```text
//! report(Offline)   status Online → Offline   listeners called with Offline
//! report(Offline)   status Offline → Offline  nothing (duplicate state)
//! report(Online)    status Offline → Online   listeners called with Online
//! ```
//!
//! The platform layer owns detection and feeds every raw event into
//! [`ConnectivityMonitor::report`]; deduplication happens here. Listeners run
//! outside the internal lock, so a listener may unsubscribe itself (or any
//! other subscription) while it is being called.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::watch;
use tracing::{debug, info};
use ts_rs::TS;

/// Online or offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityStatus {
    Online,
    Offline,
}

impl ConnectivityStatus {
    /// True when online.
    pub fn is_online(&self) -> bool {
        matches!(self, ConnectivityStatus::Online)
    }
}

impl std::fmt::Display for ConnectivityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectivityStatus::Online => write!(f, "online"),
            ConnectivityStatus::Offline => write!(f, "offline"),
        }
    }
}

type Listener = Arc<dyn Fn(ConnectivityStatus) + Send + Sync>;

struct State {
    status: ConnectivityStatus,
    listeners: BTreeMap<u64, Listener>,
    next_id: u64,
}

struct Shared {
    state: Mutex<State>,
    watch_tx: watch::Sender<ConnectivityStatus>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        // Listener panics happen outside the lock, so the state is never
        // left half-updated.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Current connectivity plus transition notifications.
///
/// Clones share state; hand one to every component that needs it.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("status", &self.current_status())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl ConnectivityMonitor {
    /// Creates a monitor starting in `initial`.
    pub fn new(initial: ConnectivityStatus) -> Self {
        let (watch_tx, _) = watch::channel(initial);

        ConnectivityMonitor {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    status: initial,
                    listeners: BTreeMap::new(),
                    next_id: 0,
                }),
                watch_tx,
            }),
        }
    }

    /// Current status.
    pub fn current_status(&self) -> ConnectivityStatus {
        self.shared.lock().status
    }

    /// Shorthand for `current_status().is_online()`.
    pub fn is_online(&self) -> bool {
        self.current_status().is_online()
    }

    /// Feeds a raw platform event.
    ///
    /// Returns `true` if the status changed and listeners were notified.
    pub fn report(&self, status: ConnectivityStatus) -> bool {
        let snapshot: Vec<(u64, Listener)> = {
            let mut state = self.shared.lock();
            if state.status == status {
                debug!(%status, "Connectivity unchanged");
                return false;
            }
            state.status = status;
            // Under the lock so the watch never disagrees with `status`.
            self.shared.watch_tx.send_replace(status);
            state
                .listeners
                .iter()
                .map(|(id, listener)| (*id, Arc::clone(listener)))
                .collect()
        };

        info!(%status, listeners = snapshot.len(), "Connectivity changed");

        for (id, listener) in snapshot {
            // Skip listeners removed by an earlier listener in this round.
            let registered = self.shared.lock().listeners.contains_key(&id);
            if registered {
                listener(status);
            }
        }

        true
    }

    /// Registers `callback` for every future transition.
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// unsubscribed or dropped.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(ConnectivityStatus) + Send + Sync + 'static,
    {
        let id = {
            let mut state = self.shared.lock();
            let id = state.next_id;
            state.next_id += 1;
            state.listeners.insert(id, Arc::new(callback));
            id
        };

        Subscription {
            id,
            shared: Arc::downgrade(&self.shared),
            active: AtomicBool::new(true),
        }
    }

    /// A receiver that always holds the latest status.
    pub fn watch(&self) -> watch::Receiver<ConnectivityStatus> {
        self.shared.watch_tx.subscribe()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.shared.lock().listeners.len()
    }
}

/// Disposer returned by [`ConnectivityMonitor::subscribe`].
pub struct Subscription {
    id: u64,
    shared: Weak<Shared>,
    active: AtomicBool,
}

impl Subscription {
    /// Removes the listener. Calling this more than once is a no-op.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(shared) = self.shared.upgrade() {
            shared.lock().listeners.remove(&self.id);
        }
    }

    /// False once unsubscribed.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn recorder() -> (
        Arc<Mutex<Vec<ConnectivityStatus>>>,
        impl Fn(ConnectivityStatus) + Send + Sync + 'static,
    ) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |s| sink.lock().unwrap().push(s))
    }

    #[test]
    fn test_fires_once_per_transition() {
        let monitor = ConnectivityMonitor::new(ConnectivityStatus::Online);
        let (seen, callback) = recorder();
        let _sub = monitor.subscribe(callback);

        assert!(monitor.report(ConnectivityStatus::Offline));
        assert!(!monitor.report(ConnectivityStatus::Offline));
        assert!(monitor.report(ConnectivityStatus::Online));
        assert!(!monitor.report(ConnectivityStatus::Online));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![ConnectivityStatus::Offline, ConnectivityStatus::Online]
        );
        assert!(monitor.is_online());
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let monitor = ConnectivityMonitor::new(ConnectivityStatus::Offline);
        let (seen, callback) = recorder();
        let sub = monitor.subscribe(callback);

        sub.unsubscribe();
        sub.unsubscribe();
        assert!(!sub.is_active());
        assert_eq!(monitor.listener_count(), 0);

        monitor.report(ConnectivityStatus::Online);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_drop_unsubscribes() {
        let monitor = ConnectivityMonitor::new(ConnectivityStatus::Offline);
        let (_seen, callback) = recorder();
        {
            let _sub = monitor.subscribe(callback);
            assert_eq!(monitor.listener_count(), 1);
        }
        assert_eq!(monitor.listener_count(), 0);
    }

    #[test]
    fn test_unsubscribe_from_inside_callback() {
        let monitor = ConnectivityMonitor::new(ConnectivityStatus::Offline);
        let calls = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let sub = {
            let calls = Arc::clone(&calls);
            let slot = Arc::clone(&slot);
            monitor.subscribe(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                if let Some(sub) = slot.lock().unwrap().as_ref() {
                    sub.unsubscribe();
                }
            })
        };
        *slot.lock().unwrap() = Some(sub);

        monitor.report(ConnectivityStatus::Online);
        monitor.report(ConnectivityStatus::Offline);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.listener_count(), 0);
    }

    #[test]
    fn test_listener_removed_mid_round_is_skipped() {
        let monitor = ConnectivityMonitor::new(ConnectivityStatus::Offline);
        let second_calls = Arc::new(AtomicUsize::new(0));
        let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let _first = {
            let victim = Arc::clone(&victim);
            monitor.subscribe(move |_| {
                if let Some(sub) = victim.lock().unwrap().as_ref() {
                    sub.unsubscribe();
                }
            })
        };
        let second = {
            let calls = Arc::clone(&second_calls);
            monitor.subscribe(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        *victim.lock().unwrap() = Some(second);

        monitor.report(ConnectivityStatus::Online);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_watch_sees_latest_status() {
        let monitor = ConnectivityMonitor::new(ConnectivityStatus::Offline);
        let mut rx = monitor.watch();

        monitor.report(ConnectivityStatus::Online);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ConnectivityStatus::Online);
    }

    #[test]
    fn test_watch_agrees_with_status_under_racing_reports() {
        let monitor = ConnectivityMonitor::new(ConnectivityStatus::Offline);

        for _ in 0..500 {
            let handles: Vec<_> = [ConnectivityStatus::Online, ConnectivityStatus::Offline]
                .into_iter()
                .map(|status| {
                    let monitor = monitor.clone();
                    std::thread::spawn(move || {
                        monitor.report(status);
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
            assert_eq!(*monitor.watch().borrow(), monitor.current_status());
        }
    }
}
