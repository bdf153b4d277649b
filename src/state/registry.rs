//! Connection registry: which users are online and through which handle.
//!
//! The registry is the only place that knows how to reach a user. Delivery
//! never blocks: a push either lands on the user's bounded queue or is
//! dropped and counted.

use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Serialized push, shared between every recipient of a fan-out.
pub type Payload = Arc<str>;

/// Result of a single push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Placed on the recipient's outbound queue.
    Queued,
    /// Recipient has no live connection; nothing was written.
    Offline,
    /// Recipient's queue was full; the push was discarded.
    Dropped,
    /// Recipient's writer has already gone away.
    Closed,
}

impl DeliveryOutcome {
    pub fn is_queued(self) -> bool {
        self == Self::Queued
    }
}

/// A live connection as seen by the rest of the hub.
///
/// Cheap to clone; clones share the queue and cancellation token.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub user_id: String,
    pub conn_id: u64,
    pub connected_at: i64,
    tx: mpsc::Sender<Payload>,
    cancel: CancellationToken,
}

impl ConnectionHandle {
    pub fn new(
        user_id: impl Into<String>,
        conn_id: u64,
        tx: mpsc::Sender<Payload>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            conn_id,
            connected_at: chrono::Utc::now().timestamp(),
            tx,
            cancel,
        }
    }

    /// Ask the connection's tasks to stop.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Non-blocking push onto this connection's queue.
    pub fn try_push(&self, payload: Payload) -> DeliveryOutcome {
        match self.tx.try_send(payload) {
            Ok(()) => DeliveryOutcome::Queued,
            Err(TrySendError::Full(_)) => {
                warn!(user = %self.user_id, conn = self.conn_id, "Outbound queue full, dropping push");
                crate::metrics::record_dropped("backpressure");
                DeliveryOutcome::Dropped
            }
            Err(TrySendError::Closed(_)) => {
                debug!(user = %self.user_id, conn = self.conn_id, "Outbound queue closed");
                DeliveryOutcome::Closed
            }
        }
    }
}

/// User id → live connection.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    conns: DashMap<String, ConnectionHandle>,
    next_conn_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a connection id, unique for the registry's lifetime.
    pub fn next_conn_id(&self) -> u64 {
        self.next_conn_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Insert `handle`, replacing any connection the user already had.
    ///
    /// The replaced handle is cancelled so its tasks wind down on their own,
    /// and returned to the caller.
    pub fn register(&self, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        let user_id = handle.user_id.clone();
        let replaced = self.conns.insert(user_id.clone(), handle);
        if let Some(old) = &replaced {
            debug!(user = %user_id, conn = old.conn_id, "Replacing existing connection");
            old.cancel();
        }
        crate::metrics::set_connected_users(self.conns.len());
        replaced
    }

    /// Remove the user's entry, whichever connection it points at.
    pub fn unregister(&self, user_id: &str) -> Option<ConnectionHandle> {
        let removed = self.conns.remove(user_id).map(|(_, h)| h);
        if removed.is_some() {
            crate::metrics::set_connected_users(self.conns.len());
        }
        removed
    }

    /// Remove the entry only if it still belongs to `handle`'s connection.
    ///
    /// Returns whether anything was removed.
    pub fn release(&self, handle: &ConnectionHandle) -> bool {
        let removed = self
            .conns
            .remove_if(&handle.user_id, |_, current| current.conn_id == handle.conn_id)
            .is_some();
        if removed {
            crate::metrics::set_connected_users(self.conns.len());
        }
        removed
    }

    pub fn lookup(&self, user_id: &str) -> Option<ConnectionHandle> {
        self.conns.get(user_id).map(|h| h.value().clone())
    }

    /// Whether `handle` is the user's registered connection.
    pub fn is_current(&self, handle: &ConnectionHandle) -> bool {
        self.conns
            .get(&handle.user_id)
            .is_some_and(|h| h.conn_id == handle.conn_id)
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.conns.contains_key(user_id)
    }

    /// Push to a user if online. Never blocks.
    pub fn deliver(&self, user_id: &str, payload: Payload) -> DeliveryOutcome {
        match self.conns.get(user_id) {
            Some(handle) => handle.try_push(payload),
            None => DeliveryOutcome::Offline,
        }
    }

    pub fn online_count(&self) -> usize {
        self.conns.len()
    }

    pub fn online_users(&self) -> Vec<String> {
        self.conns.iter().map(|e| e.key().clone()).collect()
    }

    /// Cancel every live connection.
    pub fn cancel_all(&self) {
        for entry in self.conns.iter() {
            entry.value().cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(registry: &ConnectionRegistry, user: &str, cap: usize) -> (ConnectionHandle, mpsc::Receiver<Payload>) {
        let (tx, rx) = mpsc::channel(cap);
        let h = ConnectionHandle::new(user, registry.next_conn_id(), tx, CancellationToken::new());
        (h, rx)
    }

    #[test]
    fn offline_delivery_writes_nothing() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.deliver("ghost", "hi".into()), DeliveryOutcome::Offline);
        assert!(registry.lookup("ghost").is_none());
    }

    #[tokio::test]
    async fn deliver_queues_for_online_user() {
        let registry = ConnectionRegistry::new();
        let (h, mut rx) = handle(&registry, "U1", 4);
        registry.register(h);

        assert!(registry.deliver("U1", "hi".into()).is_queued());
        assert_eq!(&*rx.recv().await.unwrap(), "hi");
    }

    #[test]
    fn full_queue_drops_newest_without_blocking() {
        let registry = ConnectionRegistry::new();
        let (h, mut rx) = handle(&registry, "U1", 1);
        registry.register(h);

        assert_eq!(registry.deliver("U1", "first".into()), DeliveryOutcome::Queued);
        assert_eq!(registry.deliver("U1", "second".into()), DeliveryOutcome::Dropped);
        assert_eq!(&*rx.try_recv().unwrap(), "first");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_queue_is_reported() {
        let registry = ConnectionRegistry::new();
        let (h, rx) = handle(&registry, "U1", 1);
        registry.register(h);
        drop(rx);
        assert_eq!(registry.deliver("U1", "hi".into()), DeliveryOutcome::Closed);
    }

    #[test]
    fn register_is_last_writer_wins_and_cancels_old() {
        let registry = ConnectionRegistry::new();
        let (old, _rx1) = handle(&registry, "U1", 1);
        let (new, _rx2) = handle(&registry, "U1", 1);

        assert!(registry.register(old.clone()).is_none());
        let replaced = registry.register(new.clone()).unwrap();

        assert_eq!(replaced.conn_id, old.conn_id);
        assert!(old.cancel_token().is_cancelled());
        assert!(!new.cancel_token().is_cancelled());
        assert_eq!(registry.lookup("U1").unwrap().conn_id, new.conn_id);
        assert_eq!(registry.online_count(), 1);
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (h, _rx) = handle(&registry, "U1", 1);
        registry.register(h);

        assert!(registry.unregister("U1").is_some());
        assert!(registry.unregister("U1").is_none());
        assert!(!registry.is_online("U1"));
    }

    #[test]
    fn release_does_not_evict_newer_connection() {
        let registry = ConnectionRegistry::new();
        let (old, _rx1) = handle(&registry, "U1", 1);
        let (new, _rx2) = handle(&registry, "U1", 1);
        registry.register(old.clone());
        registry.register(new.clone());

        assert!(!registry.release(&old));
        assert!(registry.is_current(&new));
        assert!(registry.release(&new));
        assert!(!registry.release(&new));
        assert_eq!(registry.online_count(), 0);
    }

    #[test]
    fn online_users_and_cancel_all() {
        let registry = ConnectionRegistry::new();
        let (a, _rx1) = handle(&registry, "A", 1);
        let (b, _rx2) = handle(&registry, "B", 1);
        registry.register(a.clone());
        registry.register(b.clone());

        let mut users = registry.online_users();
        users.sort();
        assert_eq!(users, ["A", "B"]);

        registry.cancel_all();
        assert!(a.cancel_token().is_cancelled());
        assert!(b.cancel_token().is_cancelled());
    }
}
