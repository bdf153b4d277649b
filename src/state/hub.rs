//! The hub: shared state for every connection and the router.
//!
//! Constructed once at startup and handed around as `Arc<Hub>`. Holds the
//! connection registry, the live group subscriptions, the persistence
//! collaborator and the sending half of the router's queue.

use super::{ConnectionHandle, ConnectionRegistry, DeliveryOutcome, GroupSubscriptions, Payload};
use crate::config::{Config, ConnectionConfig, HubConfig};
use crate::error::RouteError;
use crate::ids;
use crate::routing::{CallSignalRelay, Envelope, MessageRouter};
use crate::store::ChatStore;
use chathub_proto::{CallRequest, SystemNotice};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Content of the notice pushed when a group is dismissed.
pub const GROUP_DISMISS: &str = "group_dismiss";

/// The parts of [`Config`] the hub itself uses.
#[derive(Debug, Clone, Default)]
pub struct HubSettings {
    pub hub: HubConfig,
    pub connection: ConnectionConfig,
}

impl From<&Config> for HubSettings {
    fn from(config: &Config) -> Self {
        Self {
            hub: config.hub.clone(),
            connection: config.connection.clone(),
        }
    }
}

pub struct Hub {
    registry: ConnectionRegistry,
    subscriptions: GroupSubscriptions,
    router_tx: mpsc::Sender<Envelope>,
    store: Arc<dyn ChatStore>,
    settings: HubSettings,
    shutdown: CancellationToken,
}

impl Hub {
    /// Build a hub and the receiving end of its router queue.
    ///
    /// The receiver must be handed to a [`MessageRouter`]; see [`Hub::start`].
    pub fn new(
        settings: HubSettings,
        store: Arc<dyn ChatStore>,
    ) -> (Arc<Self>, mpsc::Receiver<Envelope>) {
        let (router_tx, router_rx) = mpsc::channel(settings.hub.router_queue.max(1));
        let hub = Arc::new(Self {
            registry: ConnectionRegistry::new(),
            subscriptions: GroupSubscriptions::new(),
            router_tx,
            store,
            settings,
            shutdown: CancellationToken::new(),
        });
        (hub, router_rx)
    }

    /// Build a hub and spawn its router task.
    pub fn start(settings: HubSettings, store: Arc<dyn ChatStore>) -> (Arc<Self>, JoinHandle<()>) {
        let (hub, rx) = Self::new(settings, store);
        let router = tokio::spawn(MessageRouter::new(hub.clone(), rx).run());
        (hub, router)
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn subscriptions(&self) -> &GroupSubscriptions {
        &self.subscriptions
    }

    pub fn store(&self) -> &Arc<dyn ChatStore> {
        &self.store
    }

    pub fn settings(&self) -> &HubSettings {
        &self.settings
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    // ========================================================================
    // Connection lifecycle
    // ========================================================================

    /// Make `handle` the user's live connection.
    ///
    /// A previous connection is cancelled and its group subscriptions are
    /// dropped, so the new connection starts with none.
    pub fn attach(&self, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        let user_id = handle.user_id.clone();
        let replaced = self.registry.register(handle);
        if replaced.is_some() {
            self.subscriptions.unsubscribe_all(&user_id);
        }
        replaced
    }

    /// Remove `handle` if it is still the user's live connection, along with
    /// its subscriptions. Returns false if a newer connection took over.
    pub fn detach(&self, handle: &ConnectionHandle) -> bool {
        self.subscriptions
            .unsubscribe_all_if(&handle.user_id, || self.registry.release(handle))
            .is_some()
    }

    /// Subscribe `handle`'s user to a group, unless the connection has
    /// already been replaced or torn down.
    pub fn join_group(&self, handle: &ConnectionHandle, group_id: &str) -> bool {
        self.subscriptions
            .subscribe_if(&handle.user_id, group_id, || self.registry.is_current(handle))
    }

    /// Unsubscribe `handle`'s user from a group. A replaced connection
    /// cannot touch the subscriptions of its successor.
    pub fn leave_group(&self, handle: &ConnectionHandle, group_id: &str) -> bool {
        self.subscriptions
            .unsubscribe_if(&handle.user_id, group_id, || self.registry.is_current(handle))
    }

    /// Log a user out: their connection is removed now and its tasks are
    /// cancelled. Returns false if the user was not online.
    pub fn disconnect_user(&self, user_id: &str) -> bool {
        let mut removed = None;
        self.subscriptions.unsubscribe_all_if(user_id, || {
            removed = self.registry.unregister(user_id);
            removed.is_some()
        });
        match removed {
            Some(handle) => {
                info!(user = %user_id, conn = handle.conn_id, "Disconnecting user");
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Stop the router and cancel every connection.
    pub fn shutdown(&self) {
        info!(online = self.registry.online_count(), "Hub shutting down");
        self.shutdown.cancel();
        self.registry.cancel_all();
    }

    // ========================================================================
    // Traffic
    // ========================================================================

    /// Hand an envelope to the router without waiting.
    ///
    /// Returns false if the router queue is full or gone; the envelope is
    /// dropped in that case.
    pub fn submit(&self, envelope: Envelope) -> bool {
        match self.router_tx.try_send(envelope) {
            Ok(()) => true,
            Err(TrySendError::Full(envelope)) => {
                warn!(sender = %envelope.sender_id, "Router queue full, dropping message");
                crate::metrics::record_dropped("router_full");
                false
            }
            Err(TrySendError::Closed(envelope)) => {
                debug!(sender = %envelope.sender_id, "Router stopped, dropping message");
                false
            }
        }
    }

    /// Push to one user if online. Never blocks.
    pub fn deliver(&self, user_id: &str, payload: Payload) -> DeliveryOutcome {
        self.registry.deliver(user_id, payload)
    }

    /// Forward a call signal from `from`.
    pub fn relay_call(&self, from: &str, request: CallRequest) -> Result<DeliveryOutcome, RouteError> {
        CallSignalRelay::new(&self.registry).forward(from, request)
    }

    /// Best-effort system notice to one user.
    pub fn send_system(&self, user_id: &str, content: &str) -> DeliveryOutcome {
        let notice = SystemNotice::new(
            ids::prefixed("SYS"),
            user_id,
            content,
            chrono::Utc::now().timestamp(),
        );
        match chathub_proto::encode(&notice) {
            Ok(text) => self.deliver(user_id, text.into()),
            Err(e) => {
                warn!(user = %user_id, error = %e, "Failed to encode system notice");
                DeliveryOutcome::Dropped
            }
        }
    }

    /// Tell a group's live subscribers it was dismissed, then forget the
    /// group's live set. Returns how many pushes were queued.
    pub fn push_group_dismiss(&self, group_id: &str) -> usize {
        let notice = SystemNotice::new(
            ids::prefixed("SYS"),
            group_id,
            GROUP_DISMISS,
            chrono::Utc::now().timestamp(),
        );
        let payload: Payload = match chathub_proto::encode(&notice) {
            Ok(text) => text.into(),
            Err(e) => {
                warn!(group = %group_id, error = %e, "Failed to encode dismiss notice");
                return 0;
            }
        };

        let members = self.subscriptions.dismiss(group_id);
        let queued = members
            .iter()
            .filter(|user_id| self.deliver(user_id, payload.clone()).is_queued())
            .count();
        info!(group = %group_id, members = members.len(), queued, "Group dismissed");
        queued
    }
}
