//! In-process test hub.
//!
//! Runs a real [`Hub`] and router over an in-memory database. Clients are
//! attached through duplex pipes, so no sockets are involved; the gateway
//! tests bind a real listener instead.

use super::{TestClient, wait_until};
use chathub::db::{Database, MessageStatus};
use chathub::network::{ClientConnection, ConnectionState};
use chathub::security::TokenAuthority;
use chathub::state::{Hub, HubSettings};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::protocol::Role;

pub const TEST_SECRET: &str = "integration-test-secret-0123456789";

const WAIT: Duration = Duration::from_secs(5);

/// A running hub.
pub struct TestHub {
    pub hub: Arc<Hub>,
    pub db: Database,
    pub auth: Arc<TokenAuthority>,
    router: JoinHandle<()>,
}

#[allow(dead_code)]
impl TestHub {
    /// Start a hub with default settings.
    pub async fn start() -> Self {
        Self::with_settings(HubSettings::default()).await
    }

    pub async fn with_settings(settings: HubSettings) -> Self {
        let db = Database::new(":memory:").await.expect("in-memory database");
        let (hub, router) = Hub::start(settings, Arc::new(db.clone()));
        Self {
            hub,
            db,
            auth: Arc::new(TokenAuthority::new(TEST_SECRET)),
            router,
        }
    }

    /// Attach a client for `user` and consume its welcome notice.
    pub async fn connect(&self, user: &str) -> TestClient {
        let (mut client, _task) = self.spawn_connection(user).await;
        let welcome = client.recv_notice().await.expect("welcome notice");
        assert_eq!(welcome.receive_id, user);
        client
    }

    /// Attach a client without waiting for anything.
    pub async fn spawn_connection(&self, user: &str) -> (TestClient, JoinHandle<ConnectionState>) {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let hub = self.hub.clone();
        let user_id = user.to_string();
        let task = tokio::spawn(async move {
            let ws = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
            ClientConnection::new(hub, user_id, ws).run().await
        });
        let ws = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        (TestClient::new(ws, user), task)
    }

    /// Register a durable group so messages to it route as group messages.
    pub async fn create_group(&self, group: &str, owner: &str) {
        self.db
            .groups()
            .create(group, group, "", owner)
            .await
            .expect("create group");
    }

    pub async fn wait_for_member(&self, group: &str, user: &str) -> bool {
        wait_until(WAIT, || async move {
            self.hub
                .subscriptions()
                .members_of(group)
                .iter()
                .any(|u| u == user)
        })
        .await
    }

    pub async fn wait_offline(&self, user: &str) -> bool {
        wait_until(WAIT, || async move { !self.hub.registry().is_online(user) }).await
    }

    pub async fn wait_status(&self, message_id: &str, status: MessageStatus) -> bool {
        wait_until(WAIT, || async move {
            matches!(
                self.db.messages().find(message_id).await,
                Ok(Some(record)) if record.status() == Some(status)
            )
        })
        .await
    }

    /// Shut the hub down and wait for the router to stop.
    pub async fn shutdown(self) {
        self.hub.shutdown();
        tokio::time::timeout(WAIT, self.router)
            .await
            .expect("router stops")
            .expect("router task");
    }
}
