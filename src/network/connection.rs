//! Connection - Drives one authenticated WebSocket.
//!
//! Each connection is split into two tasks that share a cancellation token:
//!
//! ```text
//!   ┌──────────────┐  ClientAction   ┌─────────────────────────────┐
//!   │    Reader    │ ──────────────▶ │ join/leave → subscriptions  │
//!   │ (this task)  │                 │ call_*     → relay          │
//!   └──────┬───────┘                 │ chat       → router queue   │
//!          │ cancel                  └─────────────────────────────┘
//!          ▼
//!   ┌──────────────┐  Payload   ┌──────────────────┐
//!   │    Writer    │ ◀───────── │ bounded outbound │ ◀── deliver()
//!   │  (spawned)   │            │      queue       │
//!   └──────────────┘            └──────────────────┘
//! ```
//!
//! Whichever side stops first tears the connection down; the other side
//! notices the cancelled token and exits.

use crate::routing::Envelope;
use crate::state::{ConnectionHandle, Hub, Payload};
use crate::telemetry::spans;
use chathub_proto::ClientAction;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

/// Floor for the keepalive period, whatever the settings say.
const MIN_PING_INTERVAL: Duration = Duration::from_secs(1);

/// Lifecycle of a connection. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ConnectionState {
    Connecting = 0,
    Active = 1,
    Closing = 2,
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Active,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// State shared by the reader and writer of one connection.
struct Lifecycle {
    state: AtomicU8,
    hub: Arc<Hub>,
    handle: ConnectionHandle,
}

impl Lifecycle {
    fn new(hub: Arc<Hub>, handle: ConnectionHandle) -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Connecting as u8),
            hub,
            handle,
        }
    }

    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn activate(&self) -> bool {
        self.state
            .compare_exchange(
                ConnectionState::Connecting as u8,
                ConnectionState::Active as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Tear down once. Later callers return false and do nothing.
    fn teardown(&self, cause: &'static str) -> bool {
        let first = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
                (s < ConnectionState::Closing as u8).then_some(ConnectionState::Closing as u8)
            })
            .is_ok();
        if !first {
            return false;
        }

        let released = self.hub.detach(&self.handle);
        self.handle.cancel();
        debug!(cause, released, "Connection closing");
        true
    }

    fn finish(&self) {
        self.state
            .store(ConnectionState::Closed as u8, Ordering::Release);
    }
}

/// A client connection handler.
pub struct ClientConnection<S> {
    hub: Arc<Hub>,
    user_id: String,
    conn_id: u64,
    ws: WebSocketStream<S>,
}

impl<S> ClientConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wrap an upgraded stream for an authenticated user.
    pub fn new(hub: Arc<Hub>, user_id: impl Into<String>, ws: WebSocketStream<S>) -> Self {
        let conn_id = hub.registry().next_conn_id();
        Self {
            hub,
            user_id: user_id.into(),
            conn_id,
            ws,
        }
    }

    pub fn conn_id(&self) -> u64 {
        self.conn_id
    }

    /// Run until the peer goes away, the connection is replaced or logged
    /// out, or the hub shuts down.
    pub async fn run(self) -> ConnectionState {
        let span = spans::connection(&self.user_id, self.conn_id);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(self) -> ConnectionState {
        let Self {
            hub,
            user_id,
            conn_id,
            mut ws,
        } = self;

        if hub.is_shutting_down() {
            let _ = ws.close(None).await;
            return ConnectionState::Closed;
        }

        let settings = hub.settings().clone();
        let (tx, rx) = mpsc::channel::<Payload>(settings.hub.outbound_queue.max(1));
        let cancel = hub.shutdown_token().child_token();
        let handle = ConnectionHandle::new(user_id.clone(), conn_id, tx, cancel.clone());
        let lifecycle = Arc::new(Lifecycle::new(hub.clone(), handle.clone()));

        hub.attach(handle.clone());
        if settings.hub.welcome {
            hub.send_system(&user_id, &format!("welcome {user_id}"));
        }
        lifecycle.activate();
        info!(online = hub.registry().online_count(), "Client connected");

        let (sink, stream) = ws.split();
        let writer = tokio::spawn(
            write_loop(
                sink,
                rx,
                cancel.clone(),
                settings.connection.ping_interval(),
                lifecycle.clone(),
            )
            .in_current_span(),
        );

        let reader = Reader {
            hub: &hub,
            handle: &handle,
            trust_wire_sender: settings.hub.trust_wire_sender,
        };
        reader
            .run(stream, &cancel, settings.connection.idle_timeout())
            .await;
        lifecycle.teardown("reader");

        if let Err(e) = writer.await {
            warn!(error = %e, "Writer task failed");
        }
        lifecycle.finish();
        info!("Client disconnected");
        lifecycle.state()
    }
}

struct Reader<'a> {
    hub: &'a Arc<Hub>,
    handle: &'a ConnectionHandle,
    trust_wire_sender: bool,
}

impl Reader<'_> {
    async fn run<S>(
        &self,
        mut stream: SplitStream<WebSocketStream<S>>,
        cancel: &CancellationToken,
        idle_timeout: Duration,
    ) where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Reader cancelled");
                    return;
                }
                next = tokio::time::timeout(idle_timeout, stream.next()) => next,
            };

            let message = match next {
                Err(_) => {
                    info!(timeout_secs = idle_timeout.as_secs(), "Idle timeout");
                    return;
                }
                Ok(None) => {
                    debug!("Stream ended");
                    return;
                }
                Ok(Some(Err(e))) => {
                    warn!(error = %e, "Read error");
                    return;
                }
                Ok(Some(Ok(message))) => message,
            };

            match message {
                Message::Text(text) => self.dispatch(&text),
                Message::Close(frame) => {
                    debug!(frame = ?frame, "Client initiated close");
                    return;
                }
                // Pings are answered by tungstenite; both count as activity.
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Binary(data) => {
                    debug!(len = data.len(), "Ignoring binary frame");
                }
                Message::Frame(_) => {}
            }
        }
    }

    fn dispatch(&self, text: &str) {
        let user_id = self.handle.user_id.as_str();
        let action = match ClientAction::decode(text) {
            Ok(action) => action,
            Err(e) => {
                debug!(code = e.error_code(), error = %e, "Ignoring malformed frame");
                return;
            }
        };

        match action {
            ClientAction::JoinGroup { group_id } => {
                if self.hub.join_group(self.handle, &group_id) {
                    debug!(group = %group_id, "Joined group");
                }
            }
            ClientAction::LeaveGroup { group_id } => {
                if self.hub.leave_group(self.handle, &group_id) {
                    debug!(group = %group_id, "Left group");
                }
            }
            ClientAction::Call(request) => {
                if let Err(e) = self.hub.relay_call(user_id, request) {
                    debug!(code = e.error_code(), error = %e, "Dropping call signal");
                }
            }
            ClientAction::SendMessage(chat) => {
                let envelope = Envelope::from_chat(chat, user_id, self.trust_wire_sender);
                self.hub.submit(envelope);
            }
        }
    }
}

async fn write_loop<S>(
    mut sink: SplitSink<WebSocketStream<S>, Message>,
    mut rx: mpsc::Receiver<Payload>,
    cancel: CancellationToken,
    ping_interval: Duration,
    lifecycle: Arc<Lifecycle>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // `interval_at` panics on a zero period.
    let ping_interval = ping_interval.max(MIN_PING_INTERVAL);
    let mut ping = tokio::time::interval_at(Instant::now() + ping_interval, ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = rx.recv() => {
                let Some(payload) = next else { break };
                if let Err(e) = sink.send(Message::Text(payload.to_string())).await {
                    warn!(error = %e, "Write error");
                    break;
                }
            }
            _ = ping.tick() => {
                if let Err(e) = sink.send(Message::Ping(Vec::new())).await {
                    warn!(error = %e, "Ping failed");
                    break;
                }
            }
        }
    }

    lifecycle.teardown("writer");
    // Sends a close frame if the peer has not already closed.
    let _ = sink.close().await;
}
