//! The message router.
//!
//! One task drains the envelope queue, so messages from one sender are
//! persisted and delivered in the order their reader enqueued them. Each
//! envelope is: classified, given a session, stored as pending, fanned out
//! to whoever is online, then marked sent in the background.

use super::Envelope;
use crate::db::{GroupRecord, MessageRecord, MessageStatus};
use crate::error::{RouteError, RouteResult};
use crate::ids;
use crate::state::{Hub, Payload};
use crate::store::{ChatStore, UserBasic};
use crate::telemetry::{RouteTimer, spans};
use chathub_proto::OutgoingMessage;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, warn};

/// Where an envelope went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Direct,
    Group,
}

impl RouteKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Group => "group",
        }
    }
}

/// Summary of one successfully routed envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routed {
    pub message_id: String,
    pub session_id: String,
    pub kind: RouteKind,
    /// Pushes that made it onto a recipient queue.
    pub queued: usize,
}

pub struct MessageRouter {
    hub: Arc<Hub>,
    rx: mpsc::Receiver<Envelope>,
}

impl MessageRouter {
    pub fn new(hub: Arc<Hub>, rx: mpsc::Receiver<Envelope>) -> Self {
        Self { hub, rx }
    }

    /// Consume envelopes until the hub shuts down or every sender is gone.
    pub async fn run(mut self) {
        let shutdown = self.hub.shutdown_token().clone();
        info!("Message router started");
        loop {
            let envelope = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                next = self.rx.recv() => match next {
                    Some(envelope) => envelope,
                    None => break,
                },
            };

            let span = spans::route(&envelope.sender_id, &envelope.receiver_id);
            if let Err(e) = route(&self.hub, envelope).instrument(span).await {
                crate::metrics::record_route_error(e.error_code());
                if e.is_malformed_input() {
                    debug!(code = e.error_code(), error = %e, "Rejected envelope");
                } else {
                    warn!(code = e.error_code(), error = %e, "Failed to route envelope");
                }
            }
        }
        info!("Message router stopped");
    }
}

/// Route one envelope.
pub async fn route(hub: &Hub, envelope: Envelope) -> RouteResult<Routed> {
    let mut timer = RouteTimer::start();

    if envelope.sender_id.is_empty() {
        return Err(RouteError::EmptySender);
    }
    if envelope.receiver_id.is_empty() {
        return Err(RouteError::EmptyReceiver);
    }

    let routed = match classify(hub, &envelope.receiver_id).await? {
        Target::Group(group) => route_group(hub, &envelope, &group).await?,
        Target::Direct => route_direct(hub, &envelope).await?,
    };

    timer.routed(routed.kind.as_str());
    crate::metrics::record_fanout(routed.queued);
    spawn_mark_delivered(hub.store().clone(), routed.message_id.clone());
    Ok(routed)
}

enum Target {
    Direct,
    Group(GroupRecord),
}

/// A receiver is a group if someone is subscribed to it live or the store
/// knows it as a group.
async fn classify(hub: &Hub, receiver_id: &str) -> RouteResult<Target> {
    let subscribed = hub.subscriptions().has_group(receiver_id);
    match hub.store().lookup_group(receiver_id).await? {
        Some(group) => Ok(Target::Group(group)),
        None if subscribed => Err(RouteError::GroupNotFound(receiver_id.to_string())),
        None => Ok(Target::Direct),
    }
}

async fn route_direct(hub: &Hub, envelope: &Envelope) -> RouteResult<Routed> {
    let store = hub.store();
    let session_id = store
        .ensure_direct_session(&envelope.sender_id, &envelope.receiver_id)
        .await?;
    let (record, payload) = persist(store.as_ref(), envelope, &session_id).await?;

    let mut queued = usize::from(
        hub.deliver(&envelope.receiver_id, payload.clone())
            .is_queued(),
    );
    if envelope.sender_id != envelope.receiver_id {
        queued += usize::from(hub.deliver(&envelope.sender_id, payload).is_queued());
    }

    Ok(Routed {
        message_id: record.uuid,
        session_id,
        kind: RouteKind::Direct,
        queued,
    })
}

async fn route_group(hub: &Hub, envelope: &Envelope, group: &GroupRecord) -> RouteResult<Routed> {
    let store = hub.store();
    let session_id = store
        .ensure_group_session(&envelope.sender_id, group)
        .await?;
    let (record, payload) = persist(store.as_ref(), envelope, &session_id).await?;

    let queued = hub
        .subscriptions()
        .members_of(&group.uuid)
        .iter()
        .filter(|user_id| hub.deliver(user_id, payload.clone()).is_queued())
        .count();

    Ok(Routed {
        message_id: record.uuid,
        session_id,
        kind: RouteKind::Group,
        queued,
    })
}

/// Store the message as pending and render the push everyone receives.
async fn persist(
    store: &dyn ChatStore,
    envelope: &Envelope,
    session_id: &str,
) -> RouteResult<(MessageRecord, Payload)> {
    let sender = match store.load_user_basic(&envelope.sender_id).await {
        Ok(basic) => basic,
        Err(e) => {
            warn!(user = %envelope.sender_id, error = %e, "Sender lookup failed, using defaults");
            None
        }
    };
    let sender = UserBasic::or_default(sender);
    let now = chrono::Utc::now().timestamp();

    let record = MessageRecord {
        uuid: ids::prefixed("M"),
        session_id: session_id.to_string(),
        kind: envelope.kind,
        content: envelope.content.clone(),
        url: envelope.url.clone(),
        send_id: envelope.sender_id.clone(),
        send_name: sender.display_name.clone(),
        send_avatar: sender.avatar.clone(),
        receive_id: envelope.receiver_id.clone(),
        file_type: envelope.file_type.clone(),
        file_name: envelope.file_name.clone(),
        file_size: envelope.file_size.clone(),
        status: MessageStatus::Pending.as_i16(),
        created_at: now,
    };
    store.save_message(&record).await?;

    let outgoing = OutgoingMessage {
        uuid: record.uuid.clone(),
        kind: record.kind,
        content: record.content.clone(),
        url: record.url.clone(),
        send_id: record.send_id.clone(),
        send_name: sender.display_name,
        send_avatar: sender.avatar,
        receive_id: record.receive_id.clone(),
        created_at: now,
    };
    let payload: Payload = chathub_proto::encode(&outgoing)?.into();
    Ok((record, payload))
}

fn spawn_mark_delivered(store: Arc<dyn ChatStore>, message_id: String) {
    tokio::spawn(async move {
        if let Err(e) = store.mark_delivered(&message_id).await {
            warn!(message = %message_id, error = %e, "Failed to mark message sent");
        }
    });
}
