//! Pushes sent from the hub to connected clients.

use crate::error::Result;
use crate::message_type;
use serde::{Deserialize, Serialize};

/// Chat message as delivered to recipients (and echoed to the sender).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    /// Message id, shared with the persisted record.
    pub uuid: String,
    /// Message type.
    #[serde(rename = "type")]
    pub kind: i16,
    /// Text body.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
    /// File URL.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    /// Sender id.
    pub send_id: String,
    /// Sender display name at send time.
    pub send_name: String,
    /// Sender avatar at send time.
    pub send_avatar: String,
    /// Target user or group id.
    pub receive_id: String,
    /// Unix seconds.
    pub created_at: i64,
}

/// Call signaling push. Relayed verbatim; the hub keeps no call state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSignal {
    /// Wire tag of the action (`call_invite`, ...).
    pub action: String,
    /// Call correlation id.
    pub call_id: String,
    /// Originating user.
    pub from: String,
    /// Addressed user.
    pub to: String,
    /// `audio` or `video`.
    pub call_type: String,
    /// Answer flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept: Option<bool>,
    /// SDP/ICE payload.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
    /// Unix seconds.
    pub created_at: i64,
}

/// Hub-generated notice (`type` 99). Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemNotice {
    /// Notice id.
    pub uuid: String,
    /// Always [`message_type::SYSTEM`].
    #[serde(rename = "type")]
    pub kind: i16,
    /// User or group the notice concerns.
    pub receive_id: String,
    /// Event name or text, e.g. `group_dismiss`.
    pub content: String,
    /// Unix seconds.
    pub created_at: i64,
}

impl SystemNotice {
    /// Build a notice for `receive_id`.
    pub fn new(
        uuid: impl Into<String>,
        receive_id: impl Into<String>,
        content: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            kind: message_type::SYSTEM,
            receive_id: receive_id.into(),
            content: content.into(),
            created_at,
        }
    }
}

/// Any push a client may receive, for client-side decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerPush {
    /// A chat message.
    Chat(OutgoingMessage),
    /// A call signal.
    Call(CallSignal),
    /// A system notice.
    System(SystemNotice),
}

impl ServerPush {
    /// Decode a push by shape: call signals carry `action`, notices carry
    /// `type` 99, everything else is a chat message.
    pub fn decode(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        if value.get("action").is_some() {
            return Ok(Self::Call(serde_json::from_value(value)?));
        }
        let kind = value.get("type").and_then(|t| t.as_i64());
        if kind == Some(i64::from(message_type::SYSTEM)) {
            return Ok(Self::System(serde_json::from_value(value)?));
        }
        Ok(Self::Chat(serde_json::from_value(value)?))
    }
}

/// Serialize a push to the JSON text sent on the wire.
pub fn encode<T: Serialize>(push: &T) -> Result<String> {
    Ok(serde_json::to_string(push)?)
}
