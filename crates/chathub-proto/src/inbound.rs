//! Inbound client frames.
//!
//! A frame is first deserialized into the permissive [`WireFrame`] and then
//! narrowed into a closed [`ClientAction`]. Unknown `action` tags and
//! actions missing their required fields are rejected here, so the
//! connection layer only ever matches on well-formed variants.

use crate::error::{ProtocolError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Raw JSON shape of a client frame. Every field is optional on the wire.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireFrame {
    /// Message type (see [`crate::message_type`]).
    #[serde(rename = "type")]
    pub kind: Option<i16>,
    /// Text body, or SDP/ICE payload for call signals.
    pub content: Option<String>,
    /// File URL for file messages.
    pub url: Option<String>,
    /// Original file name.
    pub file_name: Option<String>,
    /// MIME type or extension.
    pub file_type: Option<String>,
    /// File size; clients send either a number or a string.
    pub file_size: Option<Value>,
    /// Claimed sender id.
    pub send_id: Option<String>,
    /// Target user or group id.
    pub receive_id: Option<String>,
    /// Action tag; absent means `send_message`.
    pub action: Option<String>,
    /// Group id for `join_group` / `leave_group`.
    pub group_id: Option<String>,
    /// `audio` or `video`.
    pub call_type: Option<String>,
    /// Call correlation id.
    pub call_id: Option<String>,
    /// Answer flag, only meaningful for `call_answer`.
    pub accept: Option<bool>,
}

/// A decoded client action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Chat message headed for the router.
    SendMessage(ChatSend),
    /// Subscribe to live pushes for a group.
    JoinGroup {
        /// Group to subscribe to.
        group_id: String,
    },
    /// Drop the live subscription for a group.
    LeaveGroup {
        /// Group to unsubscribe from.
        group_id: String,
    },
    /// Call signaling, relayed without persistence.
    Call(CallRequest),
}

/// Chat payload of a `send_message` action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatSend {
    /// Message type.
    pub kind: i16,
    /// Text body.
    pub content: String,
    /// File URL.
    pub url: String,
    /// Original file name.
    pub file_name: String,
    /// MIME type or extension.
    pub file_type: String,
    /// File size as sent by the client.
    pub file_size: String,
    /// Sender id claimed on the wire, if non-empty.
    pub send_id: Option<String>,
    /// Target user or group id (may be empty; the router rejects it).
    pub receive_id: String,
}

/// Call signaling request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    /// Which signal this is.
    pub action: CallAction,
    /// Call correlation id.
    pub call_id: String,
    /// Peer the signal is addressed to (`receiveId` on the wire).
    pub to: String,
    /// `audio` or `video`.
    pub call_type: String,
    /// Present only for answers.
    pub accept: Option<bool>,
    /// SDP offer/answer or ICE candidate.
    pub content: String,
}

/// Call signaling actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallAction {
    /// `call_invite`
    Invite,
    /// `call_answer`
    Answer,
    /// `call_candidate`
    Candidate,
    /// `call_end`
    End,
}

impl CallAction {
    /// Wire tag for this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invite => "call_invite",
            Self::Answer => "call_answer",
            Self::Candidate => "call_candidate",
            Self::End => "call_end",
        }
    }
}

impl fmt::Display for CallAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallAction {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "call_invite" => Ok(Self::Invite),
            "call_answer" => Ok(Self::Answer),
            "call_candidate" => Ok(Self::Candidate),
            "call_end" => Ok(Self::End),
            other => Err(ProtocolError::UnknownAction(other.to_string())),
        }
    }
}

impl ClientAction {
    /// Decode a text frame.
    pub fn decode(text: &str) -> Result<Self> {
        let frame: WireFrame = serde_json::from_str(text)?;
        Self::try_from(frame)
    }
}

impl TryFrom<WireFrame> for ClientAction {
    type Error = ProtocolError;

    fn try_from(frame: WireFrame) -> Result<Self> {
        let action = frame.action.as_deref().unwrap_or("");
        match action {
            "" | "send_message" => {
                match frame.kind {
                    Some(kind) if !is_client_type(kind) => {
                        return Err(ProtocolError::UnsupportedType(kind));
                    }
                    _ => {}
                }
                Ok(Self::SendMessage(ChatSend::from(frame)))
            }
            "join_group" => Ok(Self::JoinGroup {
                group_id: required(frame.group_id, "groupId")?,
            }),
            "leave_group" => Ok(Self::LeaveGroup {
                group_id: required(frame.group_id, "groupId")?,
            }),
            other => {
                let action = other.parse::<CallAction>()?;
                Ok(Self::Call(CallRequest {
                    action,
                    call_id: frame.call_id.unwrap_or_default(),
                    to: frame.receive_id.unwrap_or_default(),
                    call_type: frame.call_type.unwrap_or_default(),
                    accept: if action == CallAction::Answer {
                        frame.accept
                    } else {
                        None
                    },
                    content: frame.content.unwrap_or_default(),
                }))
            }
        }
    }
}

impl From<WireFrame> for ChatSend {
    fn from(frame: WireFrame) -> Self {
        Self {
            kind: frame.kind.unwrap_or(crate::message_type::TEXT),
            content: frame.content.unwrap_or_default(),
            url: frame.url.unwrap_or_default(),
            file_name: frame.file_name.unwrap_or_default(),
            file_type: frame.file_type.unwrap_or_default(),
            file_size: match frame.file_size {
                Some(Value::String(s)) => s,
                Some(Value::Number(n)) => n.to_string(),
                _ => String::new(),
            },
            send_id: frame.send_id.filter(|s| !s.is_empty()),
            receive_id: frame.receive_id.unwrap_or_default(),
        }
    }
}

/// Types a client may put on a chat frame. System notices are hub-only.
fn is_client_type(kind: i16) -> bool {
    use crate::message_type::{CALL, FILE, TEXT};
    matches!(kind, TEXT | FILE | CALL)
}

fn required(value: Option<String>, field: &'static str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ProtocolError::MissingField(field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_action_is_send_message() {
        let action =
            ClientAction::decode(r#"{"type":0,"content":"hi","receiveId":"G1","sendId":"U2"}"#)
                .unwrap();
        let ClientAction::SendMessage(send) = action else {
            panic!("expected send");
        };
        assert_eq!(send.content, "hi");
        assert_eq!(send.receive_id, "G1");
        assert_eq!(send.send_id.as_deref(), Some("U2"));
    }

    #[test]
    fn empty_send_id_falls_through_as_none() {
        let action = ClientAction::decode(r#"{"content":"x","receiveId":"B","sendId":""}"#).unwrap();
        let ClientAction::SendMessage(send) = action else {
            panic!("expected send");
        };
        assert_eq!(send.send_id, None);
        assert_eq!(send.kind, crate::message_type::TEXT);
    }

    #[test]
    fn explicit_send_message_tag() {
        let action =
            ClientAction::decode(r#"{"action":"send_message","receiveId":"B","content":"x"}"#)
                .unwrap();
        assert!(matches!(action, ClientAction::SendMessage(_)));
    }

    #[test]
    fn join_group_requires_group_id() {
        let err = ClientAction::decode(r#"{"action":"join_group","groupId":""}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingField("groupId")));

        let err = ClientAction::decode(r#"{"action":"join_group"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingField("groupId")));

        let ok = ClientAction::decode(r#"{"action":"join_group","groupId":"G1"}"#).unwrap();
        assert_eq!(
            ok,
            ClientAction::JoinGroup {
                group_id: "G1".into()
            }
        );
    }

    #[test]
    fn call_answer_keeps_accept_flag() {
        let action = ClientAction::decode(
            r#"{"action":"call_answer","callId":"c1","receiveId":"B","callType":"video","accept":true,"content":"sdp"}"#,
        )
        .unwrap();
        let ClientAction::Call(call) = action else {
            panic!("expected call");
        };
        assert_eq!(call.action, CallAction::Answer);
        assert_eq!(call.accept, Some(true));
        assert_eq!(call.to, "B");
        assert_eq!(call.content, "sdp");
    }

    #[test]
    fn accept_is_dropped_outside_answers() {
        let action =
            ClientAction::decode(r#"{"action":"call_invite","receiveId":"B","accept":false}"#)
                .unwrap();
        let ClientAction::Call(call) = action else {
            panic!("expected call");
        };
        assert_eq!(call.accept, None);
    }

    #[test]
    fn unknown_action_is_rejected() {
        let err = ClientAction::decode(r#"{"action":"teleport"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownAction(ref a) if a == "teleport"));
    }

    #[test]
    fn system_type_cannot_be_sent_by_clients() {
        let err = ClientAction::decode(r#"{"type":99,"content":"group_dismiss","receiveId":"G1"}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::UnsupportedType(99)));

        let err = ClientAction::decode(r#"{"type":7,"receiveId":"B"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnsupportedType(7)));

        for kind in [0, 1, 2] {
            let frame = format!(r#"{{"type":{kind},"receiveId":"B"}}"#);
            assert!(ClientAction::decode(&frame).is_ok());
        }
    }

    #[test]
    fn non_json_is_malformed() {
        let err = ClientAction::decode("hello there").unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn null_fields_and_numeric_file_size() {
        let action = ClientAction::decode(
            r#"{"type":1,"content":null,"url":"/f/a.png","fileName":"a.png","fileSize":2048,"receiveId":"B"}"#,
        )
        .unwrap();
        let ClientAction::SendMessage(send) = action else {
            panic!("expected send");
        };
        assert_eq!(send.kind, crate::message_type::FILE);
        assert_eq!(send.content, "");
        assert_eq!(send.file_size, "2048");
        assert_eq!(send.url, "/f/a.png");
    }

    #[test]
    fn call_action_round_trips_through_str() {
        for action in [
            CallAction::Invite,
            CallAction::Answer,
            CallAction::Candidate,
            CallAction::End,
        ] {
            assert_eq!(action.as_str().parse::<CallAction>().unwrap(), action);
        }
    }
}
