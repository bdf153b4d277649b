//! Normalized inbound chat message.

use chathub_proto::ChatSend;

/// A chat message on its way from a reader to the router.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    pub kind: i16,
    pub content: String,
    pub url: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: String,
    pub sender_id: String,
    pub receiver_id: String,
}

impl Envelope {
    /// Build from a decoded chat frame received on `conn_user`'s connection.
    ///
    /// With `trust_wire_sender`, a non-empty `sendId` on the frame wins over
    /// the connection identity.
    pub fn from_chat(chat: ChatSend, conn_user: &str, trust_wire_sender: bool) -> Self {
        let sender_id = match chat.send_id {
            Some(id) if trust_wire_sender => id,
            _ => conn_user.to_string(),
        };
        Self {
            kind: chat.kind,
            content: chat.content,
            url: chat.url,
            file_name: chat.file_name,
            file_type: chat.file_type,
            file_size: chat.file_size,
            sender_id,
            receiver_id: chat.receive_id,
        }
    }
}
