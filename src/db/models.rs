//! Row types for the chat tables.

use sqlx::FromRow;

/// A user's display snapshot.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct UserRecord {
    pub uuid: String,
    pub nickname: String,
    pub avatar: String,
    pub created_at: i64,
}

/// A durable group record. Existence is what routing cares about.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct GroupRecord {
    pub uuid: String,
    pub name: String,
    pub avatar: String,
    pub owner_id: String,
    pub created_at: i64,
}

/// A conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SessionRecord {
    pub uuid: String,
    pub pair_key: String,
    pub send_id: String,
    pub receive_id: String,
    pub receive_name: String,
    pub avatar: String,
    pub created_at: i64,
}

/// Delivery status stored on each message row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum MessageStatus {
    Pending = 0,
    Sent = 1,
}

impl MessageStatus {
    pub fn as_i16(self) -> i16 {
        self as i16
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(Self::Pending),
            1 => Some(Self::Sent),
            _ => None,
        }
    }
}

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct MessageRecord {
    pub uuid: String,
    pub session_id: String,
    #[sqlx(rename = "type")]
    pub kind: i16,
    pub content: String,
    pub url: String,
    pub send_id: String,
    pub send_name: String,
    pub send_avatar: String,
    pub receive_id: String,
    pub file_type: String,
    pub file_name: String,
    pub file_size: String,
    pub status: i16,
    pub created_at: i64,
}

impl MessageRecord {
    pub fn status(&self) -> Option<MessageStatus> {
        MessageStatus::from_i16(self.status)
    }
}
