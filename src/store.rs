//! Persistence collaborator consumed by the router.
//!
//! The router only needs a handful of operations; they are expressed as a
//! trait so the SQLite [`Database`] can be swapped for another backend.

use crate::db::{
    Database, DbError, GroupRecord, MessageRecord, MessageStatus, direct_pair_key, group_pair_key,
};
use async_trait::async_trait;
use thiserror::Error;

/// Display name used when a user has none on record.
pub const DEFAULT_USER_NAME: &str = "user";
/// Display name used when a group has none on record.
pub const DEFAULT_GROUP_NAME: &str = "group";
/// Avatar used when none is on record.
pub const DEFAULT_AVATAR: &str = "default_avatar.png";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Display snapshot of a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserBasic {
    pub display_name: String,
    pub avatar: String,
}

impl UserBasic {
    /// Snapshot with fallbacks applied for missing or empty fields.
    pub fn or_default(basic: Option<UserBasic>) -> Self {
        let basic = basic.unwrap_or(UserBasic {
            display_name: String::new(),
            avatar: String::new(),
        });
        Self {
            display_name: non_empty(basic.display_name, DEFAULT_USER_NAME),
            avatar: non_empty(basic.avatar, DEFAULT_AVATAR),
        }
    }
}

pub(crate) fn non_empty(value: String, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Create-or-get the direct session between `sender_id` and
    /// `receiver_id`. Both orderings resolve to the same session.
    async fn ensure_direct_session(
        &self,
        sender_id: &str,
        receiver_id: &str,
    ) -> Result<String, StoreError>;

    /// Create-or-get the sender's session for `group`.
    async fn ensure_group_session(
        &self,
        sender_id: &str,
        group: &GroupRecord,
    ) -> Result<String, StoreError>;

    /// Persist a message row.
    async fn save_message(&self, record: &MessageRecord) -> Result<(), StoreError>;

    /// Flip a message to "sent".
    async fn mark_delivered(&self, message_id: &str) -> Result<(), StoreError>;

    /// Display snapshot, `None` for unknown users.
    async fn load_user_basic(&self, user_id: &str) -> Result<Option<UserBasic>, StoreError>;

    /// Group record, `None` if no such group.
    async fn lookup_group(&self, group_id: &str) -> Result<Option<GroupRecord>, StoreError>;
}

#[async_trait]
impl ChatStore for Database {
    async fn ensure_direct_session(
        &self,
        sender_id: &str,
        receiver_id: &str,
    ) -> Result<String, StoreError> {
        let key = direct_pair_key(sender_id, receiver_id);
        if let Some(existing) = self.sessions().find_by_pair_key(&key).await? {
            return Ok(existing.uuid);
        }

        let receiver = UserBasic::or_default(self.load_user_basic(receiver_id).await?);
        let id = self
            .sessions()
            .insert_or_get(
                &key,
                sender_id,
                receiver_id,
                &receiver.display_name,
                &receiver.avatar,
            )
            .await?;
        Ok(id)
    }

    async fn ensure_group_session(
        &self,
        sender_id: &str,
        group: &GroupRecord,
    ) -> Result<String, StoreError> {
        let key = group_pair_key(&group.uuid, sender_id);
        if let Some(existing) = self.sessions().find_by_pair_key(&key).await? {
            return Ok(existing.uuid);
        }

        let id = self
            .sessions()
            .insert_or_get(
                &key,
                sender_id,
                &group.uuid,
                &non_empty(group.name.clone(), DEFAULT_GROUP_NAME),
                &non_empty(group.avatar.clone(), DEFAULT_AVATAR),
            )
            .await?;
        Ok(id)
    }

    async fn save_message(&self, record: &MessageRecord) -> Result<(), StoreError> {
        self.messages().insert(record).await?;
        Ok(())
    }

    async fn mark_delivered(&self, message_id: &str) -> Result<(), StoreError> {
        if !self.messages().set_status(message_id, MessageStatus::Sent).await? {
            return Err(StoreError::Db(DbError::Internal(format!(
                "message {message_id} not found"
            ))));
        }
        Ok(())
    }

    async fn load_user_basic(&self, user_id: &str) -> Result<Option<UserBasic>, StoreError> {
        let basic = self.users().basic(user_id).await?;
        Ok(basic.map(|(display_name, avatar)| UserBasic {
            display_name,
            avatar,
        }))
    }

    async fn lookup_group(&self, group_id: &str) -> Result<Option<GroupRecord>, StoreError> {
        Ok(self.groups().find(group_id).await?)
    }
}
