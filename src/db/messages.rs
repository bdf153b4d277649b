//! Message repository.

use super::DbError;
use super::models::{MessageRecord, MessageStatus};
use sqlx::SqlitePool;

/// History pages default to this many rows when the caller passes 0.
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

const SELECT_COLUMNS: &str = "uuid, session_id, type, content, url, send_id, send_name, \
     send_avatar, receive_id, file_type, file_name, file_size, status, created_at";

/// Repository for chat messages.
pub struct MessageRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MessageRepository<'a> {
    /// Create a new message repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a message row.
    pub async fn insert(&self, msg: &MessageRecord) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO messages (uuid, session_id, type, content, url, send_id, send_name,
                                  send_avatar, receive_id, file_type, file_name, file_size,
                                  status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&msg.uuid)
        .bind(&msg.session_id)
        .bind(msg.kind)
        .bind(&msg.content)
        .bind(&msg.url)
        .bind(&msg.send_id)
        .bind(&msg.send_name)
        .bind(&msg.send_avatar)
        .bind(&msg.receive_id)
        .bind(&msg.file_type)
        .bind(&msg.file_name)
        .bind(&msg.file_size)
        .bind(msg.status)
        .bind(msg.created_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Update delivery status. Returns whether the message exists.
    pub async fn set_status(&self, uuid: &str, status: MessageStatus) -> Result<bool, DbError> {
        let result = sqlx::query("UPDATE messages SET status = ? WHERE uuid = ?")
            .bind(status.as_i16())
            .bind(uuid)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Find a message by id.
    pub async fn find(&self, uuid: &str) -> Result<Option<MessageRecord>, DbError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM messages WHERE uuid = ?");
        let row = sqlx::query_as::<_, MessageRecord>(&sql)
            .bind(uuid)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Direct history between two users, newest first.
    pub async fn conversation(
        &self,
        a: &str,
        b: &str,
        limit: i64,
    ) -> Result<Vec<MessageRecord>, DbError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM messages \
             WHERE (send_id = ? AND receive_id = ?) OR (send_id = ? AND receive_id = ?) \
             ORDER BY seq DESC LIMIT ?"
        );
        let rows = sqlx::query_as::<_, MessageRecord>(&sql)
            .bind(a)
            .bind(b)
            .bind(b)
            .bind(a)
            .bind(effective_limit(limit))
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// Group history, newest first.
    pub async fn group_history(
        &self,
        group_id: &str,
        limit: i64,
    ) -> Result<Vec<MessageRecord>, DbError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM messages WHERE receive_id = ? ORDER BY seq DESC LIMIT ?"
        );
        let rows = sqlx::query_as::<_, MessageRecord>(&sql)
            .bind(group_id)
            .bind(effective_limit(limit))
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }
}

fn effective_limit(limit: i64) -> i64 {
    if limit <= 0 { DEFAULT_HISTORY_LIMIT } else { limit }
}
