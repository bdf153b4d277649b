//! Group repository.

use super::models::GroupRecord;
use super::{DbError, now_secs};
use sqlx::SqlitePool;

/// Repository for group records.
pub struct GroupRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> GroupRepository<'a> {
    /// Create a new group repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a group.
    pub async fn create(
        &self,
        uuid: &str,
        name: &str,
        avatar: &str,
        owner_id: &str,
    ) -> Result<GroupRecord, DbError> {
        if self.find(uuid).await?.is_some() {
            return Err(DbError::GroupExists(uuid.to_string()));
        }

        let now = now_secs();
        sqlx::query(
            r#"
            INSERT INTO groups (uuid, name, avatar, owner_id, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(uuid)
        .bind(name)
        .bind(avatar)
        .bind(owner_id)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(GroupRecord {
            uuid: uuid.to_string(),
            name: name.to_string(),
            avatar: avatar.to_string(),
            owner_id: owner_id.to_string(),
            created_at: now,
        })
    }

    /// Find a group by id.
    pub async fn find(&self, uuid: &str) -> Result<Option<GroupRecord>, DbError> {
        let row = sqlx::query_as::<_, GroupRecord>(
            "SELECT uuid, name, avatar, owner_id, created_at FROM groups WHERE uuid = ?",
        )
        .bind(uuid)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Delete a group. Returns whether a row was removed.
    pub async fn delete(&self, uuid: &str) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM groups WHERE uuid = ?")
            .bind(uuid)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
