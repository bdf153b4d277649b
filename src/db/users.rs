//! User repository: display name and avatar snapshots.

use super::models::UserRecord;
use super::{DbError, now_secs};
use sqlx::SqlitePool;

/// Repository for user lookups.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a user or refresh its display fields.
    pub async fn upsert(&self, uuid: &str, nickname: &str, avatar: &str) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO users (uuid, nickname, avatar, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(uuid) DO UPDATE SET nickname = excluded.nickname, avatar = excluded.avatar
            "#,
        )
        .bind(uuid)
        .bind(nickname)
        .bind(avatar)
        .bind(now_secs())
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Find a user by id.
    pub async fn find(&self, uuid: &str) -> Result<Option<UserRecord>, DbError> {
        let row = sqlx::query_as::<_, UserRecord>(
            "SELECT uuid, nickname, avatar, created_at FROM users WHERE uuid = ?",
        )
        .bind(uuid)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Display name and avatar, if the user exists.
    pub async fn basic(&self, uuid: &str) -> Result<Option<(String, String)>, DbError> {
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT nickname, avatar FROM users WHERE uuid = ?",
        )
        .bind(uuid)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }
}
