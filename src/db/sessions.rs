//! Session repository.
//!
//! A session row is keyed by a unique `pair_key`. Direct threads use the
//! unordered pair so A→B and B→A share one row; group threads are per
//! sender. Creation is `INSERT .. ON CONFLICT DO NOTHING` followed by a read,
//! so concurrent creators always converge on a single id.

use super::models::SessionRecord;
use super::{DbError, now_secs};
use crate::ids;
use sqlx::SqlitePool;

/// Canonical key for a direct conversation between two users.
///
/// The first id is length-prefixed, so ids containing `:` cannot collide.
pub fn direct_pair_key(a: &str, b: &str) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("d:{}:{lo}:{hi}", lo.len())
}

/// Key for a sender's thread in a group.
pub fn group_pair_key(group_id: &str, sender_id: &str) -> String {
    format!("g:{}:{group_id}:{sender_id}", group_id.len())
}

/// Repository for conversation sessions.
pub struct SessionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SessionRepository<'a> {
    /// Create a new session repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Find a session by its pair key.
    pub async fn find_by_pair_key(&self, pair_key: &str) -> Result<Option<SessionRecord>, DbError> {
        let row = sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT uuid, pair_key, send_id, receive_id, receive_name, avatar, created_at
            FROM sessions
            WHERE pair_key = ?
            "#,
        )
        .bind(pair_key)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Create the session for `pair_key` unless one exists; return its id.
    pub async fn insert_or_get(
        &self,
        pair_key: &str,
        send_id: &str,
        receive_id: &str,
        receive_name: &str,
        avatar: &str,
    ) -> Result<String, DbError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (uuid, pair_key, send_id, receive_id, receive_name, avatar, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(pair_key) DO NOTHING
            "#,
        )
        .bind(ids::prefixed("S"))
        .bind(pair_key)
        .bind(send_id)
        .bind(receive_id)
        .bind(receive_name)
        .bind(avatar)
        .bind(now_secs())
        .execute(self.pool)
        .await?;

        let uuid: String = sqlx::query_scalar("SELECT uuid FROM sessions WHERE pair_key = ?")
            .bind(pair_key)
            .fetch_one(self.pool)
            .await?;
        Ok(uuid)
    }

    /// Number of session rows linking `a` and `b` in either direction.
    pub async fn count_for_pair(&self, a: &str, b: &str) -> Result<i64, DbError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM sessions
            WHERE (send_id = ? AND receive_id = ?) OR (send_id = ? AND receive_id = ?)
            "#,
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// Sessions a user takes part in: every thread they started plus direct
    /// threads started by a peer.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<SessionRecord>, DbError> {
        let rows = sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT uuid, pair_key, send_id, receive_id, receive_name, avatar, created_at
            FROM sessions
            WHERE send_id = ? OR (receive_id = ? AND pair_key LIKE 'd:%')
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn direct_pair_key_is_unordered() {
        assert_eq!(direct_pair_key("A", "B"), direct_pair_key("B", "A"));
        assert_ne!(direct_pair_key("A", "B"), direct_pair_key("A", "C"));
        assert_eq!(direct_pair_key("B", "A"), "d:1:A:B");
        assert_eq!(group_pair_key("G1", "U1"), "g:2:G1:U1");
    }

    #[test]
    fn keys_with_separators_do_not_collide() {
        assert_ne!(direct_pair_key("a:b", "c"), direct_pair_key("a", "b:c"));
        assert_ne!(group_pair_key("g:x", "u"), group_pair_key("g", "x:u"));
    }

    #[tokio::test]
    async fn insert_or_get_is_idempotent() {
        let db = Database::new(":memory:").await.unwrap();
        let key = direct_pair_key("A", "B");

        let first = db.sessions().insert_or_get(&key, "A", "B", "Bob", "b.png").await.unwrap();
        let second = db.sessions().insert_or_get(&key, "B", "A", "Al", "a.png").await.unwrap();

        assert_eq!(first, second);
        assert!(first.starts_with('S'));
        assert_eq!(db.sessions().count_for_pair("A", "B").await.unwrap(), 1);

        let record = db.sessions().find_by_pair_key(&key).await.unwrap().unwrap();
        assert_eq!(record.send_id, "A");
        assert_eq!(record.receive_name, "Bob");
    }

    #[tokio::test]
    async fn list_for_user_includes_peer_started_direct_threads() {
        let db = Database::new(":memory:").await.unwrap();
        db.sessions()
            .insert_or_get(&direct_pair_key("A", "B"), "A", "B", "Bob", "")
            .await
            .unwrap();
        db.sessions()
            .insert_or_get(&group_pair_key("G1", "C"), "C", "G1", "Team", "")
            .await
            .unwrap();

        assert_eq!(db.sessions().list_for_user("B").await.unwrap().len(), 1);
        assert_eq!(db.sessions().list_for_user("A").await.unwrap().len(), 1);
        // Group threads belong to their sender only.
        assert!(db.sessions().list_for_user("G1").await.unwrap().is_empty());
    }
}
