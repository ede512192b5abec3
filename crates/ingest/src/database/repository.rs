use dirtonyou_core::{FlaggedMessage, TriggerId, TriggerWord};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqlitePool, FromRow, Result as SqlxResult, Row};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StoredFlaggedMessage {
    pub id: i64,
    pub author_id: String,
    pub space_id: String,
    pub content: String,
    pub ts: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SpaceRow {
    pub space_id: String,
    pub status: String,
    pub registered_at: i64,
}

/// Row counts removed by a purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeCounts {
    pub messages: u64,
    pub spaces: u64,
}

pub struct Repository {
    pool: Arc<SqlitePool>,
}

fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

impl Repository {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    // Trigger word methods

    /// All trigger words. Rows that fail to decode are skipped.
    pub async fn list_trigger_words(&self) -> SqlxResult<Vec<TriggerWord>> {
        let rows = sqlx::query("SELECT id, word FROM trigger_word ORDER BY word ASC")
            .fetch_all(&*self.pool)
            .await?;

        let mut words = Vec::with_capacity(rows.len());
        for row in rows {
            let decoded = row
                .try_get::<i64, _>("id")
                .and_then(|id| row.try_get::<String, _>("word").map(|word| (id, word)));
            match decoded {
                Ok((id, word)) => words.push(TriggerWord { id, word }),
                Err(err) => warn!("skipping undecodable trigger_word row: {}", err),
            }
        }
        Ok(words)
    }

    /// Insert a normalized word. Returns `false` when it already exists.
    pub async fn insert_trigger_word(&self, word: &str) -> SqlxResult<bool> {
        let result = sqlx::query(
            "INSERT INTO trigger_word (word, created_at) VALUES (?1, ?2) ON CONFLICT(word) DO NOTHING",
        )
        .bind(word)
        .bind(now_ts())
        .execute(&*self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a normalized word. Returns `false` when it was not present.
    pub async fn delete_trigger_word(&self, word: &str) -> SqlxResult<bool> {
        let result = sqlx::query("DELETE FROM trigger_word WHERE word = ?1")
            .bind(word)
            .execute(&*self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // Flagged message methods

    /// Insert the message and its trigger associations in one transaction.
    ///
    /// Any failure drops the transaction, which rolls back every row written
    /// so far.
    pub async fn insert_flagged_message(&self, msg: &FlaggedMessage) -> SqlxResult<i64> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO flagged_message (author_id, space_id, content, ts)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&msg.author_id)
        .bind(&msg.space_id)
        .bind(&msg.content)
        .bind(msg.ts)
        .execute(&mut *tx)
        .await?;
        let message_id = result.last_insert_rowid();

        for (position, trigger_id) in msg.trigger_ids.iter().enumerate() {
            sqlx::query(
                "INSERT INTO flagged_message_trigger (message_id, trigger_id, position) VALUES (?1, ?2, ?3)",
            )
            .bind(message_id)
            .bind(*trigger_id)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(message_id)
    }

    pub async fn list_flagged_messages(
        &self,
        space_id: Option<&str>,
        limit: i64,
    ) -> SqlxResult<Vec<StoredFlaggedMessage>> {
        if let Some(space) = space_id {
            sqlx::query_as::<_, StoredFlaggedMessage>(
                r#"
                SELECT id, author_id, space_id, content, ts
                FROM flagged_message WHERE space_id = ?1 ORDER BY ts ASC, id ASC LIMIT ?2
                "#,
            )
            .bind(space)
            .bind(limit)
            .fetch_all(&*self.pool)
            .await
        } else {
            sqlx::query_as::<_, StoredFlaggedMessage>(
                r#"
                SELECT id, author_id, space_id, content, ts
                FROM flagged_message ORDER BY ts ASC, id ASC LIMIT ?1
                "#,
            )
            .bind(limit)
            .fetch_all(&*self.pool)
            .await
        }
    }

    /// Trigger ids linked to a message, in stored order.
    pub async fn trigger_ids_for_message(&self, message_id: i64) -> SqlxResult<Vec<TriggerId>> {
        sqlx::query_scalar::<_, i64>(
            "SELECT trigger_id FROM flagged_message_trigger WHERE message_id = ?1 ORDER BY position ASC",
        )
        .bind(message_id)
        .fetch_all(&*self.pool)
        .await
    }

    pub async fn count_flagged_messages(&self) -> SqlxResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM flagged_message")
            .fetch_one(&*self.pool)
            .await
    }

    pub async fn count_trigger_links(&self) -> SqlxResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM flagged_message_trigger")
            .fetch_one(&*self.pool)
            .await
    }

    /// Messages stored without a single trigger association.
    pub async fn count_unlinked_messages(&self) -> SqlxResult<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM flagged_message m
            WHERE NOT EXISTS (SELECT 1 FROM flagged_message_trigger t WHERE t.message_id = m.id)
            "#,
        )
        .fetch_one(&*self.pool)
        .await
    }

    // Space methods

    /// Compare-and-insert on the unique `space_id`.
    ///
    /// Exactly one concurrent caller per space gets `true`.
    pub async fn insert_space_if_absent(&self, space_id: &str, status: &str) -> SqlxResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO space (space_id, status, registered_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(space_id) DO NOTHING
            "#,
        )
        .bind(space_id)
        .bind(status)
        .bind(now_ts())
        .execute(&*self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_space(&self, space_id: &str) -> SqlxResult<Option<SpaceRow>> {
        sqlx::query_as::<_, SpaceRow>(
            "SELECT space_id, status, registered_at FROM space WHERE space_id = ?1",
        )
        .bind(space_id)
        .fetch_optional(&*self.pool)
        .await
    }

    pub async fn set_space_status(&self, space_id: &str, status: &str) -> SqlxResult<bool> {
        let result = sqlx::query("UPDATE space SET status = ?2 WHERE space_id = ?1")
            .bind(space_id)
            .bind(status)
            .execute(&*self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // Administrative purge

    /// Delete every flagged message and every space row in one transaction.
    ///
    /// Associations go with their messages through `ON DELETE CASCADE`.
    pub async fn purge_messages_and_spaces(&self) -> SqlxResult<PurgeCounts> {
        let mut tx = self.pool.begin().await?;

        let messages = sqlx::query("DELETE FROM flagged_message")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let spaces = sqlx::query("DELETE FROM space")
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(PurgeCounts { messages, spaces })
    }
}
