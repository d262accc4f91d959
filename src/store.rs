/// Document-store adapter for the auto-close engine
///
/// Exposes the primitives the engine needs: the indexed composite query
/// (plan A), the always-available single-field query (plan B), and the
/// chunked conditional batch close. Composite indexes are provisioned with
/// latency in the backing store, so plan A fails with a structured
/// `IndexUnavailable` until `provision_indexes` has run; the engine
/// classifies that error kind and falls back, never a string match.
use crate::db::{parse_ts, ts};
use crate::error::{ClubError, ClubResult};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

/// Registry name of the composite index behind plan A
pub const EVENT_CLOSE_INDEX: &str = "posts_type_vote_close_at";

/// Slim view of an event post, enough for close selection
#[derive(Debug, Clone)]
pub struct EventCandidate {
    pub id: String,
    pub title: String,
    pub vote_close_at: DateTime<Utc>,
    pub vote_closed: Option<bool>,
}

/// Store adapter scoped to one club
#[derive(Clone)]
pub struct DocStore {
    db: SqlitePool,
    club_id: String,
}

impl DocStore {
    pub fn new(db: SqlitePool, club_id: String) -> Self {
        Self { db, club_id }
    }

    /// Create and register the composite indexes this adapter relies on.
    /// Run at startup; until it completes, composite queries fail with
    /// `IndexUnavailable`.
    pub async fn provision_indexes(&self) -> ClubResult<()> {
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_posts_type_vote_close_at \
             ON posts (post_type, vote_close_at)",
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            "INSERT INTO store_indexes (name, ready) VALUES (?, 1) \
             ON CONFLICT (name) DO UPDATE SET ready = 1",
        )
        .bind(EVENT_CLOSE_INDEX)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn index_ready(&self, name: &str) -> ClubResult<bool> {
        let row = sqlx::query("SELECT ready FROM store_indexes WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.db)
            .await?;

        Ok(row.map(|r| r.get::<bool, _>("ready")).unwrap_or(false))
    }

    /// Plan A: composite query `post_type = 'event' AND vote_close_at <= now`,
    /// restricted to still-open rows and capped. Closed events keep the oldest
    /// close instants forever, so without the open-only restriction they would
    /// fill the cap and starve newly expired events out of every run. Fails
    /// with `IndexUnavailable` while the composite index is still
    /// provisioning.
    pub async fn query_expired_events(
        &self,
        now: DateTime<Utc>,
        cap: usize,
    ) -> ClubResult<Vec<EventCandidate>> {
        if !self.index_ready(EVENT_CLOSE_INDEX).await? {
            return Err(ClubError::IndexUnavailable(format!(
                "Composite index {} is not provisioned",
                EVENT_CLOSE_INDEX
            )));
        }

        let rows = sqlx::query(
            r#"
            SELECT id, title, vote_close_at, vote_closed
            FROM posts
            WHERE club_id = ? AND post_type = 'event' AND vote_close_at <= ?
              AND (vote_closed IS NULL OR vote_closed = 0)
            ORDER BY vote_close_at ASC
            LIMIT ?
            "#,
        )
        .bind(&self.club_id)
        .bind(ts(now))
        .bind(cap as i64)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Self::parse_candidate).collect()
    }

    /// Plan B: single-field query on `post_type` alone; always available.
    /// Callers filter by close instant and closed flag in memory.
    pub async fn query_events(&self) -> ClubResult<Vec<EventCandidate>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, vote_close_at, vote_closed
            FROM posts
            WHERE club_id = ? AND post_type = 'event'
            "#,
        )
        .bind(&self.club_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Self::parse_candidate).collect()
    }

    /// Close one chunk of events atomically. The conditional guard makes a
    /// second close of the same event a no-op, so concurrent runs need no
    /// lock. Returns how many rows actually flipped.
    pub async fn close_chunk(
        &self,
        ids: &[String],
        closed_by: &str,
        now: DateTime<Utc>,
    ) -> ClubResult<u64> {
        let mut tx = self.db.begin().await?;
        let mut flipped = 0u64;

        for id in ids {
            let result = sqlx::query(
                r#"
                UPDATE posts
                SET vote_closed = 1,
                    vote_closed_at = ?,
                    vote_closed_by = ?,
                    updated_at = ?
                WHERE id = ? AND club_id = ? AND post_type = 'event'
                  AND (vote_closed IS NULL OR vote_closed = 0)
                "#,
            )
            .bind(ts(now))
            .bind(closed_by)
            .bind(ts(now))
            .bind(id)
            .bind(&self.club_id)
            .execute(&mut *tx)
            .await?;

            flipped += result.rows_affected();
        }

        tx.commit().await?;
        Ok(flipped)
    }

    fn parse_candidate(row: sqlx::sqlite::SqliteRow) -> ClubResult<EventCandidate> {
        let close_at_str: Option<String> = row.get("vote_close_at");
        let close_at_str = close_at_str.ok_or_else(|| {
            ClubError::Internal("Event post without vote_close_at".to_string())
        })?;

        Ok(EventCandidate {
            id: row.get("id"),
            title: row.get("title"),
            vote_close_at: parse_ts(&close_at_str)?,
            vote_closed: row.get::<Option<bool>, _>("vote_closed"),
        })
    }
}
