/// Append-only audit log for moderation and creation callables
///
/// One record per distinct request id, enforced by a unique index on
/// `(club_id, request_id)` so retries can never double-log.
use crate::db::{parse_ts, ts};
use crate::error::{ClubError, ClubResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, Sqlite, SqlitePool};

/// Audited action kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Edit,
    Delete,
    CreateEvent,
    CreateNotice,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Edit => "edit",
            AuditAction::Delete => "delete",
            AuditAction::CreateEvent => "create_event",
            AuditAction::CreateNotice => "create_notice",
        }
    }

    pub fn from_str(s: &str) -> ClubResult<Self> {
        match s.to_lowercase().as_str() {
            "edit" => Ok(AuditAction::Edit),
            "delete" => Ok(AuditAction::Delete),
            "create_event" => Ok(AuditAction::CreateEvent),
            "create_notice" => Ok(AuditAction::CreateNotice),
            _ => Err(ClubError::Validation(format!("Invalid audit action: {}", s))),
        }
    }
}

/// A single audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub club_id: String,
    pub target_id: String,
    pub action: AuditAction,
    pub actor_id: String,
    pub reason: Option<String>,
    pub request_id: String,
    pub created_at: DateTime<Utc>,
}

/// Insert an audit record inside the caller's transaction, returning its id
pub async fn record_action<'e, E>(
    executor: E,
    club_id: &str,
    target_id: &str,
    action: AuditAction,
    actor_id: &str,
    reason: Option<&str>,
    request_id: &str,
) -> ClubResult<i64>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO audit_log (club_id, target_id, action, actor_id, reason, request_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(club_id)
    .bind(target_id)
    .bind(action.as_str())
    .bind(actor_id)
    .bind(reason)
    .bind(request_id)
    .bind(ts(Utc::now()))
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Read-side audit queries
#[derive(Clone)]
pub struct AuditLog {
    db: SqlitePool,
}

impl AuditLog {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// All records for a request id; after any number of retries this must
    /// contain exactly one entry
    pub async fn find_by_request(
        &self,
        club_id: &str,
        request_id: &str,
    ) -> ClubResult<Vec<AuditRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, club_id, target_id, action, actor_id, reason, request_id, created_at
            FROM audit_log
            WHERE club_id = ? AND request_id = ?
            "#,
        )
        .bind(club_id)
        .bind(request_id)
        .fetch_all(&self.db)
        .await?;

        let mut records = Vec::new();
        for row in rows {
            let action_str: String = row.get("action");
            let created_at_str: String = row.get("created_at");
            records.push(AuditRecord {
                id: row.get("id"),
                club_id: row.get("club_id"),
                target_id: row.get("target_id"),
                action: AuditAction::from_str(&action_str)?,
                actor_id: row.get("actor_id"),
                reason: row.get("reason"),
                request_id: row.get("request_id"),
                created_at: parse_ts(&created_at_str)?,
            });
        }

        Ok(records)
    }

    /// Moderation history for a target document, newest first
    pub async fn history_for_target(
        &self,
        club_id: &str,
        target_id: &str,
    ) -> ClubResult<Vec<AuditRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, club_id, target_id, action, actor_id, reason, request_id, created_at
            FROM audit_log
            WHERE club_id = ? AND target_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(club_id)
        .bind(target_id)
        .fetch_all(&self.db)
        .await?;

        let mut records = Vec::new();
        for row in rows {
            let action_str: String = row.get("action");
            let created_at_str: String = row.get("created_at");
            records.push(AuditRecord {
                id: row.get("id"),
                club_id: row.get("club_id"),
                target_id: row.get("target_id"),
                action: AuditAction::from_str(&action_str)?,
                actor_id: row.get("actor_id"),
                reason: row.get("reason"),
                request_id: row.get("request_id"),
                created_at: parse_ts(&created_at_str)?,
            });
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    #[test]
    fn test_action_round_trip() {
        assert_eq!(AuditAction::from_str("edit").unwrap(), AuditAction::Edit);
        assert_eq!(
            AuditAction::from_str("create_notice").unwrap(),
            AuditAction::CreateNotice
        );
        assert!(AuditAction::from_str("ban").is_err());
    }

    #[tokio::test]
    async fn test_record_and_find() {
        let pool = memory_pool().await;

        let id = record_action(
            &pool,
            "club",
            "comment-1",
            AuditAction::Delete,
            "admin-1",
            Some("spam"),
            "req-1",
        )
        .await
        .unwrap();

        let log = AuditLog::new(pool);
        let found = log.find_by_request("club", "req-1").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, id);
        assert_eq!(found[0].action, AuditAction::Delete);
        assert_eq!(found[0].reason.as_deref(), Some("spam"));
    }

    #[tokio::test]
    async fn test_duplicate_request_id_rejected() {
        let pool = memory_pool().await;

        record_action(&pool, "club", "c1", AuditAction::Edit, "a", None, "req-1")
            .await
            .unwrap();
        let dup = record_action(&pool, "club", "c2", AuditAction::Edit, "a", None, "req-1").await;
        assert!(dup.is_err());
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let pool = memory_pool().await;
        record_action(&pool, "club", "c1", AuditAction::Edit, "a", None, "r1")
            .await
            .unwrap();
        record_action(&pool, "club", "c1", AuditAction::Delete, "a", None, "r2")
            .await
            .unwrap();

        let log = AuditLog::new(pool);
        let history = log.history_for_target("club", "c1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, AuditAction::Delete);
    }
}
