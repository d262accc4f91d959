/// Idempotent moderation pipeline
///
/// The only path that may touch another member's comment. Gates run in
/// order, each failing fast: authenticate, authorize, idempotency lookup,
/// apply, audit. The mutation, the audit record and the idempotency marker
/// commit in one transaction, so a retry can never produce a second audit
/// record or a second mutation for the same request id.
use crate::audit::{self, AuditAction};
use crate::db::ts;
use crate::error::{ClubError, ClubResult};
use crate::idempotency::{self, IdempotentOutcome};
use crate::members::Member;
use crate::rbac::{self, Action, ResourceKind};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

/// Moderation action kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationAction {
    Edit,
    Delete,
}

impl ModerationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationAction::Edit => "edit",
            ModerationAction::Delete => "delete",
        }
    }

    pub fn from_str(s: &str) -> ClubResult<Self> {
        match s.to_lowercase().as_str() {
            "edit" => Ok(ModerationAction::Edit),
            "delete" => Ok(ModerationAction::Delete),
            _ => Err(ClubError::Validation(format!(
                "Invalid moderation action: {}",
                s
            ))),
        }
    }

    fn rbac_action(&self) -> Action {
        match self {
            ModerationAction::Edit => Action::Edit,
            ModerationAction::Delete => Action::Delete,
        }
    }

    fn audit_action(&self) -> AuditAction {
        match self {
            ModerationAction::Edit => AuditAction::Edit,
            ModerationAction::Delete => AuditAction::Delete,
        }
    }
}

/// A moderation request
#[derive(Debug, Clone, Deserialize)]
pub struct ModerateRequest {
    pub post_id: String,
    pub comment_id: String,
    pub action: ModerationAction,
    pub content: Option<String>,
    pub reason: Option<String>,
    pub request_id: String,
}

/// Outcome, stored verbatim as the idempotency marker so a replay returns
/// exactly what the first call returned
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationOutcome {
    pub status: String,
    pub audit_id: i64,
}

/// The moderation pipeline
#[derive(Clone)]
pub struct ModerationPipeline {
    db: SqlitePool,
    club_id: String,
}

impl ModerationPipeline {
    pub fn new(db: SqlitePool, club_id: String) -> Self {
        Self { db, club_id }
    }

    /// Run the pipeline. `actor` is `None` for unauthenticated callers.
    pub async fn moderate(
        &self,
        actor: Option<&Member>,
        req: &ModerateRequest,
    ) -> ClubResult<IdempotentOutcome<ModerationOutcome>> {
        // Gate 1: authenticate
        let actor = actor.ok_or_else(|| {
            ClubError::Authentication("Moderation requires a signed-in member".to_string())
        })?;
        if actor.club_id != self.club_id {
            return Err(ClubError::Authorization(format!(
                "Member {} does not belong to this club",
                actor.id
            )));
        }

        idempotency::require_request_id(&req.request_id)?;
        if req.action == ModerationAction::Edit
            && req.content.as_deref().map_or(true, |c| c.trim().is_empty())
        {
            return Err(ClubError::Validation(
                "Edit moderation requires replacement content".to_string(),
            ));
        }

        // Load the target; the ownership half of the authorization gate
        // needs it
        let comment = self.load_comment(&req.post_id, &req.comment_id).await?;

        // Gate 2: authorize. Officers may moderate any comment; an author
        // may run the pipeline against their own.
        let is_author = actor.id == comment.author_id;
        let role_allows = rbac::can(actor.role, req.action.rbac_action(), ResourceKind::Comment);
        if !is_author && !role_allows {
            return Err(ClubError::Authorization(format!(
                "Role {} may not {} another member's comment",
                actor.role.as_str(),
                req.action.as_str()
            )));
        }

        // Gates 3-5 inside one transaction
        match self.moderate_tx(actor, req, &comment).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if idempotency::is_unique_violation(&e) => {
                let stored =
                    idempotency::replay_after_race(&self.db, &self.club_id, &req.request_id)
                        .await?;
                let result = serde_json::from_value(stored)
                    .map_err(|e| ClubError::Internal(format!("Corrupt stored result: {}", e)))?;
                Ok(IdempotentOutcome {
                    result,
                    replayed: true,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn moderate_tx(
        &self,
        actor: &Member,
        req: &ModerateRequest,
        comment: &TargetComment,
    ) -> ClubResult<IdempotentOutcome<ModerationOutcome>> {
        let mut tx = self.db.begin().await?;

        // Gate 3: idempotency. A replay returns the stored result without
        // re-running the mutation, even when the retry payload differs.
        if let Some(stored) =
            idempotency::lookup(&mut *tx, &self.club_id, &req.request_id).await?
        {
            let result = serde_json::from_value(stored)
                .map_err(|e| ClubError::Internal(format!("Corrupt stored result: {}", e)))?;
            return Ok(IdempotentOutcome {
                result,
                replayed: true,
            });
        }

        // Gate 4: apply. The checks sit after the marker lookup so a replay
        // still returns the stored result even when the target has since
        // been deleted.
        let now = ts(Utc::now());
        match req.action {
            ModerationAction::Edit => {
                // Rewriting a soft-deleted comment would be invisible to
                // readers; reject rather than apply silently
                if comment.deleted {
                    return Err(ClubError::Conflict(format!(
                        "Comment {} has been deleted",
                        req.comment_id
                    )));
                }
                sqlx::query(
                    "UPDATE comments SET content = ?, updated_at = ? \
                     WHERE id = ? AND club_id = ? AND deleted = 0",
                )
                .bind(req.content.as_deref().unwrap_or_default())
                .bind(&now)
                .bind(&req.comment_id)
                .bind(&self.club_id)
                .execute(&mut *tx)
                .await?;
            }
            ModerationAction::Delete => {
                let flipped = sqlx::query(
                    "UPDATE comments SET deleted = 1, updated_at = ? \
                     WHERE id = ? AND club_id = ? AND deleted = 0",
                )
                .bind(&now)
                .bind(&req.comment_id)
                .bind(&self.club_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

                // Only a row that actually flipped decrements the counter;
                // deleting an already-deleted comment must not double-count
                if flipped > 0 {
                    sqlx::query(
                        "UPDATE posts SET comment_count = comment_count - 1 \
                         WHERE id = ? AND comment_count > 0",
                    )
                    .bind(&comment.post_id)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        // Gate 5: audit
        let audit_id = audit::record_action(
            &mut *tx,
            &self.club_id,
            &req.comment_id,
            req.action.audit_action(),
            &actor.id,
            req.reason.as_deref(),
            &req.request_id,
        )
        .await?;

        let result = ModerationOutcome {
            status: "applied".to_string(),
            audit_id,
        };
        let stored = serde_json::to_value(&result)
            .map_err(|e| ClubError::Internal(format!("Result serialization: {}", e)))?;
        idempotency::record(&mut *tx, &self.club_id, &req.request_id, &stored).await?;

        tx.commit().await?;

        Ok(IdempotentOutcome {
            result,
            replayed: false,
        })
    }

    async fn load_comment(&self, post_id: &str, comment_id: &str) -> ClubResult<TargetComment> {
        let row = sqlx::query(
            r#"
            SELECT id, post_id, author_id, deleted
            FROM comments
            WHERE id = ? AND post_id = ? AND club_id = ?
            "#,
        )
        .bind(comment_id)
        .bind(post_id)
        .bind(&self.club_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| ClubError::NotFound(format!("Comment {} not found", comment_id)))?;

        Ok(TargetComment {
            post_id: row.get("post_id"),
            author_id: row.get("author_id"),
            deleted: row.get("deleted"),
        })
    }
}

struct TargetComment {
    post_id: String,
    author_id: String,
    deleted: bool,
}
