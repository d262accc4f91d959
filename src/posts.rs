/// Event and notice posts
///
/// Creation goes through the same idempotent, audited machinery as the
/// moderation pipeline: role gate, profile gate, marker lookup, mutation,
/// audit and marker write in one transaction.
use crate::audit::{self, AuditAction};
use crate::db::{parse_ts, ts};
use crate::error::{ClubError, ClubResult};
use crate::idempotency::{self, IdempotentOutcome};
use crate::members::Member;
use crate::rbac::{self, Action, ResourceKind};
use crate::time_policy::compute_vote_close_at;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Post kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    Event,
    Notice,
    Free,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::Event => "event",
            PostType::Notice => "notice",
            PostType::Free => "free",
        }
    }

    pub fn from_str(s: &str) -> ClubResult<Self> {
        match s.to_lowercase().as_str() {
            "event" => Ok(PostType::Event),
            "notice" => Ok(PostType::Notice),
            "free" => Ok(PostType::Free),
            _ => Err(ClubError::Validation(format!("Invalid post type: {}", s))),
        }
    }
}

/// A post document. Vote fields are only populated for events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub club_id: String,
    pub post_type: PostType,
    pub event_type: Option<String>,
    pub title: String,
    pub content: String,
    pub place: Option<String>,
    pub start_at: Option<DateTime<Utc>>,
    pub vote_close_at: Option<DateTime<Utc>>,
    pub vote_closed: Option<bool>,
    pub vote_closed_at: Option<DateTime<Utc>>,
    pub vote_closed_by: Option<String>,
    pub comment_count: i64,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for event creation
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEventInput {
    pub event_type: String,
    pub title: String,
    pub content: String,
    pub place: String,
    pub start_at: DateTime<Utc>,
}

/// Result of event creation, stored verbatim as the idempotency marker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventResult {
    pub post_id: String,
    pub vote_close_at: DateTime<Utc>,
}

/// Result of notice creation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoticeResult {
    pub id: String,
}

/// Post manager
#[derive(Clone)]
pub struct PostManager {
    db: SqlitePool,
    club_id: String,
}

impl PostManager {
    pub fn new(db: SqlitePool, club_id: String) -> Self {
        Self { db, club_id }
    }

    /// Create an event post. The vote-close instant is derived from the
    /// start instant by the time policy and stamped at creation.
    pub async fn create_event(
        &self,
        actor: &Member,
        input: &CreateEventInput,
        request_id: &str,
    ) -> ClubResult<IdempotentOutcome<CreateEventResult>> {
        idempotency::require_request_id(request_id)?;
        self.check_club(actor)?;

        if !rbac::can(actor.role, Action::Create, ResourceKind::Event) {
            return Err(ClubError::Authorization(format!(
                "Role {} may not create events",
                actor.role.as_str()
            )));
        }
        if !rbac::has_required_profile(actor) {
            return Err(ClubError::Authorization(
                "A complete profile (real name, phone) is required to create events".to_string(),
            ));
        }
        if input.title.trim().is_empty() {
            return Err(ClubError::Validation("Title is required".to_string()));
        }

        match self.create_event_tx(actor, input, request_id).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if idempotency::is_unique_violation(&e) => {
                let stored =
                    idempotency::replay_after_race(&self.db, &self.club_id, request_id).await?;
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

    async fn create_event_tx(
        &self,
        actor: &Member,
        input: &CreateEventInput,
        request_id: &str,
    ) -> ClubResult<IdempotentOutcome<CreateEventResult>> {
        let mut tx = self.db.begin().await?;

        if let Some(stored) = idempotency::lookup(&mut *tx, &self.club_id, request_id).await? {
            let result = serde_json::from_value(stored)
                .map_err(|e| ClubError::Internal(format!("Corrupt stored result: {}", e)))?;
            return Ok(IdempotentOutcome {
                result,
                replayed: true,
            });
        }

        let post_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let vote_close_at = compute_vote_close_at(input.start_at);

        sqlx::query(
            r#"
            INSERT INTO posts
            (id, club_id, post_type, event_type, title, content, place,
             start_at, vote_close_at, created_by, created_at, updated_at)
            VALUES (?, ?, 'event', ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post_id)
        .bind(&self.club_id)
        .bind(&input.event_type)
        .bind(&input.title)
        .bind(&input.content)
        .bind(&input.place)
        .bind(ts(input.start_at))
        .bind(ts(vote_close_at))
        .bind(&actor.id)
        .bind(ts(now))
        .bind(ts(now))
        .execute(&mut *tx)
        .await?;

        audit::record_action(
            &mut *tx,
            &self.club_id,
            &post_id,
            AuditAction::CreateEvent,
            &actor.id,
            None,
            request_id,
        )
        .await?;

        let result = CreateEventResult {
            post_id,
            vote_close_at,
        };
        let stored = serde_json::to_value(&result)
            .map_err(|e| ClubError::Internal(format!("Result serialization: {}", e)))?;
        idempotency::record(&mut *tx, &self.club_id, request_id, &stored).await?;

        tx.commit().await?;

        Ok(IdempotentOutcome {
            result,
            replayed: false,
        })
    }

    /// Create a notice post. Push fan-out is the caller's job and only runs
    /// when the outcome was not replayed.
    pub async fn create_notice(
        &self,
        actor: &Member,
        title: &str,
        content: &str,
        request_id: &str,
    ) -> ClubResult<IdempotentOutcome<CreateNoticeResult>> {
        idempotency::require_request_id(request_id)?;
        self.check_club(actor)?;

        if !rbac::can(actor.role, Action::Create, ResourceKind::Notice) {
            return Err(ClubError::Authorization(format!(
                "Role {} may not create notices",
                actor.role.as_str()
            )));
        }
        if !rbac::has_required_profile(actor) {
            return Err(ClubError::Authorization(
                "A complete profile (real name, phone) is required to create notices".to_string(),
            ));
        }
        if title.trim().is_empty() {
            return Err(ClubError::Validation("Title is required".to_string()));
        }

        match self.create_notice_tx(actor, title, content, request_id).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if idempotency::is_unique_violation(&e) => {
                let stored =
                    idempotency::replay_after_race(&self.db, &self.club_id, request_id).await?;
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

    async fn create_notice_tx(
        &self,
        actor: &Member,
        title: &str,
        content: &str,
        request_id: &str,
    ) -> ClubResult<IdempotentOutcome<CreateNoticeResult>> {
        let mut tx = self.db.begin().await?;

        if let Some(stored) = idempotency::lookup(&mut *tx, &self.club_id, request_id).await? {
            let result = serde_json::from_value(stored)
                .map_err(|e| ClubError::Internal(format!("Corrupt stored result: {}", e)))?;
            return Ok(IdempotentOutcome {
                result,
                replayed: true,
            });
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO posts
            (id, club_id, post_type, title, content, created_by, created_at, updated_at)
            VALUES (?, ?, 'notice', ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&self.club_id)
        .bind(title)
        .bind(content)
        .bind(&actor.id)
        .bind(ts(now))
        .bind(ts(now))
        .execute(&mut *tx)
        .await?;

        audit::record_action(
            &mut *tx,
            &self.club_id,
            &id,
            AuditAction::CreateNotice,
            &actor.id,
            None,
            request_id,
        )
        .await?;

        let result = CreateNoticeResult { id };
        let stored = serde_json::to_value(&result)
            .map_err(|e| ClubError::Internal(format!("Result serialization: {}", e)))?;
        idempotency::record(&mut *tx, &self.club_id, request_id, &stored).await?;

        tx.commit().await?;

        Ok(IdempotentOutcome {
            result,
            replayed: false,
        })
    }

    /// Get a post by id
    pub async fn get(&self, post_id: &str) -> ClubResult<Option<Post>> {
        let row = sqlx::query(
            r#"
            SELECT id, club_id, post_type, event_type, title, content, place,
                   start_at, vote_close_at, vote_closed, vote_closed_at, vote_closed_by,
                   comment_count, created_by, created_at, updated_at
            FROM posts
            WHERE id = ? AND club_id = ?
            "#,
        )
        .bind(post_id)
        .bind(&self.club_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(Self::parse_post).transpose()
    }

    /// Get a post, failing with NotFound when absent
    pub async fn require(&self, post_id: &str) -> ClubResult<Post> {
        self.get(post_id)
            .await?
            .ok_or_else(|| ClubError::NotFound(format!("Post {} not found", post_id)))
    }

    /// Operational override of an event's vote-close instant.
    /// Role-gated; does not touch the closed flag.
    pub async fn override_vote_close_at(
        &self,
        actor: &Member,
        post_id: &str,
        new_close_at: DateTime<Utc>,
    ) -> ClubResult<()> {
        self.check_club(actor)?;
        if !rbac::can(actor.role, Action::OverrideClose, ResourceKind::Event) {
            return Err(ClubError::Authorization(format!(
                "Role {} may not override the vote window",
                actor.role.as_str()
            )));
        }

        let result = sqlx::query(
            r#"
            UPDATE posts
            SET vote_close_at = ?, updated_at = ?
            WHERE id = ? AND club_id = ? AND post_type = 'event'
            "#,
        )
        .bind(ts(new_close_at))
        .bind(ts(Utc::now()))
        .bind(post_id)
        .bind(&self.club_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ClubError::NotFound(format!("Event {} not found", post_id)));
        }

        Ok(())
    }

    fn check_club(&self, actor: &Member) -> ClubResult<()> {
        if actor.club_id != self.club_id {
            return Err(ClubError::Authorization(format!(
                "Member {} does not belong to this club",
                actor.id
            )));
        }
        Ok(())
    }

    fn parse_post(row: sqlx::sqlite::SqliteRow) -> ClubResult<Post> {
        let post_type_str: String = row.get("post_type");
        let opt_ts = |row: &sqlx::sqlite::SqliteRow, col: &str| -> ClubResult<Option<DateTime<Utc>>> {
            row.try_get::<Option<String>, _>(col)
                .map_err(ClubError::from)?
                .map(|s| parse_ts(&s))
                .transpose()
        };

        let created_at_str: String = row.get("created_at");
        let updated_at_str: String = row.get("updated_at");

        Ok(Post {
            id: row.get("id"),
            club_id: row.get("club_id"),
            post_type: PostType::from_str(&post_type_str)?,
            event_type: row.get("event_type"),
            title: row.get("title"),
            content: row.get("content"),
            place: row.get("place"),
            start_at: opt_ts(&row, "start_at")?,
            vote_close_at: opt_ts(&row, "vote_close_at")?,
            vote_closed: row.get::<Option<bool>, _>("vote_closed"),
            vote_closed_at: opt_ts(&row, "vote_closed_at")?,
            vote_closed_by: row.get("vote_closed_by"),
            comment_count: row.get("comment_count"),
            created_by: row.get("created_by"),
            created_at: parse_ts(&created_at_str)?,
            updated_at: parse_ts(&updated_at_str)?,
        })
    }
}
