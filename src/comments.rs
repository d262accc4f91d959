/// Comments on posts: the member-owned direct path
///
/// Authors create, edit and delete their own comments here, guarded by the
/// declarative rules layer. Anything touching someone else's comment must go
/// through the moderation pipeline. The parent post's comment_count is kept
/// in step inside the same transaction.
use crate::db::{parse_ts, ts};
use crate::error::{ClubError, ClubResult};
use crate::members::Member;
use crate::rules::{self, DirectWrite};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// A comment document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub club_id: String,
    pub post_id: String,
    pub content: String,
    pub author_id: String,
    pub author_name: String,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Comment manager
#[derive(Clone)]
pub struct CommentManager {
    db: SqlitePool,
    club_id: String,
}

impl CommentManager {
    pub fn new(db: SqlitePool, club_id: String) -> Self {
        Self { db, club_id }
    }

    /// Create a comment under a post
    pub async fn create(
        &self,
        actor: &Member,
        post_id: &str,
        content: &str,
    ) -> ClubResult<Comment> {
        rules::check_direct_write(actor, &DirectWrite::CommentCreate, Utc::now())?;

        if content.trim().is_empty() {
            return Err(ClubError::Validation("Comment content is required".to_string()));
        }

        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        let mut tx = self.db.begin().await?;

        let post_exists = sqlx::query("SELECT 1 FROM posts WHERE id = ? AND club_id = ?")
            .bind(post_id)
            .bind(&self.club_id)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !post_exists {
            return Err(ClubError::NotFound(format!("Post {} not found", post_id)));
        }

        sqlx::query(
            r#"
            INSERT INTO comments
            (id, club_id, post_id, content, author_id, author_name, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&self.club_id)
        .bind(post_id)
        .bind(content)
        .bind(&actor.id)
        .bind(&actor.display_name)
        .bind(ts(now))
        .bind(ts(now))
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE posts SET comment_count = comment_count + 1 WHERE id = ?")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Comment {
            id,
            club_id: self.club_id.clone(),
            post_id: post_id.to_string(),
            content: content.to_string(),
            author_id: actor.id.clone(),
            author_name: actor.display_name.clone(),
            deleted: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Edit one's own comment. No profile re-check on purpose.
    pub async fn update_own(
        &self,
        actor: &Member,
        comment_id: &str,
        content: &str,
    ) -> ClubResult<()> {
        let comment = self.require(comment_id).await?;
        rules::check_direct_write(
            actor,
            &DirectWrite::CommentUpdate {
                author_id: &comment.author_id,
            },
            Utc::now(),
        )?;

        if content.trim().is_empty() {
            return Err(ClubError::Validation("Comment content is required".to_string()));
        }

        let result = sqlx::query(
            "UPDATE comments SET content = ?, updated_at = ? WHERE id = ? AND deleted = 0",
        )
        .bind(content)
        .bind(ts(Utc::now()))
        .bind(comment_id)
        .execute(&self.db)
        .await?;

        // The guard skips soft-deleted rows; tell the author instead of
        // succeeding as a no-op
        if result.rows_affected() == 0 {
            return Err(ClubError::Conflict(format!(
                "Comment {} has been deleted",
                comment_id
            )));
        }

        Ok(())
    }

    /// Delete one's own comment (soft delete)
    pub async fn delete_own(&self, actor: &Member, comment_id: &str) -> ClubResult<()> {
        let comment = self.require(comment_id).await?;
        rules::check_direct_write(
            actor,
            &DirectWrite::CommentDelete {
                author_id: &comment.author_id,
            },
            Utc::now(),
        )?;

        if comment.deleted {
            return Ok(());
        }

        let mut tx = self.db.begin().await?;
        sqlx::query("UPDATE comments SET deleted = 1, updated_at = ? WHERE id = ?")
            .bind(ts(Utc::now()))
            .bind(comment_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE posts SET comment_count = comment_count - 1 WHERE id = ? AND comment_count > 0",
        )
        .bind(&comment.post_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(())
    }

    /// Get a comment by id
    pub async fn get(&self, comment_id: &str) -> ClubResult<Option<Comment>> {
        let row = sqlx::query(
            r#"
            SELECT id, club_id, post_id, content, author_id, author_name, deleted,
                   created_at, updated_at
            FROM comments
            WHERE id = ? AND club_id = ?
            "#,
        )
        .bind(comment_id)
        .bind(&self.club_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(Self::parse_comment).transpose()
    }

    /// Get a comment, failing with NotFound when absent
    pub async fn require(&self, comment_id: &str) -> ClubResult<Comment> {
        self.get(comment_id)
            .await?
            .ok_or_else(|| ClubError::NotFound(format!("Comment {} not found", comment_id)))
    }

    fn parse_comment(row: sqlx::sqlite::SqliteRow) -> ClubResult<Comment> {
        let created_at_str: String = row.get("created_at");
        let updated_at_str: String = row.get("updated_at");
        Ok(Comment {
            id: row.get("id"),
            club_id: row.get("club_id"),
            post_id: row.get("post_id"),
            content: row.get("content"),
            author_id: row.get("author_id"),
            author_name: row.get("author_name"),
            deleted: row.get("deleted"),
            created_at: parse_ts(&created_at_str)?,
            updated_at: parse_ts(&updated_at_str)?,
        })
    }
}
