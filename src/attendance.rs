/// Attendance records, one per (event, member)
///
/// The vote-window gate lives in the rules layer and nowhere else; this
/// manager re-reads the owning event on every write so a flipped flag or an
/// ops override takes effect on the next attempt with no caching.
use crate::db::{parse_ts, ts};
use crate::error::{ClubError, ClubResult};
use crate::members::Member;
use crate::posts::PostManager;
use crate::rules::{self, DirectWrite};
use crate::vote::AttendanceStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

/// An attendance record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub post_id: String,
    pub member_id: String,
    pub status: AttendanceStatus,
    pub updated_at: DateTime<Utc>,
}

/// Attendance manager
#[derive(Clone)]
pub struct AttendanceManager {
    db: SqlitePool,
    posts: PostManager,
}

impl AttendanceManager {
    pub fn new(db: SqlitePool, posts: PostManager) -> Self {
        Self { db, posts }
    }

    /// Record the actor's own attendance for an event
    pub async fn set_status(
        &self,
        actor: &Member,
        post_id: &str,
        status: AttendanceStatus,
        now: DateTime<Utc>,
    ) -> ClubResult<AttendanceRecord> {
        let post = self.posts.require(post_id).await?;
        let existing = self.get(post_id, &actor.id).await?;

        rules::check_direct_write(
            actor,
            &DirectWrite::Attendance {
                owner_id: &actor.id,
                post: &post,
                is_create: existing.is_none(),
            },
            now,
        )?;

        sqlx::query(
            r#"
            INSERT INTO attendance (post_id, member_id, status, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (post_id, member_id)
            DO UPDATE SET status = excluded.status, updated_at = excluded.updated_at
            "#,
        )
        .bind(post_id)
        .bind(&actor.id)
        .bind(status.as_str())
        .bind(ts(now))
        .execute(&self.db)
        .await?;

        Ok(AttendanceRecord {
            post_id: post_id.to_string(),
            member_id: actor.id.clone(),
            status,
            updated_at: now,
        })
    }

    /// Get one member's record for an event
    pub async fn get(
        &self,
        post_id: &str,
        member_id: &str,
    ) -> ClubResult<Option<AttendanceRecord>> {
        let row = sqlx::query(
            r#"
            SELECT post_id, member_id, status, updated_at
            FROM attendance
            WHERE post_id = ? AND member_id = ?
            "#,
        )
        .bind(post_id)
        .bind(member_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(Self::parse_record).transpose()
    }

    /// All records for an event
    pub async fn list_for_event(&self, post_id: &str) -> ClubResult<Vec<AttendanceRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT post_id, member_id, status, updated_at
            FROM attendance
            WHERE post_id = ?
            ORDER BY updated_at ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Self::parse_record).collect()
    }

    fn parse_record(row: sqlx::sqlite::SqliteRow) -> ClubResult<AttendanceRecord> {
        let status_str: String = row.get("status");
        let updated_at_str: String = row.get("updated_at");
        Ok(AttendanceRecord {
            post_id: row.get("post_id"),
            member_id: row.get("member_id"),
            status: AttendanceStatus::from_str(&status_str)?,
            updated_at: parse_ts(&updated_at_str)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use crate::posts::CreateEventInput;
    use crate::rbac::Role;
    use chrono::{Duration, TimeZone};

    fn member(id: &str, role: Role) -> Member {
        Member {
            id: id.to_string(),
            club_id: "fc-riverside".to_string(),
            display_name: id.to_string(),
            real_name: Some("Name".to_string()),
            phone: Some("010-1111".to_string()),
            role,
            push_token: None,
        }
    }

    async fn setup() -> (AttendanceManager, PostManager, String) {
        let pool = memory_pool().await;
        let posts = PostManager::new(pool.clone(), "fc-riverside".to_string());
        let attendance = AttendanceManager::new(pool, posts.clone());

        let input = CreateEventInput {
            event_type: "match".to_string(),
            title: "Friendly".to_string(),
            content: String::new(),
            place: "Pitch 1".to_string(),
            start_at: Utc.with_ymd_and_hms(2025, 6, 14, 10, 0, 0).unwrap(),
        };
        let created = posts
            .create_event(&member("officer", Role::Admin), &input, "req-ev")
            .await
            .unwrap();

        (attendance, posts, created.result.post_id)
    }

    #[tokio::test]
    async fn test_upsert_while_open() {
        let (attendance, posts, post_id) = setup().await;
        let actor = member("m1", Role::Member);
        let close_at = posts.require(&post_id).await.unwrap().vote_close_at.unwrap();
        let before_close = close_at - Duration::hours(1);

        attendance
            .set_status(&actor, &post_id, AttendanceStatus::Attending, before_close)
            .await
            .unwrap();
        attendance
            .set_status(&actor, &post_id, AttendanceStatus::NotAttending, before_close)
            .await
            .unwrap();

        let record = attendance.get(&post_id, "m1").await.unwrap().unwrap();
        assert_eq!(record.status, AttendanceStatus::NotAttending);
        assert_eq!(attendance.list_for_event(&post_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_write_denied_after_window() {
        let (attendance, posts, post_id) = setup().await;
        let actor = member("m1", Role::Member);
        let close_at = posts.require(&post_id).await.unwrap().vote_close_at.unwrap();

        let err = attendance
            .set_status(
                &actor,
                &post_id,
                AttendanceStatus::Attending,
                close_at + Duration::seconds(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClubError::Authorization(_)));
    }

    #[tokio::test]
    async fn test_override_flips_permission_next_attempt() {
        let (attendance, posts, post_id) = setup().await;
        let admin = member("officer", Role::Admin);
        let actor = member("m1", Role::Member);
        let now = Utc.with_ymd_and_hms(2025, 6, 13, 12, 0, 0).unwrap();

        // Pull the window into the past: writes denied
        posts
            .override_vote_close_at(&admin, &post_id, now - Duration::hours(1))
            .await
            .unwrap();
        assert!(attendance
            .set_status(&actor, &post_id, AttendanceStatus::Attending, now)
            .await
            .is_err());

        // Push it back into the future: next attempt succeeds
        posts
            .override_vote_close_at(&admin, &post_id, now + Duration::hours(1))
            .await
            .unwrap();
        assert!(attendance
            .set_status(&actor, &post_id, AttendanceStatus::Attending, now)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_missing_event_is_not_found() {
        let (attendance, _posts, _post_id) = setup().await;
        let actor = member("m1", Role::Member);
        let err = attendance
            .set_status(&actor, "nope", AttendanceStatus::Attending, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ClubError::NotFound(_)));
    }
}
