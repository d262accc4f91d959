/// End-to-end flow over an in-memory database: event creation, the vote
/// window, the auto-close engine, and the moderation pipeline working
/// against the same club context.
use chrono::{Duration, TimeZone, Utc};
use matchday::autoclose::RunSource;
use matchday::config::{AppConfig, LoggingConfig, ServiceConfig, StorageConfig, VoteConfig};
use matchday::context::AppContext;
use matchday::db;
use matchday::error::ClubError;
use matchday::members::Member;
use matchday::moderation::{ModerateRequest, ModerationAction};
use matchday::posts::CreateEventInput;
use matchday::rbac::Role;
use matchday::vote::AttendanceStatus;
use sqlx::SqlitePool;

const CLUB: &str = "fc-riverside";

fn config() -> AppConfig {
    AppConfig {
        service: ServiceConfig {
            hostname: "localhost".to_string(),
            port: 0,
            club_id: CLUB.to_string(),
        },
        storage: StorageConfig {
            data_directory: "./data".into(),
            club_db: "./data/club.sqlite".into(),
        },
        vote: VoteConfig {
            close_interval_secs: 600,
            selection_cap: 200,
            batch_chunk_size: 400,
        },
        logging: LoggingConfig {
            level: "info".to_string(),
        },
    }
}

fn member(id: &str, role: Role) -> Member {
    Member {
        id: id.to_string(),
        club_id: CLUB.to_string(),
        display_name: id.to_string(),
        real_name: Some("Full Name".to_string()),
        phone: Some("010-1234".to_string()),
        role,
        push_token: None,
    }
}

async fn context() -> AppContext {
    let pool = SqlitePool::connect(":memory:").await.unwrap();
    db::init_schema(&pool).await.unwrap();
    let ctx = AppContext::from_pool(config(), pool);
    ctx.provision_indexes().await.unwrap();

    for m in [
        member("president", Role::President),
        member("author", Role::Member),
        member("voter", Role::Member),
    ] {
        ctx.members.add(&m).await.unwrap();
    }

    ctx
}

#[tokio::test]
async fn event_lifecycle_from_creation_to_auto_close() {
    let ctx = context().await;
    let president = member("president", Role::President);
    let voter = member("voter", Role::Member);

    // Create an event starting day D 19:00 region time (10:00 UTC)
    let start_at = Utc.with_ymd_and_hms(2025, 6, 14, 10, 0, 0).unwrap();
    let created = ctx
        .posts
        .create_event(
            &president,
            &CreateEventInput {
                event_type: "match".to_string(),
                title: "Saturday friendly".to_string(),
                content: "vs. Harbor FC".to_string(),
                place: "Pitch 2".to_string(),
                start_at,
            },
            "req-create",
        )
        .await
        .unwrap();

    // Close instant is D-1 21:00 region time == D-1 12:00 UTC
    let close_at = created.result.vote_close_at;
    assert_eq!(close_at, Utc.with_ymd_and_hms(2025, 6, 13, 12, 0, 0).unwrap());

    // Voting works inside the window
    ctx.attendance
        .set_status(
            &voter,
            &created.result.post_id,
            AttendanceStatus::Attending,
            close_at - Duration::hours(1),
        )
        .await
        .unwrap();

    // A close instant one hour in the future keeps the event out of a run
    let before = ctx
        .engine
        .run(close_at - Duration::hours(1), RunSource::Scheduler, false)
        .await
        .unwrap();
    assert!(before.selected.is_empty());

    // Once the window has elapsed the engine closes it, exactly once
    let after = ctx
        .engine
        .run(close_at + Duration::hours(1), RunSource::Scheduler, false)
        .await
        .unwrap();
    assert_eq!(after.selected, vec![created.result.post_id.clone()]);
    assert_eq!(after.closed, 1);

    let again = ctx
        .engine
        .run(close_at + Duration::hours(2), RunSource::OpsScript, false)
        .await
        .unwrap();
    assert_eq!(again.closed, 0);

    let post = ctx.posts.require(&created.result.post_id).await.unwrap();
    assert_eq!(post.vote_closed, Some(true));
    assert_eq!(post.vote_closed_by.as_deref(), Some("scheduler"));

    // Voting is now denied even inside what used to be the window
    let denied = ctx
        .attendance
        .set_status(
            &voter,
            &created.result.post_id,
            AttendanceStatus::NotAttending,
            close_at - Duration::hours(1),
        )
        .await;
    assert!(matches!(denied, Err(ClubError::Authorization(_))));
}

#[tokio::test]
async fn privileged_direct_write_denied_but_pipeline_succeeds() {
    let ctx = context().await;
    let president = member("president", Role::President);
    let author = member("author", Role::Member);

    let created = ctx
        .posts
        .create_event(
            &president,
            &CreateEventInput {
                event_type: "training".to_string(),
                title: "Drills".to_string(),
                content: String::new(),
                place: "Pitch 1".to_string(),
                start_at: Utc.with_ymd_and_hms(2025, 6, 17, 10, 0, 0).unwrap(),
            },
            "req-create",
        )
        .await
        .unwrap();

    let comment = ctx
        .comments
        .create(&author, &created.result.post_id, "unacceptable tone")
        .await
        .unwrap();

    // Direct mutation by a non-author, even the president, is denied
    let direct = ctx
        .comments
        .delete_own(&president, &comment.id)
        .await;
    assert!(matches!(direct, Err(ClubError::Authorization(_))));

    // The pipeline with a fresh request id succeeds
    let req = ModerateRequest {
        post_id: created.result.post_id.clone(),
        comment_id: comment.id.clone(),
        action: ModerationAction::Delete,
        content: None,
        reason: Some("code of conduct".to_string()),
        request_id: "req-mod".to_string(),
    };
    let outcome = ctx.moderation.moderate(Some(&president), &req).await.unwrap();
    assert!(!outcome.replayed);

    // Exactly one audit record, no matter how often the call is retried
    for _ in 0..3 {
        let replay = ctx.moderation.moderate(Some(&president), &req).await.unwrap();
        assert!(replay.replayed);
        assert_eq!(replay.result.audit_id, outcome.result.audit_id);
    }
    let records = ctx.audit.find_by_request(CLUB, "req-mod").await.unwrap();
    assert_eq!(records.len(), 1);

    assert!(ctx.comments.require(&comment.id).await.unwrap().deleted);
}

#[tokio::test]
async fn fallback_plan_closes_same_events_when_index_missing() {
    // Context without provisioned indexes: plan A fails, plan B takes over
    let pool = SqlitePool::connect(":memory:").await.unwrap();
    db::init_schema(&pool).await.unwrap();
    let ctx = AppContext::from_pool(config(), pool);
    ctx.members
        .add(&member("president", Role::President))
        .await
        .unwrap();

    let president = member("president", Role::President);
    let created = ctx
        .posts
        .create_event(
            &president,
            &CreateEventInput {
                event_type: "match".to_string(),
                title: "Friendly".to_string(),
                content: String::new(),
                place: "Pitch".to_string(),
                start_at: Utc.with_ymd_and_hms(2025, 6, 14, 10, 0, 0).unwrap(),
            },
            "req-create",
        )
        .await
        .unwrap();

    let report = ctx
        .engine
        .run(
            created.result.vote_close_at + Duration::hours(1),
            RunSource::OpsScript,
            false,
        )
        .await
        .unwrap();

    assert_eq!(report.plan, matchday::autoclose::PlanUsed::FullScan);
    assert_eq!(report.selected, vec![created.result.post_id.clone()]);
    assert_eq!(report.closed, 1);
}
