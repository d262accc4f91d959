/// Callable boundary: the retryable club operations
///
/// Every callable carries a `requestId` and is safe to retry; every callable
/// validates the club id against the configured club before touching data.
use crate::auth::AuthContext;
use crate::context::AppContext;
use crate::error::{ClubError, ClubResult};
use crate::moderation::{ModerateRequest, ModerationAction, ModerationOutcome};
use crate::posts::{CreateEventInput, CreateEventResult, CreateNoticeResult};
use crate::push::PushPayload;
use axum::{extract::State, routing::post, Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/moderate-comment", post(moderate_comment))
        .route("/api/create-event-post", post(create_event_post))
        .route("/api/create-notice", post(create_notice))
}

fn check_club(ctx: &AppContext, club_id: &str) -> ClubResult<()> {
    if club_id != ctx.club_id() {
        return Err(ClubError::Validation(format!(
            "Unknown club: {}",
            club_id
        )));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModerateCommentBody {
    club_id: String,
    post_id: String,
    comment_id: String,
    action: String,
    content: Option<String>,
    reason: Option<String>,
    request_id: String,
}

async fn moderate_comment(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(body): Json<ModerateCommentBody>,
) -> ClubResult<Json<ModerationOutcome>> {
    check_club(&ctx, &body.club_id)?;

    let req = ModerateRequest {
        post_id: body.post_id,
        comment_id: body.comment_id,
        action: ModerationAction::from_str(&body.action)?,
        content: body.content,
        reason: body.reason,
        request_id: body.request_id,
    };

    let outcome = ctx.moderation.moderate(Some(&auth.member), &req).await?;
    Ok(Json(outcome.result))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateEventBody {
    club_id: String,
    event_type: String,
    title: String,
    content: String,
    place: String,
    start_at: DateTime<Utc>,
    request_id: String,
}

async fn create_event_post(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(body): Json<CreateEventBody>,
) -> ClubResult<Json<CreateEventResult>> {
    check_club(&ctx, &body.club_id)?;

    let input = CreateEventInput {
        event_type: body.event_type,
        title: body.title,
        content: body.content,
        place: body.place,
        start_at: body.start_at,
    };

    let outcome = ctx
        .posts
        .create_event(&auth.member, &input, &body.request_id)
        .await?;
    Ok(Json(outcome.result))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateNoticeBody {
    club_id: String,
    title: String,
    content: String,
    request_id: String,
}

async fn create_notice(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(body): Json<CreateNoticeBody>,
) -> ClubResult<Json<CreateNoticeResult>> {
    check_club(&ctx, &body.club_id)?;

    let outcome = ctx
        .posts
        .create_notice(&auth.member, &body.title, &body.content, &body.request_id)
        .await?;

    // Push fan-out only on first processing; a replayed request already
    // notified everyone
    if !outcome.replayed {
        let tokens = ctx.members.push_tokens(ctx.club_id()).await?;
        let payload = PushPayload {
            title: body.title,
            body: body.content,
        };
        let summary = ctx.pusher.broadcast(&tokens, &payload).await;
        info!(
            "notice {} pushed: sent={} failed={}",
            outcome.result.id, summary.sent, summary.failed
        );
    }

    Ok(Json(outcome.result))
}
