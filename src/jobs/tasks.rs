/// Background task implementations
use crate::autoclose::{CloseReport, RunSource};
use crate::{context::AppContext, error::ClubResult};
use chrono::Utc;

/// Close voting on events whose window has elapsed
pub async fn close_expired_votes(ctx: &AppContext) -> ClubResult<CloseReport> {
    ctx.engine.run(Utc::now(), RunSource::Scheduler, false).await
}
