use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<crate::context::AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<crate::context::AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        tokio::spawn(Self::vote_close_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Close expired voting windows (runs every 10 minutes by default).
    /// The platform runs one tick at a time; an overlapping ops run is
    /// absorbed by the engine's idempotent writes.
    async fn vote_close_job(scheduler: Arc<Self>) {
        let secs = scheduler.context.config.vote.close_interval_secs;
        let mut interval = interval(Duration::from_secs(secs));

        loop {
            interval.tick().await;
            info!("Running scheduled vote close");

            match tasks::close_expired_votes(&scheduler.context).await {
                Ok(report) => {
                    if report.closed > 0 {
                        info!("Closed voting on {} event(s)", report.closed);
                    } else {
                        info!("Vote close: nothing to close");
                    }
                }
                Err(e) => error!("Failed to close expired votes: {}", e),
            }
        }
    }
}
