/// Auto-close engine for expired voting windows
///
/// One selection-and-apply core shared by the 10-minute scheduled run and
/// the operational CLI run. Selection prefers the indexed composite query
/// and falls back to a full scan when the store signals the index is not
/// provisioned. The apply step is a chunked conditional batch update, so
/// overlapping runs close each event at most once without any lock; that
/// relaxed-consistency choice is deliberate.
use crate::config::VoteConfig;
use crate::error::{ClubError, ClubResult};
use crate::store::{DocStore, EventCandidate};
use crate::vote;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

/// Which invocation context is running; recorded as `vote_closed_by`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunSource {
    Scheduler,
    OpsScript,
}

impl RunSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunSource::Scheduler => "scheduler",
            RunSource::OpsScript => "ops-script",
        }
    }
}

/// Which selection plan ended up producing the candidate set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanUsed {
    Indexed,
    FullScan,
}

/// Result of one engine run
#[derive(Debug, Clone, Serialize)]
pub struct CloseReport {
    pub source: RunSource,
    pub plan: PlanUsed,
    pub dry_run: bool,
    /// Ids selected for closing, in selection order
    pub selected: Vec<String>,
    /// Rows actually flipped by committed chunks; always 0 on a dry run
    pub closed: u64,
    /// Chunks whose commit failed; their events stay open for the next run
    pub failed_chunks: u32,
}

trait SelectionStrategy {
    fn label(&self) -> &'static str;
    async fn select(&self, store: &DocStore, now: DateTime<Utc>)
        -> ClubResult<Vec<EventCandidate>>;
}

/// Plan A: indexed composite query, capped per run. The in-memory re-check
/// of the closed flag stays even though the query already bounds the set;
/// tri-state flags are too easy to get wrong at the query layer.
struct IndexedPlan {
    cap: usize,
}

impl SelectionStrategy for IndexedPlan {
    fn label(&self) -> &'static str {
        "indexed"
    }

    async fn select(
        &self,
        store: &DocStore,
        now: DateTime<Utc>,
    ) -> ClubResult<Vec<EventCandidate>> {
        let mut candidates = store.query_expired_events(now, self.cap).await?;
        candidates.retain(|c| !vote::is_closed(c.vote_closed));
        Ok(candidates)
    }
}

/// Plan B: single-field query plus in-memory filtering; used only when the
/// composite index is unavailable.
struct FullScanPlan;

impl SelectionStrategy for FullScanPlan {
    fn label(&self) -> &'static str {
        "full-scan"
    }

    async fn select(
        &self,
        store: &DocStore,
        now: DateTime<Utc>,
    ) -> ClubResult<Vec<EventCandidate>> {
        let mut candidates = store.query_events().await?;
        candidates.retain(|c| c.vote_close_at <= now && !vote::is_closed(c.vote_closed));
        candidates.sort_by(|a, b| a.vote_close_at.cmp(&b.vote_close_at));
        Ok(candidates)
    }
}

/// The engine
#[derive(Clone)]
pub struct AutoCloseEngine {
    store: DocStore,
    cap: usize,
    chunk_size: usize,
}

impl AutoCloseEngine {
    pub fn new(store: DocStore, config: &VoteConfig) -> Self {
        Self {
            store,
            cap: config.selection_cap,
            chunk_size: config.batch_chunk_size,
        }
    }

    /// Run the close cycle once. Selection happens entirely before the first
    /// write; a dry run stops after logging the decisions.
    pub async fn run(
        &self,
        now: DateTime<Utc>,
        source: RunSource,
        dry_run: bool,
    ) -> ClubResult<CloseReport> {
        let indexed = IndexedPlan { cap: self.cap };
        let (candidates, plan) = match indexed.select(&self.store, now).await {
            Ok(candidates) => (candidates, PlanUsed::Indexed),
            Err(ClubError::IndexUnavailable(msg)) => {
                warn!("Indexed close query unavailable ({}), falling back to full scan", msg);
                let fallback = FullScanPlan;
                (fallback.select(&self.store, now).await?, PlanUsed::FullScan)
            }
            Err(e) => return Err(e),
        };

        // Per-item decision log, identical for dry-run and apply
        for candidate in &candidates {
            info!(
                "close decision: event={} \"{}\" close_at={} vote_closed={:?} -> closed by {}",
                candidate.id,
                candidate.title,
                candidate.vote_close_at,
                candidate.vote_closed,
                source.as_str()
            );
        }

        let selected: Vec<String> = candidates.iter().map(|c| c.id.clone()).collect();

        if dry_run {
            info!(
                "dry run: {} event(s) would be closed ({} plan)",
                selected.len(),
                match plan {
                    PlanUsed::Indexed => "indexed",
                    PlanUsed::FullScan => "full-scan",
                }
            );
            return Ok(CloseReport {
                source,
                plan,
                dry_run,
                selected,
                closed: 0,
                failed_chunks: 0,
            });
        }

        let mut closed = 0u64;
        let mut failed_chunks = 0u32;
        for chunk in selected.chunks(self.chunk_size) {
            match self.store.close_chunk(chunk, source.as_str(), now).await {
                Ok(flipped) => closed += flipped,
                // A failed chunk stays open; the next run picks it up.
                // Committed chunks before it remain closed (idempotent,
                // monotonic, no compensating rollback).
                Err(e) => {
                    failed_chunks += 1;
                    error!("close chunk of {} event(s) failed: {}", chunk.len(), e);
                }
            }
        }

        info!(
            "auto-close run done: source={} selected={} closed={} failed_chunks={}",
            source.as_str(),
            selected.len(),
            closed,
            failed_chunks
        );

        Ok(CloseReport {
            source,
            plan,
            dry_run,
            selected,
            closed,
            failed_chunks,
        })
    }
}
