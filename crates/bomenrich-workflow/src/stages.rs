//! Stages 2–5 of the enrichment pipeline: bulk catalog
//! prefilter, then batched per-line activities with pause/cancel checks at
//! each batch boundary.

use std::sync::Arc;

use futures::future::join_all;
use uuid::Uuid;

use bomenrich_core::{BomLineItem, CoreError, LineEnrichmentStatus};
use bomenrich_suppliers::PacingConfig;

use crate::activity::{EnrichmentActivity, LineOutcome};
use crate::signals::WorkflowHandle;
use crate::state::WorkflowState;

/// Maximum number of extra passes given to lines repeatedly deferred by lock
/// contention before they're marked `failed` outright — bounds the stage's
/// own wall time instead of retrying forever against a contended key.
const MAX_DEFER_PASSES: u32 = 3;

pub struct PrefilterOutcome {
    pub remaining: Vec<BomLineItem>,
    pub prefiltered: u32,
}

/// Stage 2: one catalog lookup per line; high-quality existing matches skip
/// straight to `enriched` without touching the supplier gateway.
pub async fn bulk_prefilter(activity: &EnrichmentActivity<'_>, bom_id: Uuid, lines: Vec<BomLineItem>) -> Result<PrefilterOutcome, CoreError> {
    let mut remaining = Vec::new();
    let mut prefiltered = 0;

    for line in lines {
        match activity.catalog.find(&line.mpn, line.manufacturer.as_deref().unwrap_or("")).await? {
            Some(component) => {
                activity.record_catalog_hit(bom_id, &line, &component).await?;
                prefiltered += 1;
            }
            None => remaining.push(line),
        }
    }

    Ok(PrefilterOutcome { remaining, prefiltered })
}

/// Stage 3–5: runs `lines` through the supplier gateway in batches of
/// `pacing.batch_size`, honoring pause/cancel at each batch boundary and
/// persisting progress via `on_batch_complete` after every batch.
pub async fn run_batches<F, Fut>(
    activity: &EnrichmentActivity<'_>,
    handle: &Arc<WorkflowHandle>,
    pacing: &PacingConfig,
    bom_id: Uuid,
    lines: Vec<BomLineItem>,
    mut on_batch_complete: F,
) -> Result<(), CoreError>
where
F: FnMut() -> Fut,
Fut: std::future::Future<Output = Result<(), CoreError>>,
{
    let mut queue = lines;
    let mut defer_pass = 0;

    while !queue.is_empty() {
        if handle.is_cancelled() {
            tracing::info!(bom_id = %bom_id, "cancel signal observed, stopping before next batch");
            break;
        }

        if handle.is_paused() {
            handle.set_state(WorkflowState::Paused).await;
            while handle.is_paused() && !handle.is_cancelled() {
                handle.wait_for_signal().await;
            }
            if !handle.is_cancelled() {
                handle.set_state(WorkflowState::Enriching).await;
            }
        }
        if handle.is_cancelled() {
            break;
        }

        let batch_size = pacing.batch_size.max(1) as usize;
        let batch: Vec<BomLineItem> = queue.drain(..queue.len().min(batch_size)).collect();

        let mut futures = Vec::with_capacity(batch.len());
        for line in &batch {
            pacing.pause_between_components().await;
            futures.push(activity.run(bom_id, line));
        }
        let results = join_all(futures).await;

        let mut deferred_this_batch = Vec::new();
        for (line, result) in batch.into_iter().zip(results) {
            match result {
                Ok(LineOutcome::Enriched) => {
                    handle.update_progress(|p| p.enriched += 1).await;
                }
                Ok(LineOutcome::Failed) => {
                    handle.update_progress(|p| p.failed += 1).await;
                }
                Ok(LineOutcome::Deferred) => {
                    deferred_this_batch.push(line);
                }
                Err(err) => {
                    tracing::error!(bom_id = %bom_id, line_id = %line.id, error = %err, "line activity errored");
                    handle.update_progress(|p| p.failed += 1).await;
                }
            }
        }

        if queue.is_empty() && !deferred_this_batch.is_empty() {
            defer_pass += 1;
            if defer_pass > MAX_DEFER_PASSES {
                let count = deferred_this_batch.len() as u32;
                tracing::warn!(bom_id = %bom_id, count, "lines still lock-contended after max defer passes, marking skipped");
                handle.update_progress(|p| p.skipped += count).await;
            } else {
                queue = deferred_this_batch;
            }
        } else {
            queue.extend(deferred_this_batch);
        }

        on_batch_complete().await?;
        pacing.pause_between_batches().await;
    }

    Ok(())
}

pub fn is_terminal_ready(total: u32, enriched: u32, failed: u32, skipped: u32) -> bool {
    enriched + failed + skipped >= total
}

/// Quick status derivation for a line outcome, used by callers that persist
/// per-line status alongside the aggregate progress counters.
pub fn outcome_to_status(outcome: LineOutcome) -> LineEnrichmentStatus {
    match outcome {
        LineOutcome::Enriched => LineEnrichmentStatus::Enriched,
        LineOutcome::Failed => LineEnrichmentStatus::Failed,
        LineOutcome::Deferred => LineEnrichmentStatus::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_ready_matches_total() {
        assert!(is_terminal_ready(10, 7, 2, 1));
        assert!(!is_terminal_ready(10, 7, 2, 0));
    }
}
