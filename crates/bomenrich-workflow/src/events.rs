//! Durable event log backing the workflow ("replayable
//! event-sourced execution"). Every stage transition appends a row to
//! `enrichment_events` rather than mutating state in place, so
//! `get_progress` and crash recovery both read from the same durable
//! source instead of the in-process `WorkflowHandle`, which is lost on
//! restart.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use bomenrich_core::CoreError;

use crate::state::{BomProgress, WorkflowState};

pub struct EnrichmentEventStore {
    pool: PgPool,
}

#[derive(FromRow)]
struct EventRow {
    state: String,
    total: i32,
    enriched: i32,
    failed: i32,
    skipped: i32,
    recorded_at: DateTime<Utc>,
}

impl EnrichmentEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn append(
        &self,
        workflow_id: &str,
        bom_id: Uuid,
        organization_id: Uuid,
        state: WorkflowState,
        progress: BomProgress,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO enrichment_events \
            (id, bom_id, organization_id, workflow_id, state, total, enriched, failed, skipped, recorded_at) \
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
            .bind(Uuid::new_v4())
            .bind(bom_id)
            .bind(organization_id)
            .bind(workflow_id)
            .bind(state_to_str(state))
            .bind(progress.total as i32)
            .bind(progress.enriched as i32)
            .bind(progress.failed as i32)
            .bind(progress.skipped as i32)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(CoreError::Database)?;
        Ok(())
    }

    /// Reads the most recent event for `workflow_id` — the replay source for
    /// `get_progress` when no in-process handle is registered (e.g. after a
    /// restart) and for admin inspection of a terminated run.
    pub async fn latest(&self, workflow_id: &str) -> Result<Option<(WorkflowState, BomProgress)>, CoreError> {
        let row: Option<EventRow> = sqlx::query_as(
            "SELECT state, total, enriched, failed, skipped, recorded_at FROM enrichment_events \
            WHERE workflow_id = $1 ORDER BY recorded_at DESC LIMIT 1",
        )
            .bind(workflow_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(CoreError::Database)?;

        Ok(row.map(|r| {
                    (
                        str_to_state(&r.state),
                        BomProgress { total: r.total as u32, enriched: r.enriched as u32, failed: r.failed as u32, skipped: r.skipped as u32 },
                    )
                }))
    }

    /// Looks up the tenant that owns `workflow_id` from the durable log, for
    /// tenant-isolation checks against a workflow with no live in-process
    /// handle.
    pub async fn organization_id_for(&self, workflow_id: &str) -> Result<Option<Uuid>, CoreError> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT organization_id FROM enrichment_events \
            WHERE workflow_id = $1 ORDER BY recorded_at DESC LIMIT 1",
        )
            .bind(workflow_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(CoreError::Database)?;
        Ok(row.map(|(org,)| org))
    }
}

fn state_to_str(state: WorkflowState) -> &'static str {
    match state {
        WorkflowState::Parsed => "parsed",
        WorkflowState::Enriching => "enriching",
        WorkflowState::Paused => "paused",
        WorkflowState::Completed => "completed",
        WorkflowState::Failed => "failed",
        WorkflowState::Cancelled => "cancelled",
    }
}

fn str_to_state(s: &str) -> WorkflowState {
    match s {
        "parsed" => WorkflowState::Parsed,
        "enriching" => WorkflowState::Enriching,
        "paused" => WorkflowState::Paused,
        "completed" => WorkflowState::Completed,
        "failed" => WorkflowState::Failed,
        _ => WorkflowState::Cancelled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_its_string_form() {
        for state in [
            WorkflowState::Parsed,
            WorkflowState::Enriching,
            WorkflowState::Paused,
            WorkflowState::Completed,
            WorkflowState::Failed,
            WorkflowState::Cancelled,
        ] {
            assert_eq!(str_to_state(state_to_str(state)), state);
        }
    }
}
