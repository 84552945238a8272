//! The workflow engine: wires C2 (locks), C3 (suppliers), C4
//! (audit), C5 (catalog) together behind the `WorkflowDispatch` seam C6
//! dispatches onto. `WorkflowEngine::run` is the whole state machine body;
//! everything non-deterministic is delegated to `EnrichmentActivity`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use bomenrich_audit::{AuditFinalizer, AuditSink};
use bomenrich_auth::AuthContext;
use bomenrich_catalog::snapshot::RedisSnapshotStore;
use bomenrich_catalog::CatalogStore;
use bomenrich_core::{AuditObjectKind, CoreError, OrchestratorConfig};
use bomenrich_events::{StartWorkflowCommand, WorkflowDispatch, WorkflowSignal};
use bomenrich_locks::LockStore;
use bomenrich_suppliers::{PacingConfig, SupplierGateway};

use crate::activity::EnrichmentActivity;
use crate::events::EnrichmentEventStore;
use crate::lines::LineItemStore;
use crate::quality::QualityScorer;
use crate::signals::{ControlSignal, WorkflowHandle, WorkflowRegistry};
use crate::stages::{bulk_prefilter, run_batches};
use crate::state::WorkflowState;

#[derive(Clone)]
pub struct WorkflowEngine {
    pub locks: Arc<dyn LockStore>,
    pub gateway: Arc<SupplierGateway>,
    pub catalog: Arc<CatalogStore>,
    pub snapshot: Arc<RedisSnapshotStore>,
    pub audit: Arc<AuditSink>,
    pub finalizer: Arc<AuditFinalizer>,
    pub scorer: Arc<dyn QualityScorer>,
    pub config: Arc<OrchestratorConfig>,
    pub registry: Arc<WorkflowRegistry>,
    pub events: Arc<EnrichmentEventStore>,
    pub lines: Arc<LineItemStore>,
}

#[async_trait]
impl WorkflowDispatch for WorkflowEngine {
    async fn start_workflow(&self, cmd: StartWorkflowCommand) -> Result<(), CoreError> {
        let handle = match self.registry.register(&cmd.workflow_id, 0, cmd.organization_id) {
            Some(h) => h,
            None => {
                tracing::info!(workflow_id = %cmd.workflow_id, "workflow already running, ignoring duplicate start (P2)");
                return Ok(());
            }
        };

        let engine = self.clone();
        tokio::spawn(async move {
                if let Err(err) = engine.run_to_completion(cmd, handle).await {
                    tracing::error!(error = %err, "enrichment workflow failed");
                }
            });
        Ok(())
    }

    /// Relays a control signal to a live workflow without a tenant check —
    /// this is the seam the admin event-bus consumer dispatches onto, which
    /// acts on behalf of the whole platform rather than a single
    /// authenticated tenant. HTTP callers must go through
    /// `signal_workflow_authorized` instead.
    async fn signal_workflow(&self, workflow_id: &str, signal: WorkflowSignal) -> Result<(), CoreError> {
        let Some(handle) = self.registry.get(workflow_id) else {
            return Err(CoreError::NotFound);
        };
        let signal = match signal {
            WorkflowSignal::Pause => ControlSignal::Pause,
            WorkflowSignal::Resume => ControlSignal::Resume,
            WorkflowSignal::Cancel => ControlSignal::Cancel,
        };
        handle.apply(signal);
        Ok(())
    }
}

impl WorkflowEngine {
    /// Looks up the tenant that owns `workflow_id`: the live handle if the
    /// workflow is still running, else the durable event log. Returns
    /// `NotFound` if neither source has heard of this id.
    async fn organization_id_for(&self, workflow_id: &str) -> Result<Uuid, CoreError> {
        if let Some(handle) = self.registry.get(workflow_id) {
            return Ok(handle.organization_id);
        }
        self.events
            .organization_id_for(workflow_id)
            .await?
            .ok_or(CoreError::NotFound)
    }

    /// Non-blocking progress query: reads the in-process handle if the
    /// workflow is live, else falls back to the durable event log for a
    /// workflow that already terminated or ran in another process. Enforces
    /// tenant isolation: a caller outside the workflow's organization gets
    /// `NotFound`, the same as an unknown id.
    pub async fn get_progress(
        &self,
        auth: &AuthContext,
        workflow_id: &str,
    ) -> Result<Option<(WorkflowState, crate::state::BomProgress)>, CoreError> {
        let bom_org = match self.organization_id_for(workflow_id).await {
            Ok(org) => org,
            Err(CoreError::NotFound) => return Ok(None),
            Err(err) => return Err(err),
        };
        auth.guard_resource_org(bom_org)?;

        if let Some(handle) = self.registry.get(workflow_id) {
            return Ok(Some((handle.state().await, handle.progress().await)));
        }
        self.events.latest(workflow_id).await
    }

    /// Applies a pause/resume/cancel signal on behalf of an authenticated
    /// tenant caller, enforcing the same tenant guard as `get_progress`
    /// before delegating to the unauthenticated `WorkflowDispatch` impl.
    pub async fn signal_workflow_authorized(
        &self,
        auth: &AuthContext,
        workflow_id: &str,
        signal: WorkflowSignal,
    ) -> Result<(), CoreError> {
        let bom_org = self.organization_id_for(workflow_id).await?;
        auth.guard_resource_org(bom_org)?;
        WorkflowDispatch::signal_workflow(self, workflow_id, signal).await
    }

    /// Runs the enrichment workflow to completion in the caller's task
    /// instead of detaching it via `tokio::spawn` (the outer
    /// processing workflow invokes this one as a child and waits on it,
    /// the same way a Temporal child workflow blocks its parent).
    pub async fn run_enrichment_and_wait(&self, cmd: StartWorkflowCommand) -> Result<(WorkflowState, crate::state::BomProgress), CoreError> {
        let handle = self
            .registry
            .register(&cmd.workflow_id, 0, cmd.organization_id)
            .ok_or_else(|| CoreError::Conflict(format!("workflow {} already running", cmd.workflow_id)))?;
        let handle_for_result = handle.clone();
        self.run_to_completion(cmd, handle).await?;
        Ok((handle_for_result.state().await, handle_for_result.progress().await))
    }

    /// Runs `run()` to its conclusion and guarantees the registry entry is
    /// always freed and the workflow is left in a terminal state: a
    /// coordinator-fatal error transitions the workflow to `Failed` rather
    /// than leaving it stranded `Enriching` forever with its id permanently
    /// occupied.
    async fn run_to_completion(&self, cmd: StartWorkflowCommand, handle: Arc<WorkflowHandle>) -> Result<(), CoreError> {
        let workflow_id = cmd.workflow_id.clone();
        let bom_id = cmd.bom_id;
        let organization_id = cmd.organization_id;

        let result = self.run(cmd, handle.clone()).await;

        if let Err(err) = &result {
            tracing::error!(workflow_id = %workflow_id, error = %err, "enrichment workflow failed, transitioning to failed");
            handle.set_state(WorkflowState::Failed).await;
            let progress = handle.progress().await;
            if let Err(append_err) = self.events.append(&workflow_id, bom_id, organization_id, WorkflowState::Failed, progress, Utc::now()).await {
                tracing::error!(workflow_id = %workflow_id, error = %append_err, "failed to record failed-state event");
            }
        }

        self.registry.retire(&workflow_id);
        result
    }

    pub(crate) async fn run(&self, cmd: StartWorkflowCommand, handle: Arc<WorkflowHandle>) -> Result<(), CoreError> {
        let StartWorkflowCommand { workflow_id, bom_id, organization_id, .. } = cmd;

        handle.set_state(WorkflowState::Enriching).await;

        // Stage 1: verify snapshot. The parsed line items are the source of
        // truth for `total_items` here; a mismatch against the BOM row's
        // declared count is caught upstream at parse time, not re-validated
        // in this engine.
        let all_lines = self.lines.list_by_bom(bom_id).await?;
        handle.update_progress(|p| p.total = all_lines.len() as u32).await;
        self.record_progress(&workflow_id, bom_id, organization_id, &handle).await?;

        let activity = EnrichmentActivity {
            locks: self.locks.as_ref(),
            gateway: self.gateway.as_ref(),
            catalog: self.catalog.as_ref(),
            snapshot: self.snapshot.as_ref(),
            audit: self.audit.as_ref(),
            scorer: self.scorer.as_ref(),
            config: self.config.as_ref(),
            line_store: self.lines.as_ref(),
        };

        // Stage 2: bulk prefilter.
        let prefilter = bulk_prefilter(&activity, bom_id, all_lines).await?;
        handle.update_progress(|p| p.enriched += prefilter.prefiltered).await;
        self.record_progress(&workflow_id, bom_id, organization_id, &handle).await?;

        // Stages 3-5: batched per-line activities.
        let pacing = PacingConfig::from(self.config.as_ref());
        run_batches(&activity, &handle, &pacing, bom_id, prefilter.remaining, || {
                let workflow_id = workflow_id.clone();
                let handle = handle.clone();
                async move { self.record_progress(&workflow_id, bom_id, organization_id, &handle).await }
            })
            .await?;

        // Stage 6: finalize.
        let final_state = if handle.is_cancelled() {
            WorkflowState::Cancelled
        } else {
            WorkflowState::Completed
        };
        handle.set_state(final_state).await;
        self.record_progress(&workflow_id, bom_id, organization_id, &handle).await?;

        if final_state == WorkflowState::Completed {
            self.finalize_audit(bom_id).await?;
            tracing::info!(bom_id = %bom_id, "customer.bom.enrichment_completed");
        } else {
            tracing::info!(bom_id = %bom_id, "workflow cancelled, audit objects preserved without finalization");
        }

        Ok(())
    }

    async fn record_progress(&self, workflow_id: &str, bom_id: Uuid, organization_id: Uuid, handle: &WorkflowHandle) -> Result<(), CoreError> {
        let state = handle.state().await;
        let progress = handle.progress().await;
        self.events.append(workflow_id, bom_id, organization_id, state, progress, Utc::now()).await?;
        tracing::info!(
            bom_id = %bom_id,
            percent_complete = progress.percent_complete(),
            enriched = progress.enriched,
            failed = progress.failed,
            total = progress.total,
            "customer.bom.enrichment_progress"
        );
        Ok(())
    }

    async fn finalize_audit(&self, bom_id: Uuid) -> Result<(), CoreError> {
        let label = Utc::now().format("%Y%m%d").to_string();
        for kind in AuditObjectKind::all() {
            let header = header_for(kind);
            self.finalizer.finalize_kind(bom_id, kind, header, &label).await?;
        }
        tracing::info!(bom_id = %bom_id, "customer.bom.audit_ready");
        Ok(())
    }
}

fn header_for(kind: AuditObjectKind) -> &'static [&'static str] {
    match kind {
        AuditObjectKind::VendorResponses => &["supplier", "attempts"],
        AuditObjectKind::NormalizedData => {
            &["supplier", "category", "description", "unit_price", "currency", "availability", "lifecycle_status", "datasheet_url"]
        }
        AuditObjectKind::ComparisonSummary => {
            &["mpn", "manufacturer", "supplier", "quality_score", "enrichment_source", "match_confidence", "compliance_status", "outcome"]
        }
    }
}
