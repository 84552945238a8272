//! Translates stream messages into workflow commands for the
//! BOM/admin/single-component consumers. This crate does not own the
//! workflow engine itself — `WorkflowDispatch` is the seam the engine's
//! consumer-facing API plugs into, the same separation `StreamTransport`
//! draws for the broker.

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use bomenrich_core::CoreError;
use bomenrich_locks::idempotency::IdempotencyStore;

use crate::dedup::DedupCache;
use crate::stream::{RoutingKeyFilter, StreamMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowSignal {
    Pause,
    Resume,
    Cancel,
}

#[derive(Debug, Clone)]
pub struct StartWorkflowCommand {
    pub workflow_id: String,
    pub bom_id: Uuid,
    pub organization_id: Uuid,
    pub source: String,
    pub uploaded_by: Uuid,
}

/// The engine-facing API a consumer dispatches onto. Implemented by the
/// workflow engine's entry point; kept as a trait here so this crate has no
/// dependency on the engine crate.
#[async_trait]
pub trait WorkflowDispatch: Send + Sync {
    async fn start_workflow(&self, cmd: StartWorkflowCommand) -> Result<(), CoreError>;
    async fn signal_workflow(&self, workflow_id: &str, signal: WorkflowSignal) -> Result<(), CoreError>;
}

pub fn bom_workflow_id(bom_id: Uuid) -> String {
    format!("bom-enrichment-{bom_id}")
}

/// `mpn` should already be normalized (see `ComponentKey::normalized`).
/// `epoch` disambiguates re-submissions of the same part for ad hoc lookups.
pub fn single_component_workflow_id(mpn: &str, epoch: i64) -> String {
    format!("single-component-{mpn}-{epoch}")
}

/// Consumes `stream.platform.bom`, translating `bom.parsed` events into
/// `StartWorkflow` commands. Enforces I2 (at most one active workflow per
/// BOM id) via a durable idempotency reservation keyed on the deterministic
/// workflow id — a second `bom.parsed` for the same BOM (a legitimate
/// at-least-once redelivery, not a new upload) is dropped, not retried.
pub struct BomConsumer<'a> {
    dedup: DedupCache,
    reservations: &'a dyn IdempotencyStore,
    filter: RoutingKeyFilter,
}

impl<'a> BomConsumer<'a> {
    pub fn new(reservations: &'a dyn IdempotencyStore) -> Self {
        Self {
            dedup: DedupCache::default_sized(),
            reservations,
            filter: RoutingKeyFilter::new(["bom.parsed", "customer.bom.*"]),
        }
    }

    pub async fn handle(&self, msg: &StreamMessage, dispatch: &dyn WorkflowDispatch) -> Result<(), CoreError> {
        if !self.filter.matches(&msg.routing_key) {
            return Ok(());
        }
        if self.dedup.is_duplicate(&msg.dedup_id()) {
            tracing::debug!(dedup_id = %msg.dedup_id(), "dropping at-least-once redelivery");
            return Ok(());
        }

        let bom_id: Uuid = msg
            .payload
            .get("bom_id")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| CoreError::Validation("bom.parsed event missing bom_id".into()))?;
        let organization_id: Uuid = msg
            .payload
            .get("organization_id")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| CoreError::Validation("bom.parsed event missing organization_id".into()))?;
        let uploaded_by: Uuid = msg
            .payload
            .get("uploaded_by")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| CoreError::Validation("bom.parsed event missing uploaded_by".into()))?;
        let source = msg.payload.get("source").and_then(|v| v.as_str()).unwrap_or("unknown").to_string();

        let workflow_id = bom_workflow_id(bom_id);
        let reservation_key = format!("workflow-start:{workflow_id}");
        let reserved = self
            .reservations
            .register_raw(&reservation_key, b"1", std::time::Duration::from_secs(86_400))
            .await?;

        if !reserved {
            tracing::info!(workflow_id, "workflow already started for this BOM, rejecting duplicate start");
            return Ok(());
        }

        dispatch
            .start_workflow(StartWorkflowCommand { workflow_id, bom_id, organization_id, source, uploaded_by })
            .await
    }
}

/// Consumes `stream.platform.admin`, relaying pause/resume/cancel signals to
/// the workflow identified by the event's `workflow_id` (or, for BOM-scoped
/// signals, derived from `bom_id` via [`bom_workflow_id`]).
pub struct AdminConsumer {
    dedup: DedupCache,
    filter: RoutingKeyFilter,
}

impl Default for AdminConsumer {
    fn default() -> Self {
        Self { dedup: DedupCache::default_sized(), filter: RoutingKeyFilter::new(["admin.workflow.*"]) }
    }
}

impl AdminConsumer {
    pub async fn handle(&self, msg: &StreamMessage, dispatch: &dyn WorkflowDispatch) -> Result<(), CoreError> {
        if !self.filter.matches(&msg.routing_key) {
            return Ok(());
        }
        if self.dedup.is_duplicate(&msg.dedup_id()) {
            return Ok(());
        }

        let signal = match msg.routing_key.as_str() {
            "admin.workflow.pause" => WorkflowSignal::Pause,
            "admin.workflow.resume" => WorkflowSignal::Resume,
            "admin.workflow.cancel" => WorkflowSignal::Cancel,
            other => return Err(CoreError::Validation(format!("unrecognized admin signal routing key: {other}"))),
        };

        let workflow_id = if let Some(id) = msg.payload.get("workflow_id").and_then(|v| v.as_str()) {
            id.to_string()
        } else {
            let bom_id: Uuid = msg
                .payload
                .get("bom_id")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| CoreError::Validation("admin signal missing workflow_id and bom_id".into()))?;
            bom_workflow_id(bom_id)
        };

        dispatch.signal_workflow(&workflow_id, signal).await
    }
}

/// Consumes `stream.platform.enrichment` single-component lookup requests,
/// each spawning its own short-lived workflow rather than attaching to a
/// BOM's run.
pub struct SingleComponentConsumer {
    dedup: DedupCache,
    filter: RoutingKeyFilter,
}

impl Default for SingleComponentConsumer {
    fn default() -> Self {
        Self { dedup: DedupCache::default_sized(), filter: RoutingKeyFilter::new(["component.lookup.requested"]) }
    }
}

impl SingleComponentConsumer {
    pub async fn handle(&self, msg: &StreamMessage, dispatch: &dyn WorkflowDispatch) -> Result<(), CoreError> {
        if !self.filter.matches(&msg.routing_key) {
            return Ok(());
        }
        if self.dedup.is_duplicate(&msg.dedup_id()) {
            return Ok(());
        }

        let mpn = msg
            .payload
            .get("mpn")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CoreError::Validation("component.lookup.requested missing mpn".into()))?;
        let organization_id: Uuid = msg
            .payload
            .get("organization_id")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| CoreError::Validation("component.lookup.requested missing organization_id".into()))?;
        let uploaded_by: Uuid = msg
            .payload
            .get("requested_by")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .unwrap_or(organization_id);

        let workflow_id = single_component_workflow_id(&mpn.to_uppercase(), Utc::now().timestamp());
        dispatch
            .start_workflow(StartWorkflowCommand {
                workflow_id,
                bom_id: organization_id,
                organization_id,
                source: "single-component-lookup".to_string(),
                uploaded_by,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bomenrich_locks::idempotency::InMemoryIdempotencyStore;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDispatch {
        started: Mutex<Vec<StartWorkflowCommand>>,
        signaled: Mutex<Vec<(String, WorkflowSignal)>>,
    }

    #[async_trait]
    impl WorkflowDispatch for RecordingDispatch {
        async fn start_workflow(&self, cmd: StartWorkflowCommand) -> Result<(), CoreError> {
            self.started.lock().unwrap().push(cmd);
            Ok(())
        }
        async fn signal_workflow(&self, workflow_id: &str, signal: WorkflowSignal) -> Result<(), CoreError> {
            self.signaled.lock().unwrap().push((workflow_id.to_string(), signal));
            Ok(())
        }
    }

    fn bom_msg(offset: u64, bom_id: Uuid, org: Uuid, user: Uuid) -> StreamMessage {
        StreamMessage {
            offset,
            routing_key: "bom.parsed".to_string(),
            payload: serde_json::json!({
                    "event_id": format!("evt-{offset}"),
                    "bom_id": bom_id.to_string(),
                    "organization_id": org.to_string(),
                    "uploaded_by": user.to_string(),
                    "source": "customer_upload",
                }),
            priority: 5,
            headers: Default::default(),
        }
    }

    #[tokio::test]
    async fn duplicate_bom_parsed_starts_workflow_only_once() {
        let store = InMemoryIdempotencyStore::new();
        let consumer = BomConsumer::new(&store);
        let dispatch = RecordingDispatch::default();

        let bom_id = Uuid::new_v4();
        let org = Uuid::new_v4();
        let user = Uuid::new_v4();

        // Same bom_id, different stream offsets and event_ids — simulates a
        // redelivery that the in-memory dedup cache alone wouldn't catch
        // across process restarts, hence the durable reservation.
        let first = StreamMessage { payload: serde_json::json!({"bom_id": bom_id.to_string(), "organization_id": org.to_string(), "uploaded_by": user.to_string(), "source": "x", "event_id": "a"}), ..bom_msg(1, bom_id, org, user) };
        let second = StreamMessage { payload: serde_json::json!({"bom_id": bom_id.to_string(), "organization_id": org.to_string(), "uploaded_by": user.to_string(), "source": "x", "event_id": "b"}), ..bom_msg(2, bom_id, org, user) };

        consumer.handle(&first, &dispatch).await.unwrap();
        consumer.handle(&second, &dispatch).await.unwrap();

        assert_eq!(dispatch.started.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn admin_signal_resolves_workflow_id_from_bom_id() {
        let consumer = AdminConsumer::default();
        let dispatch = RecordingDispatch::default();
        let bom_id = Uuid::new_v4();

        let msg = StreamMessage {
            offset: 1,
            routing_key: "admin.workflow.pause".to_string(),
            payload: serde_json::json!({"bom_id": bom_id.to_string(), "event_id": "evt-1"}),
            priority: 9,
            headers: Default::default(),
        };

        consumer.handle(&msg, &dispatch).await.unwrap();

        let signaled = dispatch.signaled.lock().unwrap();
        assert_eq!(signaled[0], (bom_workflow_id(bom_id), WorkflowSignal::Pause));
    }

    #[test]
    fn single_component_workflow_id_is_deterministic_per_epoch() {
        assert_eq!(single_component_workflow_id("ABC123", 1000), "single-component-ABC123-1000");
    }
}
