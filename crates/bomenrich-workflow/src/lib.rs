//! Durable per-BOM enrichment workflow engine: the state
//! machine that coordinates tenant locks, the supplier gateway, the
//! catalog/snapshot stores, and the audit sink behind the
//! `WorkflowDispatch` seam the event bus consumers dispatch onto.

pub mod activity;
pub mod engine;
pub mod events;
pub mod lines;
pub mod outer;
pub mod quality;
pub mod signals;
pub mod stages;
pub mod state;

pub use activity::{EnrichmentActivity, LineOutcome, DEFAULT_STALENESS_WINDOW};
pub use engine::WorkflowEngine;
pub use events::EnrichmentEventStore;
pub use lines::LineItemStore;
pub use outer::{NoopStageExecutor, OuterProcessingState, OuterStatus, OuterWorkflow, ProcessingStage, StageExecutor, StageRecord, StageStatus};
pub use quality::{DefaultQualityScorer, QualityScorer};
pub use signals::{ControlSignal, WorkflowHandle, WorkflowRegistry};
pub use stages::{bulk_prefilter, run_batches, PrefilterOutcome};
pub use state::{BomProgress, WorkflowState};
