//! Event Bus Consumers: offset-tracked, deduplicated stream
//! consumers that translate platform events into workflow commands.

pub mod dedup;
pub mod dispatch;
pub mod reconnect;
pub mod stream;

pub use dedup::DedupCache;
pub use dispatch::{
    bom_workflow_id, single_component_workflow_id, AdminConsumer, BomConsumer, SingleComponentConsumer,
    StartWorkflowCommand, WorkflowDispatch, WorkflowSignal,
};
pub use reconnect::{run_with_retry, ReconnectBackoff};
pub use stream::{RoutingKeyFilter, StreamMessage, StreamName, StreamTransport};
