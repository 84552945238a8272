//! bomenrich-core: shared domain types, error taxonomy, configuration, and
//! tracing setup used by every crate in the BOM enrichment workspace.

pub mod config;
pub mod domain;
pub mod error;
pub mod telemetry;

pub use config::{ConfigStore, OrchestratorConfig};
pub use domain::{
    AuditObjectKind, Bom, BomLineItem, BomSource, BomStatus, CatalogComponent, ComplianceStatus,
    ComponentKey, EnrichmentEvent, LifecycleStatus, LineEnrichmentStatus, ObjectPaths, RedisSnapshot,
    SnapshotSyncStatus, Tenant, TenantLimits, TenantPlan, TenantStatus,
};
pub use error::{CoreError, ErrorKind, Result};
pub use telemetry::init_tracing;
