//! Domain types from the data model.
//!
//! These are plain data; invariants (I1-I6) are enforced by the crates that
//! mutate them (`bomenrich-workflow`, `bomenrich-catalog`), not here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantPlan {
    Free,
    Standard,
    Enterprise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    Active,
    Suspended,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantLimits {
    pub max_boms_per_day: u32,
    pub max_line_items_per_bom: u32,
}

/// Tenant — created externally; read-only from the core's point of view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub plan: TenantPlan,
    pub status: TenantStatus,
    pub limits: TenantLimits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BomSource {
    Customer,
    StaffBulk,
    Snapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BomStatus {
    Parsed,
    Enriching,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl BomStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BomStatus::Completed | BomStatus::Failed | BomStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bom {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub project_id: Option<Uuid>,
    pub name: String,
    pub source: BomSource,
    pub status: BomStatus,
    pub total_items: u32,
    pub created_at: DateTime<Utc>,
    pub uploaded_by: String,
    pub metadata: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineEnrichmentStatus {
    Pending,
    Enriched,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    Active,
    Nrnd,
    Obsolete,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Compliant,
    NonCompliant,
    Unknown,
}

/// `(mpn, manufacturer)` is the join key into the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentKey {
    pub mpn: String,
    pub manufacturer: Option<String>,
}

impl ComponentKey {
    pub fn new(mpn: impl Into<String>, manufacturer: Option<String>) -> Self {
        Self { mpn: mpn.into(), manufacturer }
    }

    /// Normalized cache/lock key fragment: uppercased MPN, manufacturer folded to "" when absent.
    pub fn normalized(&self) -> String {
        format!(
            "{}|{}",
            self.mpn.trim().to_uppercase(),
            self.manufacturer.as_deref().unwrap_or("").trim().to_uppercase()
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BomLineItem {
    pub id: Uuid,
    pub bom_id: Uuid,
    pub line_number: u32,
    pub mpn: String,
    pub manufacturer: Option<String>,
    pub quantity: Option<u32>,
    pub reference_designator: Option<String>,
    pub description: Option<String>,
    pub enrichment_status: LineEnrichmentStatus,
    pub component_id: Option<Uuid>,
    pub lifecycle_status: Option<LifecycleStatus>,
    pub datasheet_url: Option<String>,
    pub specifications: Value,
    pub pricing: Value,
    pub compliance_status: Option<ComplianceStatus>,
    pub enriched_at: Option<DateTime<Utc>>,
}

impl BomLineItem {
    pub fn component_key(&self) -> ComponentKey {
        ComponentKey::new(self.mpn.clone(), self.manufacturer.clone())
    }
}

/// Tenant-agnostic, durable catalog entry. Created/updated only by the promotion protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogComponent {
    pub id: Uuid,
    pub mpn: String,
    pub manufacturer: String,
    pub category: Option<String>,
    pub quality_score: u8,
    pub lifecycle_status: LifecycleStatus,
    pub datasheet_url: Option<String>,
    pub image_url: Option<String>,
    pub parameters: Value,
    pub rohs_compliant: Option<bool>,
    pub reach_compliant: Option<bool>,
    pub last_verified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotSyncStatus {
    Active,
    Expired,
    Promoted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSnapshot {
    pub redis_key: String,
    pub line_id: Uuid,
    pub mpn: String,
    pub manufacturer: String,
    pub quality_score: u8,
    pub component_data: Value,
    pub expires_at: DateTime<Utc>,
    pub sync_status: SnapshotSyncStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentEvent {
    pub id: Uuid,
    pub bom_id: Uuid,
    pub organization_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub state: String,
    pub source: String,
    pub workflow_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditObjectKind {
    VendorResponses,
    NormalizedData,
    ComparisonSummary,
}

impl AuditObjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditObjectKind::VendorResponses => "vendor_responses",
            AuditObjectKind::NormalizedData => "normalized_data",
            AuditObjectKind::ComparisonSummary => "comparison_summary",
        }
    }

    pub fn all() -> [AuditObjectKind; 3] {
        [
            AuditObjectKind::VendorResponses,
            AuditObjectKind::NormalizedData,
            AuditObjectKind::ComparisonSummary,
        ]
    }
}

/// Object storage layout, centralized so every crate agrees on paths.
pub struct ObjectPaths;

impl ObjectPaths {
    pub fn audit_object(bom_id: Uuid, kind: AuditObjectKind, line_id: Uuid) -> String {
        format!("audit/{bom_id}/_objects/{}/{line_id}.json", kind.as_str())
    }

    pub fn audit_object_prefix(bom_id: Uuid, kind: AuditObjectKind) -> String {
        format!("audit/{bom_id}/_objects/{}/", kind.as_str())
    }

    pub fn finalized_csv(bom_id: Uuid, kind: AuditObjectKind, label: &str) -> String {
        format!("audit/{bom_id}/{}-{label}.csv", kind.as_str())
    }

    pub fn field_diff_csv(bom_id: Uuid, label: &str) -> String {
        format!("audit/{bom_id}/field_diff-{label}.csv")
    }

    pub fn original_csv(bom_id: Uuid, label: &str) -> String {
        format!("audit/{bom_id}/bom_original-{label}.csv")
    }

    pub fn parsed_snapshot(organization_id: Uuid, bom_id: Uuid) -> String {
        format!("parsed/{organization_id}/{bom_id}.json")
    }

    pub fn customer_upload(organization_id: Uuid, upload_id: Uuid, filename: &str) -> String {
        format!("customer-uploads/{organization_id}/{upload_id}/{filename}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_key_normalizes_case_and_whitespace() {
        let a = ComponentKey::new(" lm358n ", Some(" TI ".to_string()));
        let b = ComponentKey::new("LM358N", Some("ti".to_string()));
        assert_eq!(a.normalized(), b.normalized());
    }

    #[test]
    fn component_key_handles_missing_manufacturer() {
        let k = ComponentKey::new("NE555P", None);
        assert_eq!(k.normalized(), "NE555P|");
    }

    #[test]
    fn object_paths_match_spec_layout() {
        let bom_id = Uuid::nil();
        let line_id = Uuid::nil();
        assert_eq!(
            ObjectPaths::audit_object(bom_id, AuditObjectKind::VendorResponses, line_id),
            format!("audit/{bom_id}/_objects/vendor_responses/{line_id}.json")
        );
        assert_eq!(
            ObjectPaths::finalized_csv(bom_id, AuditObjectKind::ComparisonSummary, "2026-07-28"),
            format!("audit/{bom_id}/comparison_summary-2026-07-28.csv")
        );
    }
}
