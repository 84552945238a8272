//! Line-item persistence the workflow reads/writes directly (as opposed to
//! catalog rows, which only `bomenrich-catalog` touches). Kept minimal: the
//! workflow only needs to list a BOM's lines and persist each one's final
//! enrichment status.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use bomenrich_core::{BomLineItem, ComplianceStatus, CoreError, LifecycleStatus, LineEnrichmentStatus};

pub struct LineItemStore {
    pool: PgPool,
}

#[derive(FromRow)]
struct LineRow {
    id: Uuid,
    bom_id: Uuid,
    line_number: i32,
    mpn: String,
    manufacturer: Option<String>,
    quantity: Option<i32>,
    reference_designator: Option<String>,
    description: Option<String>,
    enrichment_status: String,
    component_id: Option<Uuid>,
    lifecycle_status: Option<String>,
    datasheet_url: Option<String>,
    specifications: serde_json::Value,
    pricing: serde_json::Value,
    compliance_status: Option<String>,
    enriched_at: Option<DateTime<Utc>>,
}

impl LineItemStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_by_bom(&self, bom_id: Uuid) -> Result<Vec<BomLineItem>, CoreError> {
        let rows: Vec<LineRow> = sqlx::query_as(
            "SELECT id, bom_id, line_number, mpn, manufacturer, quantity, reference_designator, \
            description, enrichment_status, component_id, lifecycle_status, datasheet_url, \
            specifications, pricing, compliance_status, enriched_at \
            FROM bom_line_items WHERE bom_id = $1 ORDER BY line_number",
        )
            .bind(bom_id)
            .fetch_all(&self.pool)
            .await
            .map_err(CoreError::Database)?;

        Ok(rows.into_iter().map(LineRow::into_domain).collect())
    }

    pub async fn mark_status(&self, line_id: Uuid, status: LineEnrichmentStatus, now: DateTime<Utc>) -> Result<(), CoreError> {
        sqlx::query("UPDATE bom_line_items SET enrichment_status = $2, enriched_at = $3 WHERE id = $1")
            .bind(line_id)
            .bind(status_to_str(status))
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(CoreError::Database)?;
        Ok(())
    }
}

impl LineRow {
    fn into_domain(self) -> BomLineItem {
        BomLineItem {
            id: self.id,
            bom_id: self.bom_id,
            line_number: self.line_number as u32,
            mpn: self.mpn,
            manufacturer: self.manufacturer,
            quantity: self.quantity.map(|q| q as u32),
            reference_designator: self.reference_designator,
            description: self.description,
            enrichment_status: str_to_line_status(&self.enrichment_status),
            component_id: self.component_id,
            lifecycle_status: self.lifecycle_status.as_deref().map(str_to_lifecycle),
            datasheet_url: self.datasheet_url,
            specifications: self.specifications,
            pricing: self.pricing,
            compliance_status: self.compliance_status.as_deref().map(str_to_compliance),
            enriched_at: self.enriched_at,
        }
    }
}

fn status_to_str(status: LineEnrichmentStatus) -> &'static str {
    match status {
        LineEnrichmentStatus::Pending => "pending",
        LineEnrichmentStatus::Enriched => "enriched",
        LineEnrichmentStatus::Failed => "failed",
        LineEnrichmentStatus::Skipped => "skipped",
    }
}

fn str_to_line_status(s: &str) -> LineEnrichmentStatus {
    match s {
        "enriched" => LineEnrichmentStatus::Enriched,
        "failed" => LineEnrichmentStatus::Failed,
        "skipped" => LineEnrichmentStatus::Skipped,
        _ => LineEnrichmentStatus::Pending,
    }
}

fn str_to_lifecycle(s: &str) -> LifecycleStatus {
    match s {
        "active" => LifecycleStatus::Active,
        "nrnd" => LifecycleStatus::Nrnd,
        "obsolete" => LifecycleStatus::Obsolete,
        _ => LifecycleStatus::Unknown,
    }
}

fn str_to_compliance(s: &str) -> ComplianceStatus {
    match s {
        "compliant" => ComplianceStatus::Compliant,
        "non_compliant" => ComplianceStatus::NonCompliant,
        _ => ComplianceStatus::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_status_round_trips() {
        for status in [
            LineEnrichmentStatus::Pending,
            LineEnrichmentStatus::Enriched,
            LineEnrichmentStatus::Failed,
            LineEnrichmentStatus::Skipped,
        ] {
            assert_eq!(str_to_line_status(status_to_str(status)), status);
        }
    }
}
