//! Per-line activity: the unit of non-deterministic
//! work the stage loop delegates out of the workflow body. Acquires the
//! per-component lock, calls the supplier gateway, scores and routes the
//! result, writes audit objects, and updates the line item — all inside one
//! bounded critical section held under the catalog upsert lock.

use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use uuid::Uuid;

use bomenrich_audit::AuditSink;
use bomenrich_catalog::snapshot::RedisSnapshotStore;
use bomenrich_catalog::{classify, CatalogStore, PromotionRoute};
use bomenrich_core::{
    BomLineItem, CatalogComponent, ComplianceStatus, CoreError, LifecycleStatus, LineEnrichmentStatus,
    OrchestratorConfig, RedisSnapshot, SnapshotSyncStatus,
};
use bomenrich_locks::{keys, LockStore};
use bomenrich_suppliers::{NoSupplierMatch, SupplierGateway, SupplierResult};

use crate::lines::LineItemStore;
use crate::quality::QualityScorer;

/// Staleness window for catalog overwrite eligibility. The spec
/// names the invariant ("older than `staleness_window`") without fixing a
/// value; 90 days matches the supplier re-verification cadence implied by
/// `last_verified_at` elsewhere in the data model.
pub const DEFAULT_STALENESS_WINDOW: ChronoDuration = ChronoDuration::days(90);

const LOCK_TTL: Duration = Duration::from_secs(30);
const LOCK_WAIT_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    Enriched,
    Failed,
    /// The `enrichment:{mpn}` lock was held elsewhere past the wait timeout;
    /// the batch loop re-queues this line at the end of the current batch
    /// rather than counting it as failed.
    Deferred,
}

pub struct EnrichmentActivity<'a> {
    pub locks: &'a dyn LockStore,
    pub gateway: &'a SupplierGateway,
    pub catalog: &'a CatalogStore,
    pub snapshot: &'a RedisSnapshotStore,
    pub audit: &'a AuditSink,
    pub scorer: &'a dyn QualityScorer,
    pub config: &'a OrchestratorConfig,
    pub line_store: &'a LineItemStore,
}

impl<'a> EnrichmentActivity<'a> {
    pub async fn run(&self, bom_id: Uuid, line: &BomLineItem) -> Result<LineOutcome, CoreError> {
        let key = keys::enrichment(&line.component_key().normalized());
        let handle = match self.locks.acquire(&key, LOCK_TTL, LOCK_WAIT_TIMEOUT).await? {
            Some(h) => h,
            None => return Ok(LineOutcome::Deferred),
        };

        let outcome = self.enrich_locked(bom_id, line).await;
        let _ = self.locks.release(&key, handle.owner_id).await;

        if let Ok(result) = &outcome {
            let status = match result {
                LineOutcome::Enriched => Some(LineEnrichmentStatus::Enriched),
                LineOutcome::Failed => Some(LineEnrichmentStatus::Failed),
                LineOutcome::Deferred => None,
            };
            if let Some(status) = status {
                if let Err(err) = self.line_store.mark_status(line.id, status, Utc::now()).await {
                    tracing::warn!(bom_id = %bom_id, line_id = %line.id, error = %err, "failed to persist line status");
                }
            }
        }

        outcome
    }

    async fn enrich_locked(&self, bom_id: Uuid, line: &BomLineItem) -> Result<LineOutcome, CoreError> {
        let search = self.gateway.search(&line.mpn, line.manufacturer.as_deref()).await;

        let result = match search {
            Ok(r) => r,
            Err(no_match) => {
                self.write_failure_audit(bom_id, line, &no_match).await;
                tracing::info!(bom_id = %bom_id, line_id = %line.id, "enrichment.component.failed");
                return Ok(LineOutcome::Failed);
            }
        };

        let quality_score = self.scorer.score(&result);
        let route = classify(quality_score, self.config);
        let now = Utc::now();

        match route {
            PromotionRoute::Production => {
                let candidate = to_catalog_candidate(&result, line, quality_score, now);
                self.catalog.upsert_and_link(&candidate, DEFAULT_STALENESS_WINDOW, now, line.id).await?;
                self.write_success_audit(bom_id, line, &result, quality_score, "catalog").await;
            }
            PromotionRoute::Staging | PromotionRoute::Rejected => {
                let reason = match route {
                    PromotionRoute::Rejected => {
                        Some(format!("quality score {quality_score} below promote threshold"))
                    }
                    _ => None,
                };
                let snapshot = RedisSnapshot {
                    redis_key: format!("component:{}:data", line.component_key().normalized()),
                    line_id: line.id,
                    mpn: line.mpn.clone(),
                    manufacturer: line.manufacturer.clone().unwrap_or_default(),
                    quality_score,
                    component_data: result.raw_payload.clone(),
                    expires_at: now + ChronoDuration::seconds(self.config.redis_snapshot_ttl_seconds as i64),
                    sync_status: SnapshotSyncStatus::Active,
                    reason,
                };
                self.snapshot.write(&snapshot, Duration::from_secs(self.config.redis_snapshot_ttl_seconds)).await?;
                self.write_success_audit(bom_id, line, &result, quality_score, "redis_staging").await;
            }
        }

        tracing::info!(bom_id = %bom_id, line_id = %line.id, quality_score, ?route, "enrichment.component.enriched");
        Ok(LineOutcome::Enriched)
    }

    /// Bulk-prefilter fast path: the line already has a
    /// high-quality catalog match, so it skips the supplier gateway
    /// entirely. Still produces the three audit objects so P7 (audit
    /// completeness) holds for catalog-sourced lines, not only
    /// freshly-enriched ones.
    pub async fn record_catalog_hit(&self, bom_id: Uuid, line: &BomLineItem, component: &CatalogComponent) -> Result<(), CoreError> {
        self.catalog.link_line_item(line.id, component.id).await?;
        if let Err(err) = self.line_store.mark_status(line.id, LineEnrichmentStatus::Enriched, Utc::now()).await {
            tracing::warn!(bom_id = %bom_id, line_id = %line.id, error = %err, "failed to persist line status");
        }

        let vendor_responses = json!({"source": "catalog", "component_id": component.id});
        let normalized = json!({
                "category": component.category,
                "lifecycle_status": component.lifecycle_status,
                "datasheet_url": component.datasheet_url,
                "parameters": component.parameters,
            });
        let comparison = json!({
                "mpn": line.mpn,
                "manufacturer": line.manufacturer,
                "quality_score": component.quality_score,
                "enrichment_source": "catalog",
                "outcome": "enriched",
            });

        let degraded = self.audit.write_line_audit(bom_id, line.id, &vendor_responses, &normalized, &comparison).await;
        for (kind, err) in degraded {
            tracing::warn!(bom_id = %bom_id, line_id = %line.id, ?kind, error = %err, "audit write degraded");
        }
        tracing::info!(bom_id = %bom_id, line_id = %line.id, "enrichment.component.enriched (catalog prefilter)");
        Ok(())
    }

    async fn write_success_audit(&self, bom_id: Uuid, line: &BomLineItem, result: &SupplierResult, quality_score: u8, enrichment_source: &str) {
        let degraded = self
            .audit
            .write_line_audit(
            bom_id,
            line.id,
            &result.raw_payload,
            &normalized_data_json(result),
            &comparison_summary_json(line, result, quality_score, enrichment_source),
        )
            .await;
        for (kind, err) in degraded {
            tracing::warn!(bom_id = %bom_id, line_id = %line.id, ?kind, error = %err, "audit write degraded");
        }
    }

    async fn write_failure_audit(&self, bom_id: Uuid, line: &BomLineItem, no_match: &NoSupplierMatch) {
        let vendor_responses = json!({"attempts": no_match.attempts});
        let normalized = json!({"status": "failed"});
        let comparison = json!({
                "mpn": line.mpn,
                "manufacturer": line.manufacturer,
                "quality_score": 0,
                "enrichment_source": "none",
                "outcome": "failed",
            });
        let degraded = self.audit.write_line_audit(bom_id, line.id, &vendor_responses, &normalized, &comparison).await;
        for (kind, err) in degraded {
            tracing::warn!(bom_id = %bom_id, line_id = %line.id, ?kind, error = %err, "audit write degraded");
        }
    }
}

fn to_catalog_candidate(result: &SupplierResult, line: &BomLineItem, quality_score: u8, now: chrono::DateTime<Utc>) -> CatalogComponent {
    CatalogComponent {
        id: Uuid::new_v4(),
        mpn: line.mpn.clone(),
        manufacturer: line.manufacturer.clone().unwrap_or_default(),
        category: result.category.clone(),
        quality_score,
        lifecycle_status: parse_lifecycle(result.lifecycle_status.as_deref()),
        datasheet_url: result.datasheet_url.clone(),
        image_url: None,
        parameters: result.parameters.clone(),
        rohs_compliant: result.rohs_compliant,
        reach_compliant: result.reach_compliant,
        last_verified_at: now,
    }
}

fn parse_lifecycle(raw: Option<&str>) -> LifecycleStatus {
    match raw.map(|s| s.to_lowercase()) {
        Some(s) if s == "active" => LifecycleStatus::Active,
        Some(s) if s == "nrnd" => LifecycleStatus::Nrnd,
        Some(s) if s == "obsolete" => LifecycleStatus::Obsolete,
        _ => LifecycleStatus::Unknown,
    }
}

fn normalized_data_json(result: &SupplierResult) -> serde_json::Value {
    json!({
            "supplier": result.supplier,
            "category": result.category,
            "description": result.description,
            "unit_price": result.unit_price,
            "currency": result.currency,
            "availability": result.availability,
            "lifecycle_status": result.lifecycle_status,
            "datasheet_url": result.datasheet_url,
            "parameters": result.parameters,
        })
}

fn comparison_summary_json(line: &BomLineItem, result: &SupplierResult, quality_score: u8, enrichment_source: &str) -> serde_json::Value {
    let compliance = match (result.rohs_compliant, result.reach_compliant) {
        (Some(true), Some(true)) => ComplianceStatus::Compliant,
        (Some(false), _) | (_, Some(false)) => ComplianceStatus::NonCompliant,
        _ => ComplianceStatus::Unknown,
    };
    json!({
            "mpn": line.mpn,
            "manufacturer": line.manufacturer,
            "supplier": result.supplier,
            "quality_score": quality_score,
            "enrichment_source": enrichment_source,
            "match_confidence": result.match_confidence,
            "compliance_status": compliance,
            "outcome": "enriched",
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staleness_window_is_positive() {
        assert!(DEFAULT_STALENESS_WINDOW > ChronoDuration::zero());
    }

    #[test]
    fn parses_known_lifecycle_strings_case_insensitively() {
        assert_eq!(parse_lifecycle(Some("ACTIVE")), LifecycleStatus::Active);
        assert_eq!(parse_lifecycle(Some("nrnd")), LifecycleStatus::Nrnd);
        assert_eq!(parse_lifecycle(Some("made up")), LifecycleStatus::Unknown);
        assert_eq!(parse_lifecycle(None), LifecycleStatus::Unknown);
    }
}
