//! Promotion protocol: routes a line's computed `quality_score`
//! to the catalog, Redis staging, or Redis rejection based on two
//! thresholds.

use bomenrich_core::OrchestratorConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionRoute {
    Production,
    Staging,
    Rejected,
}

/// Classifies `quality_score` into a promotion route. `catalog_threshold` is
/// `OrchestratorConfig::quality_threshold`; `promote_threshold` is as named.
pub fn classify(quality_score: u8, cfg: &OrchestratorConfig) -> PromotionRoute {
    if quality_score >= cfg.quality_threshold {
        PromotionRoute::Production
    } else if quality_score >= cfg.promote_threshold {
        PromotionRoute::Staging
    } else {
        PromotionRoute::Rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> OrchestratorConfig {
        OrchestratorConfig {
            enrichment_batch_size: 10,
            enrichment_delay_per_component_ms: 0,
            enrichment_delay_per_batch_ms: 0,
            enrichment_delays_enabled: false,
            quality_threshold: 80,
            promote_threshold: 70,
            supplier_confidence_threshold: 0.75,
            circuit_failure_threshold: 5,
            circuit_success_threshold: 2,
            circuit_timeout_seconds: 60,
            retry_max_attempts: 3,
            redis_snapshot_ttl_seconds: 604_800,
            redis_sync_interval_seconds: 15,
            redis_sync_lock_ttl_seconds: 300,
            enable_enrichment_audit: true,
        }
    }

    #[test]
    fn boundary_values_match_threshold_table() {
        let c = cfg();
        assert_eq!(classify(80, &c), PromotionRoute::Production);
        assert_eq!(classify(79, &c), PromotionRoute::Staging);
        assert_eq!(classify(70, &c), PromotionRoute::Staging);
        assert_eq!(classify(69, &c), PromotionRoute::Rejected);
        assert_eq!(classify(0, &c), PromotionRoute::Rejected);
        assert_eq!(classify(100, &c), PromotionRoute::Production);
    }
}
