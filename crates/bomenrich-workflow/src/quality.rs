//! Quality scoring: computes `quality_score` as a named, swappable plugin
//! (`QualityScorer`) so a tenant-specific or ML-backed scorer can be swapped
//! in without touching the workflow stages, but ships one default: a
//! field-completeness and supplier-confidence weighted score in `[0, 100]`.

use bomenrich_suppliers::SupplierResult;

pub trait QualityScorer: Send + Sync {
    fn score(&self, result: &SupplierResult) -> u8;
}

/// Weights sum to 100: presence of core identifying/commercial fields plus
/// the supplier's own match confidence, since a cheap-but-uncertain match
/// shouldn't outscore a thorough one.
pub struct DefaultQualityScorer;

impl QualityScorer for DefaultQualityScorer {
    fn score(&self, result: &SupplierResult) -> u8 {
        let mut score = 0.0f64;

        score += result.match_confidence.clamp(0.0, 1.0) * 40.0;
        if result.category.is_some() {
            score += 10.0;
        }
        if result.description.is_some() {
            score += 10.0;
        }
        if result.datasheet_url.is_some() {
            score += 10.0;
        }
        if result.unit_price.is_some() {
            score += 10.0;
        }
        let has_parameters = result.parameters.as_object().map(|o| !o.is_empty()).unwrap_or(false);
        if has_parameters {
            score += 10.0;
        }
        if result.rohs_compliant.is_some() || result.reach_compliant.is_some() {
            score += 10.0;
        }

        score.round().clamp(0.0, 100.0) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_result(match_confidence: f64) -> SupplierResult {
        SupplierResult {
            supplier: "mouser".to_string(),
            raw_payload: serde_json::json!({}),
            category: None,
            description: None,
            unit_price: None,
            currency: None,
            availability: None,
            lifecycle_status: None,
            datasheet_url: None,
            parameters: serde_json::json!({}),
            price_breaks: serde_json::json!([]),
            match_confidence,
            rohs_compliant: None,
            reach_compliant: None,
        }
    }

    #[test]
    fn bare_match_scores_only_on_confidence() {
        let scorer = DefaultQualityScorer;
        let result = bare_result(0.9);
        assert_eq!(scorer.score(&result), 36);
    }

    #[test]
    fn fully_populated_result_can_reach_the_catalog_threshold() {
        let scorer = DefaultQualityScorer;
        let mut result = bare_result(1.0);
        result.category = Some("Op-Amp".to_string());
        result.description = Some("Single Op-Amp".to_string());
        result.datasheet_url = Some("https://example.com/ds.pdf".to_string());
        result.unit_price = Some(0.42);
        result.parameters = serde_json::json!({"package": "SOIC-8"});
        result.rohs_compliant = Some(true);

        assert_eq!(scorer.score(&result), 100);
    }
}
