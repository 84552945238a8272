//! Supplier adapter contract and result shape.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use bomenrich_core::CoreError;

/// `{ supplier, raw_payload, category?, ... }`. The adapter never mutates
/// this after returning it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierResult {
    pub supplier: String,
    pub raw_payload: Value,
    pub category: Option<String>,
    pub description: Option<String>,
    pub unit_price: Option<f64>,
    pub currency: Option<String>,
    pub availability: Option<i64>,
    pub lifecycle_status: Option<String>,
    pub datasheet_url: Option<String>,
    pub parameters: Value,
    pub price_breaks: Value,
    pub match_confidence: f64,
    pub rohs_compliant: Option<bool>,
    pub reach_compliant: Option<bool>,
}

#[async_trait]
pub trait SupplierAdapter: Send + Sync {
    fn supplier_name(&self) -> &str;

    /// Per-minute call quota this adapter should be rate-limited to.
    fn rate_limit_per_minute(&self) -> u32;

    async fn search(&self, mpn: &str, manufacturer: Option<&str>) -> Result<SupplierResult, CoreError>;
}
