//! Mouser adapter. Mouser's search API returns a single best match per MPN
//! with a part-number exactness score this adapter maps onto `match_confidence`.

use async_trait::async_trait;
use serde_json::json;

use bomenrich_core::CoreError;

use crate::adapter::{SupplierAdapter, SupplierResult};

pub struct MouserAdapter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl MouserAdapter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.mouser.com/api/v1/search".to_string(),
        }
    }
}

#[async_trait]
impl SupplierAdapter for MouserAdapter {
    fn supplier_name(&self) -> &str {
        "mouser"
    }

    fn rate_limit_per_minute(&self) -> u32 {
        30
    }

    async fn search(&self, mpn: &str, manufacturer: Option<&str>) -> Result<SupplierResult, CoreError> {
        let response = self
            .client
            .post(format!("{}/partnumber?apiKey={}", self.base_url, self.api_key))
            .json(&json!({ "SearchByPartRequest": { "mouserPartNumber": mpn, "partSearchOptions": "Exact" } }))
            .send()
            .await
            .map_err(|e| CoreError::Transient(format!("mouser request: {e}")))?;

        if response.status().is_server_error() || response.status().as_u16() == 429 {
            return Err(CoreError::Transient(format!("mouser status {}", response.status())));
        }
        if !response.status().is_success() {
            return Err(CoreError::PermanentDownstream(format!("mouser status {}", response.status())));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CoreError::Transient(format!("mouser decode: {e}")))?;

        let part = payload
            .get("SearchResults")
            .and_then(|r| r.get("Parts"))
            .and_then(|p| p.as_array())
            .and_then(|arr| arr.first())
            .cloned()
            .ok_or(CoreError::NotFound)?;

        let exact_manufacturer_match = manufacturer
            .map(|m| {
                part.get("Manufacturer")
                    .and_then(|v| v.as_str())
                    .map(|pm| pm.eq_ignore_ascii_case(m))
                    .unwrap_or(false)
            })
            .unwrap_or(true);

        let match_confidence = if exact_manufacturer_match { 0.95 } else { 0.6 };

        Ok(SupplierResult {
                supplier: self.supplier_name().to_string(),
                raw_payload: part.clone(),
                category: part.get("Category").and_then(|v| v.as_str()).map(String::from),
                description: part.get("Description").and_then(|v| v.as_str()).map(String::from),
                unit_price: part
                    .get("PriceBreaks")
                    .and_then(|v| v.as_array())
                    .and_then(|arr| arr.first())
                    .and_then(|pb| pb.get("Price"))
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.trim_start_matches('$').parse::<f64>().ok()),
                currency: Some("USD".to_string()),
                availability: part
                    .get("AvailabilityInStock")
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.parse::<i64>().ok()),
                lifecycle_status: part.get("LifecycleStatus").and_then(|v| v.as_str()).map(String::from),
                datasheet_url: part.get("DataSheetUrl").and_then(|v| v.as_str()).map(String::from),
                parameters: part.get("ProductAttributes").cloned().unwrap_or(json!({})),
                price_breaks: part.get("PriceBreaks").cloned().unwrap_or(json!([])),
                match_confidence,
                rohs_compliant: part.get("ROHSStatus").and_then(|v| v.as_str()).map(|s| s.contains("Compliant")),
                reach_compliant: None,
            })
    }
}
