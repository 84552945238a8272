//! Element14 (Farnell/Newark family) adapter. Lowest declared priority of
//! the three (lists Mouser/DigiKey/Element14 in that order), used
//! as the fallback when neither of the higher-priority suppliers clears the
//! confidence threshold.

use async_trait::async_trait;
use serde_json::json;

use bomenrich_core::CoreError;

use crate::adapter::{SupplierAdapter, SupplierResult};

pub struct Element14Adapter {
    client: reqwest::Client,
    api_key: String,
    store: String,
}

impl Element14Adapter {
    pub fn new(api_key: impl Into<String>, store: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), api_key: api_key.into(), store: store.into() }
    }
}

#[async_trait]
impl SupplierAdapter for Element14Adapter {
    fn supplier_name(&self) -> &str {
        "element14"
    }

    fn rate_limit_per_minute(&self) -> u32 {
        20
    }

    async fn search(&self, mpn: &str, _manufacturer: Option<&str>) -> Result<SupplierResult, CoreError> {
        let response = self
            .client
            .get(format!("https://api.element14.com/catalog/products/{}", self.store))
            .query(&[
                ("term", format!("manuPartNum:{mpn}")),
                ("storeInfo.id", self.store.clone()),
                ("callInfo.apiKey", self.api_key.clone()),
                ("callInfo.responseDataFormat", "JSON".to_string()),
                ("resultsSettings.numberOfResults", "1".to_string()),
            ])
            .send()
            .await
            .map_err(|e| CoreError::Transient(format!("element14 request: {e}")))?;

        if response.status().is_server_error() || response.status().as_u16() == 429 {
            return Err(CoreError::Transient(format!("element14 status {}", response.status())));
        }
        if !response.status().is_success() {
            return Err(CoreError::PermanentDownstream(format!("element14 status {}", response.status())));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CoreError::Transient(format!("element14 decode: {e}")))?;

        let product = payload
            .get("manufacturerPartNumberSearchReturn")
            .and_then(|v| v.get("products"))
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .cloned()
            .ok_or(CoreError::NotFound)?;

        Ok(SupplierResult {
                supplier: self.supplier_name().to_string(),
                raw_payload: product.clone(),
                category: product
                    .get("displayName")
                    .and_then(|v| v.as_str())
                    .map(String::from),
                description: product.get("translatedManufacturerPartNumber").and_then(|v| v.as_str()).map(String::from),
                unit_price: product
                    .get("prices")
                    .and_then(|v| v.as_array())
                    .and_then(|arr| arr.first())
                    .and_then(|p| p.get("cost"))
                    .and_then(|v| v.as_f64()),
                currency: Some("USD".to_string()),
                availability: product.get("stock").and_then(|v| v.get("level")).and_then(|v| v.as_i64()),
                lifecycle_status: None,
                datasheet_url: product
                    .get("datasheets")
                    .and_then(|v| v.as_array())
                    .and_then(|arr| arr.first())
                    .and_then(|d| d.get("url"))
                    .and_then(|v| v.as_str())
                    .map(String::from),
                parameters: product.get("attributes").cloned().unwrap_or(json!({})),
                price_breaks: product.get("prices").cloned().unwrap_or(json!([])),
                // Element14's keyword search has no native relevance score; a
                // returned product for an exact-MPN query is treated as a solid
                // match but slightly discounted relative to the two APIs above
                // that report real confidence scores.
                match_confidence: 0.8,
                rohs_compliant: None,
                reach_compliant: None,
            })
    }
}
