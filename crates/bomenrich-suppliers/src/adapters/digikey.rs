//! DigiKey adapter. DigiKey's product-search response carries its own
//! relevance score which this adapter normalizes to `[0.0, 1.0]`.

use async_trait::async_trait;
use serde_json::json;

use bomenrich_core::CoreError;

use crate::adapter::{SupplierAdapter, SupplierResult};

pub struct DigiKeyAdapter {
    client: reqwest::Client,
    client_id: String,
    access_token: String,
}

impl DigiKeyAdapter {
    pub fn new(client_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), client_id: client_id.into(), access_token: access_token.into() }
    }
}

#[async_trait]
impl SupplierAdapter for DigiKeyAdapter {
    fn supplier_name(&self) -> &str {
        "digikey"
    }

    fn rate_limit_per_minute(&self) -> u32 {
        120
    }

    async fn search(&self, mpn: &str, manufacturer: Option<&str>) -> Result<SupplierResult, CoreError> {
        let response = self
            .client
            .post("https://api.digikey.com/products/v4/search/keyword")
            .bearer_auth(&self.access_token)
            .header("X-DIGIKEY-Client-Id", &self.client_id)
            .json(&json!({ "Keywords": mpn, "Limit": 1 }))
            .send()
            .await
            .map_err(|e| CoreError::Transient(format!("digikey request: {e}")))?;

        if response.status().is_server_error() || response.status().as_u16() == 429 {
            return Err(CoreError::Transient(format!("digikey status {}", response.status())));
        }
        if !response.status().is_success() {
            return Err(CoreError::PermanentDownstream(format!("digikey status {}", response.status())));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CoreError::Transient(format!("digikey decode: {e}")))?;

        let product = payload
            .get("Products")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .cloned()
            .ok_or(CoreError::NotFound)?;

        let manufacturer_matches = manufacturer
            .map(|m| {
                product
                    .get("Manufacturer")
                    .and_then(|v| v.get("Name"))
                    .and_then(|v| v.as_str())
                    .map(|pm| pm.eq_ignore_ascii_case(m))
                    .unwrap_or(false)
            })
            .unwrap_or(true);

        let relevance = product.get("RelevanceScore").and_then(|v| v.as_f64()).unwrap_or(0.5);
        let match_confidence = if manufacturer_matches { relevance.min(1.0) } else { (relevance * 0.6).min(1.0) };

        Ok(SupplierResult {
                supplier: self.supplier_name().to_string(),
                raw_payload: product.clone(),
                category: product
                    .get("Category")
                    .and_then(|v| v.get("Name"))
                    .and_then(|v| v.as_str())
                    .map(String::from),
                description: product
                    .get("Description")
                    .and_then(|v| v.get("ProductDescription"))
                    .and_then(|v| v.as_str())
                    .map(String::from),
                unit_price: product
                    .get("UnitPrice")
                    .and_then(|v| v.as_f64()),
                currency: Some("USD".to_string()),
                availability: product.get("QuantityAvailable").and_then(|v| v.as_i64()),
                lifecycle_status: product.get("ProductStatus").and_then(|v| v.get("Status")).and_then(|v| v.as_str()).map(String::from),
                datasheet_url: product.get("DatasheetUrl").and_then(|v| v.as_str()).map(String::from),
                parameters: product.get("Parameters").cloned().unwrap_or(json!({})),
                price_breaks: product.get("StandardPricing").cloned().unwrap_or(json!([])),
                match_confidence,
                rohs_compliant: product.get("Classifications").and_then(|v| v.get("RohsStatus")).and_then(|v| v.as_str()).map(|s| s.eq_ignore_ascii_case("rohs3-compliant")),
                reach_compliant: product.get("Classifications").and_then(|v| v.get("ReachStatus")).and_then(|v| v.as_str()).map(|s| s.eq_ignore_ascii_case("reach-compliant")),
            })
    }
}
