//! Supplier Gateway: wires rate limiting, circuit breaking, and
//! bounded retry around each registered adapter, then tries suppliers in
//! priority order until one clears `supplier_confidence_threshold`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bomenrich_core::{CoreError, ErrorKind};

use crate::adapter::SupplierResult;
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::rate_limit::TokenBucket;
use crate::registry::SupplierRegistry;
use crate::retry::{retry_with_backoff, BackoffConfig};

pub struct GatewayConfig {
    pub circuit_breaker: CircuitBreakerConfig,
    pub backoff: BackoffConfig,
    pub supplier_confidence_threshold: f64,
    pub call_deadline: Duration,
}

/// Per-supplier runtime state: one rate limiter and one circuit breaker per
/// adapter, built once at gateway construction from each adapter's declared
/// quota.
struct SupplierRuntime {
    bucket: TokenBucket,
    breaker: CircuitBreaker,
}

pub struct SupplierGateway {
    registry: SupplierRegistry,
    runtime: HashMap<String, SupplierRuntime>,
    config: GatewayConfig,
}

/// Aggregated failure for a line that no supplier could resolve (/// "if none succeeds the line is marked failed with the collected error set").
#[derive(Debug)]
pub struct NoSupplierMatch {
    pub attempts: Vec<(String, String)>,
}

impl SupplierGateway {
    pub fn new(registry: SupplierRegistry, config: GatewayConfig) -> Self {
        let mut runtime = HashMap::new();
        for adapter in registry.in_priority_order() {
            runtime.insert(
                adapter.supplier_name().to_string(),
                SupplierRuntime {
                    bucket: TokenBucket::per_minute(adapter.rate_limit_per_minute()),
                    breaker: CircuitBreaker::new(
                        adapter.supplier_name(),
                        CircuitBreakerConfig {
                            failure_threshold: config.circuit_breaker.failure_threshold,
                            success_threshold: config.circuit_breaker.success_threshold,
                            timeout: config.circuit_breaker.timeout,
                        },
                    ),
                },
            );
        }
        Self { registry, runtime, config }
    }

    /// Tries every registered supplier in priority order, returning the
    /// first result whose `match_confidence` clears the configured threshold.
    pub async fn search(&self, mpn: &str, manufacturer: Option<&str>) -> Result<SupplierResult, NoSupplierMatch> {
        let mut attempts = Vec::new();

        for adapter in self.registry.in_priority_order() {
            let name = adapter.supplier_name().to_string();
            let runtime = self.runtime.get(&name).expect("runtime built for every registered adapter");

            if !runtime.breaker.can_execute() {
                attempts.push((name.clone(), "circuit open: service-unavailable".to_string()));
                continue;
            }

            let deadline = Instant::now() + self.config.call_deadline;
            if runtime.bucket.acquire(deadline).await.is_err() {
                attempts.push((name.clone(), "rate limited".to_string()));
                continue;
            }

            let backoff = self.config.backoff;
            let outcome = retry_with_backoff(&backoff, || {
                    let adapter = adapter.clone();
                    async move { adapter.search(mpn, manufacturer).await }
                })
                .await;

            match outcome {
                Ok(result) if result.match_confidence >= self.config.supplier_confidence_threshold => {
                    runtime.breaker.record_success();
                    return Ok(result);
                }
                Ok(result) => {
                    // A below-threshold match is treated as "no match from this
                    // supplier", the same as a hard error, regardless of source.
                    runtime.breaker.record_success();
                    attempts.push((
                            name.clone(),
                            format!("match_confidence {:.2} below threshold", result.match_confidence),
                        ));
                }
                Err(err) => {
                    if err.kind() != ErrorKind::Validation {
                        runtime.breaker.record_failure();
                    }
                    attempts.push((name.clone(), err.to_string()));
                }
            }
        }

        Err(NoSupplierMatch { attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::SupplierAdapter;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct ScriptedAdapter {
        name: &'static str,
        confidence: f64,
        calls: AtomicU32,
    }

    #[async_trait]
    impl SupplierAdapter for ScriptedAdapter {
        fn supplier_name(&self) -> &str {
            self.name
        }
        fn rate_limit_per_minute(&self) -> u32 {
            6000
        }
        async fn search(&self, _mpn: &str, _manufacturer: Option<&str>) -> Result<SupplierResult, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SupplierResult {
                    supplier: self.name.to_string(),
                    raw_payload: json!({}),
                    category: None,
                    description: None,
                    unit_price: None,
                    currency: None,
                    availability: None,
                    lifecycle_status: None,
                    datasheet_url: None,
                    parameters: json!({}),
                    price_breaks: json!([]),
                    match_confidence: self.confidence,
                    rohs_compliant: None,
                    reach_compliant: None,
                })
        }
    }

    fn config() -> GatewayConfig {
        GatewayConfig {
            circuit_breaker: CircuitBreakerConfig { failure_threshold: 5, success_threshold: 2, timeout: Duration::from_secs(60) },
            backoff: BackoffConfig { max_attempts: 1, base: Duration::from_millis(1), max: Duration::from_millis(5) },
            supplier_confidence_threshold: 0.75,
            call_deadline: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn falls_through_low_confidence_to_next_supplier() {
        let mut registry = SupplierRegistry::new();
        registry.register(Arc::new(ScriptedAdapter { name: "mouser", confidence: 0.4, calls: AtomicU32::new(0) }), 0);
        registry.register(Arc::new(ScriptedAdapter { name: "digikey", confidence: 0.9, calls: AtomicU32::new(0) }), 1);

        let gateway = SupplierGateway::new(registry, config());
        let result = gateway.search("LM358N", Some("TI")).await.unwrap();
        assert_eq!(result.supplier, "digikey");
    }

    #[tokio::test]
    async fn returns_collected_errors_when_no_supplier_matches() {
        let mut registry = SupplierRegistry::new();
        registry.register(Arc::new(ScriptedAdapter { name: "mouser", confidence: 0.1, calls: AtomicU32::new(0) }), 0);

        let gateway = SupplierGateway::new(registry, config());
        let err = gateway.search("UNKNOWN-MPN", None).await.unwrap_err();
        assert_eq!(err.attempts.len(), 1);
        assert_eq!(err.attempts[0].0, "mouser");
    }
}
