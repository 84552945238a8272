//! Supplier Gateway: per-supplier adapters behind rate limiting,
//! circuit breaking, and bounded retry, selected in declared priority order.

pub mod adapter;
pub mod adapters;
pub mod circuit_breaker;
pub mod gateway;
pub mod pacing;
pub mod rate_limit;
pub mod registry;
pub mod retry;

pub use adapter::{SupplierAdapter, SupplierResult};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use gateway::{GatewayConfig, NoSupplierMatch, SupplierGateway};
pub use pacing::PacingConfig;
pub use rate_limit::TokenBucket;
pub use registry::SupplierRegistry;
pub use retry::{retry_with_backoff, BackoffConfig};
