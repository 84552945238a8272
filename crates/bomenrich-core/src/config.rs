//! Runtime configuration: a TOML file layered under
//! `BOMENRICH__`-prefixed environment variables, the same precedence
//! `CoreConfig::load()` uses, wrapped in a read-through cache with a 5-minute
//! TTL and an explicit invalidation hook.

use std::path::Path;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::error::{CoreError, ErrorKind};

const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Tunable knobs for the enrichment pipeline. Field names are snake_case so
/// `config::Environment::with_prefix("BOMENRICH")` maps
/// `BOMENRICH__ENRICHMENT_BATCH_SIZE` straight onto `enrichment_batch_size`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OrchestratorConfig {
    pub enrichment_batch_size: u32,
    pub enrichment_delay_per_component_ms: u64,
    pub enrichment_delay_per_batch_ms: u64,
    pub enrichment_delays_enabled: bool,
    pub quality_threshold: u8,
    pub promote_threshold: u8,
    pub supplier_confidence_threshold: f64,
    pub circuit_failure_threshold: u32,
    pub circuit_success_threshold: u32,
    pub circuit_timeout_seconds: u64,
    pub retry_max_attempts: u32,
    pub redis_snapshot_ttl_seconds: u64,
    pub redis_sync_interval_seconds: u64,
    /// Distinct from `redis_sync_interval_seconds`: the duration of the
    /// advisory lock the sync worker holds while it runs.
    pub redis_sync_lock_ttl_seconds: u64,
    pub enable_enrichment_audit: bool,
}

impl OrchestratorConfig {
    /// Loads from `BOMENRICH_CONFIG` (default `config/orchestrator`) layered
    /// under `BOMENRICH__`-prefixed env vars, then validates.
    pub fn load() -> Result<Self, CoreError> {
        let config_path =
        std::env::var("BOMENRICH_CONFIG").unwrap_or_else(|_| "config/orchestrator".to_string());

        let builder = config::Config::builder()
            .set_default("enrichment_batch_size", 10_i64)?
            .set_default("enrichment_delay_per_component_ms", 250_i64)?
            .set_default("enrichment_delay_per_batch_ms", 1000_i64)?
            .set_default("enrichment_delays_enabled", true)?
            .set_default("quality_threshold", 80_i64)?
            .set_default("promote_threshold", 70_i64)?
            .set_default("supplier_confidence_threshold", 0.75_f64)?
            .set_default("circuit_failure_threshold", 5_i64)?
            .set_default("circuit_success_threshold", 2_i64)?
            .set_default("circuit_timeout_seconds", 60_i64)?
            .set_default("retry_max_attempts", 3_i64)?
            .set_default("redis_snapshot_ttl_seconds", 7 * 24 * 3600_i64)?
            .set_default("redis_sync_interval_seconds", 15_i64)?
            .set_default("redis_sync_lock_ttl_seconds", 300_i64)?
            .set_default("enable_enrichment_audit", true)?;

        let path = Path::new(&config_path);
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(config::Environment::with_prefix("BOMENRICH").separator("__"))
            .build()?;

        let cfg: OrchestratorConfig = built.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Startup validation: enumerate every missing/contradictory
    /// value rather than failing on the first one.
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut problems = Vec::new();

        if self.promote_threshold as i64 >= self.quality_threshold as i64 {
            problems.push(format!(
                    "promote_threshold ({}) must be < quality_threshold ({})",
                    self.promote_threshold, self.quality_threshold
                ));
        }
        if self.enrichment_batch_size == 0 {
            problems.push("enrichment_batch_size must be > 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.supplier_confidence_threshold) {
            problems.push("supplier_confidence_threshold must be in [0.0, 1.0]".to_string());
        }
        if self.circuit_success_threshold == 0 {
            problems.push("circuit_success_threshold must be > 0".to_string());
        }
        if self.circuit_failure_threshold == 0 {
            problems.push("circuit_failure_threshold must be > 0".to_string());
        }
        if self.retry_max_attempts == 0 {
            problems.push("retry_max_attempts must be > 0".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Validation(problems.join("; ")))
        }
    }

    pub fn circuit_timeout(&self) -> Duration {
        Duration::from_secs(self.circuit_timeout_seconds)
    }

    pub fn redis_snapshot_ttl(&self) -> Duration {
        Duration::from_secs(self.redis_snapshot_ttl_seconds)
    }

    pub fn redis_sync_interval(&self) -> Duration {
        Duration::from_secs(self.redis_sync_interval_seconds)
    }

    pub fn redis_sync_lock_ttl(&self) -> Duration {
        Duration::from_secs(self.redis_sync_lock_ttl_seconds)
    }
}

struct Cached {
    value: OrchestratorConfig,
    loaded_at: Instant,
}

/// Read-through cache over `OrchestratorConfig::load()` with a 5-minute TTL
/// and an explicit `invalidate()` hook. A single instance is meant
/// to be shared behind an `Arc` across a process.
pub struct ConfigStore {
    ttl: Duration,
    cached: RwLock<Option<Cached>>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl, cached: RwLock::new(None) }
    }

    /// Returns the cached config, reloading from source if the TTL elapsed
    /// or nothing has been loaded yet.
    pub fn get(&self) -> Result<OrchestratorConfig, CoreError> {
        if let Some(cached) = self.cached.read().unwrap().as_ref() {
            if cached.loaded_at.elapsed() < self.ttl {
                return Ok(cached.value.clone());
            }
        }

        let value = OrchestratorConfig::load()?;
        let mut guard = self.cached.write().unwrap();
        *guard = Some(Cached { value: value.clone(), loaded_at: Instant::now() });
        Ok(value)
    }

    /// Forces the next `get()` to reload from source regardless of TTL.
    pub fn invalidate(&self) {
        *self.cached.write().unwrap() = None;
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> OrchestratorConfig {
        OrchestratorConfig {
            enrichment_batch_size: 10,
            enrichment_delay_per_component_ms: 250,
            enrichment_delay_per_batch_ms: 1000,
            enrichment_delays_enabled: true,
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
    fn rejects_promote_threshold_at_or_above_catalog_threshold() {
        let mut cfg = valid();
        cfg.promote_threshold = 80;
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn accepts_default_thresholds() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn config_store_caches_until_invalidated() {
        std::env::set_var("BOMENRICH_CONFIG", "/nonexistent/path/so/defaults/apply.toml");
        let store = ConfigStore::with_ttl(Duration::from_secs(3600));
        let first = store.get().expect("defaults load without a file");
        let second = store.get().expect("cached read");
        assert_eq!(first.enrichment_batch_size, second.enrichment_batch_size);
        store.invalidate();
        assert!(store.cached.read().unwrap().is_none());
    }
}
