//! Global pacing: read from the configuration store once per
//! workflow start and cached for the workflow's lifetime.

use std::time::Duration;

use bomenrich_core::OrchestratorConfig;

#[derive(Debug, Clone, Copy)]
pub struct PacingConfig {
    pub batch_size: u32,
    pub delay_per_component: Duration,
    pub delay_per_batch: Duration,
    pub enabled: bool,
}

impl From<&OrchestratorConfig> for PacingConfig {
    fn from(cfg: &OrchestratorConfig) -> Self {
        Self {
            batch_size: cfg.enrichment_batch_size,
            delay_per_component: Duration::from_millis(cfg.enrichment_delay_per_component_ms),
            delay_per_batch: Duration::from_millis(cfg.enrichment_delay_per_batch_ms),
            enabled: cfg.enrichment_delays_enabled,
        }
    }
}

impl PacingConfig {
    pub async fn pause_between_components(&self) {
        if self.enabled && !self.delay_per_component.is_zero() {
            tokio::time::sleep(self.delay_per_component).await;
        }
    }

    pub async fn pause_between_batches(&self) {
        if self.enabled && !self.delay_per_batch.is_zero() {
            tokio::time::sleep(self.delay_per_batch).await;
        }
    }
}
