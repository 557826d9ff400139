//! Application state shared by every HTTP handler.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::AppConfig;
use crate::pipeline::submission::SubmissionPipeline;
use crate::registry::{HttpRegistryClient, RegistryClient, TransportError};

// ═══════════════════════════════════════════════════════════
// CoreState: one per process
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    pub config: AppConfig,
    pub pipeline: SubmissionPipeline,
    pub started_at: DateTime<Utc>,
}

impl CoreState {
    /// State talking to the real registry described by `config`.
    pub fn from_config(config: AppConfig) -> Result<Self, TransportError> {
        let client = HttpRegistryClient::new(&config.registry)?;
        Ok(Self::with_registry(config, Arc::new(client)))
    }

    /// State over any registry client (mock in tests).
    pub fn with_registry(config: AppConfig, registry: Arc<dyn RegistryClient>) -> Self {
        let pipeline = SubmissionPipeline::new(registry, &config.pipeline);
        Self {
            config,
            pipeline,
            started_at: Utc::now(),
        }
    }
}
