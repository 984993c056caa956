use pandora_ai::{AnalysisPipeline, BackendFactory};
use pandora_core::{PandoraConfig, Result};
use std::sync::Arc;
use std::time::Instant;

/// Application context shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<AnalysisPipeline>,
    pub started_at: Instant,
}

impl AppState {
    /// Build state from configuration, choosing the backend once
    pub fn from_config(config: &PandoraConfig) -> Result<Self> {
        let backend = BackendFactory::create_from_config(config)?;
        let pipeline = AnalysisPipeline::new(backend)
            .with_fallback_on_backend_error(config.pipeline.fallback_on_backend_error);
        Ok(Self::new(pipeline))
    }

    pub fn new(pipeline: AnalysisPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            started_at: Instant::now(),
        }
    }
}
