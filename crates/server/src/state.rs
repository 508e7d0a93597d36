use std::sync::Arc;

use morphflux_core::{Config, ModelManager, SanitizedConfig, TransformationOrchestrator};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<TransformationOrchestrator>,
}

impl AppState {
    pub fn new(config: Config, orchestrator: Arc<TransformationOrchestrator>) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn orchestrator(&self) -> &TransformationOrchestrator {
        &self.orchestrator
    }

    pub fn models(&self) -> &ModelManager {
        self.orchestrator.models()
    }
}
