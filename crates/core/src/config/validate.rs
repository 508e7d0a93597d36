use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Worker pool, timeout and load concurrency are positive
/// - Disabled processors name known transformation types
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.orchestrator.max_concurrent_jobs == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.max_concurrent_jobs must be at least 1".to_string(),
        ));
    }

    if config.orchestrator.job_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.job_timeout_secs must be at least 1".to_string(),
        ));
    }

    if config.models.max_concurrent_loads == 0 {
        return Err(ConfigError::ValidationError(
            "models.max_concurrent_loads must be at least 1".to_string(),
        ));
    }

    config
        .models
        .disabled_types()
        .map_err(|e| ConfigError::ValidationError(format!("models.disabled: {}", e)))?;

    Ok(())
}
