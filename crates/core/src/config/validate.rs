use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Transfer section exists (enforced by serde)
/// - Service endpoint is set and batch size is not 0
/// - Quota ceiling and poll interval are not 0
/// - Commands get at least one attempt
/// - Storage elements form a valid registry
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Transfer validation
    if config.transfer.fts_service.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "transfer.fts_service cannot be empty".to_string(),
        ));
    }
    if config.transfer.batch_size == 0 {
        return Err(ConfigError::ValidationError(
            "transfer.batch_size cannot be 0".to_string(),
        ));
    }

    // Quota validation
    if config.quota.max_active_per_channel == 0 {
        return Err(ConfigError::ValidationError(
            "quota.max_active_per_channel cannot be 0".to_string(),
        ));
    }
    if config.quota.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "quota.poll_interval_ms cannot be 0".to_string(),
        ));
    }

    if config.commands.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "commands.max_attempts must be at least 1".to_string(),
        ));
    }

    config
        .registry()
        .map_err(|e| ConfigError::ValidationError(format!("storage_element: {}", e)))?;

    Ok(())
}
