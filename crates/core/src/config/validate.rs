use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Poll interval and grace period are not 0
/// - Grace period is at least one poll interval
/// - Temp root is absolute
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let process = &config.process;

    if process.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "process.poll_interval_ms cannot be 0".to_string(),
        ));
    }

    if process.grace_period_ms == 0 {
        return Err(ConfigError::ValidationError(
            "process.grace_period_ms cannot be 0".to_string(),
        ));
    }

    if process.grace_period_ms < process.poll_interval_ms {
        return Err(ConfigError::ValidationError(format!(
            "process.grace_period_ms ({}) must be at least process.poll_interval_ms ({})",
            process.grace_period_ms, process.poll_interval_ms
        )));
    }

    if !config.temp.root.is_absolute() {
        return Err(ConfigError::ValidationError(format!(
            "temp.root must be an absolute path, got {:?}",
            config.temp.root
        )));
    }

    Ok(())
}
