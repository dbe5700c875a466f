//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("engine.max_update_attempts must be between 1 and 10, got {0}")]
    InvalidUpdateAttempts(u32),

    #[error("Invalid log filter: {0}")]
    InvalidLogLevel(String),
}
