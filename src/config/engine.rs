//! Progress engine configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Upper bound for `max_update_attempts`.
pub const MAX_UPDATE_ATTEMPTS_LIMIT: u32 = 10;

/// Progress engine configuration
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    /// How many times one progress update is attempted when its writes
    /// keep going stale
    #[serde(default = "default_max_update_attempts")]
    pub max_update_attempts: u32,
}

impl EngineConfig {
    /// Validate engine configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_update_attempts == 0 || self.max_update_attempts > MAX_UPDATE_ATTEMPTS_LIMIT {
            return Err(ValidationError::InvalidUpdateAttempts(self.max_update_attempts));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_update_attempts: default_max_update_attempts(),
        }
    }
}

fn default_max_update_attempts() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_update_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_update_attempts_must_be_in_range() {
        for attempts in [0, MAX_UPDATE_ATTEMPTS_LIMIT + 1] {
            let config = EngineConfig { max_update_attempts: attempts };
            assert!(matches!(
                config.validate(),
                Err(ValidationError::InvalidUpdateAttempts(n)) if n == attempts
            ));
        }

        let config = EngineConfig { max_update_attempts: MAX_UPDATE_ATTEMPTS_LIMIT };
        assert!(config.validate().is_ok());
    }
}
