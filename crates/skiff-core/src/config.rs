//! Scheduler configuration types.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Configuration for the transfer scheduler.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct SchedConfig {
    /// Non-fatal errors displayed per task before it is force-cancelled.
    #[builder(default = "5")]
    #[serde(default = "default_max_displayed_errors")]
    pub max_displayed_errors: usize,

    /// How often the error monitor polls the adapter's error stream, in
    /// milliseconds.
    #[builder(default = "250")]
    #[serde(default = "default_error_poll_ms")]
    pub error_poll_ms: u64,
}

fn default_max_displayed_errors() -> usize {
    5
}

fn default_error_poll_ms() -> u64 {
    250
}

impl SchedConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(0) = self.max_displayed_errors {
            return Err("max_displayed_errors must be at least 1".to_string());
        }
        if let Some(0) = self.error_poll_ms {
            return Err("error_poll_ms must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Default for SchedConfig {
    fn default() -> Self {
        Self {
            max_displayed_errors: default_max_displayed_errors(),
            error_poll_ms: default_error_poll_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = SchedConfigBuilder::default().build().unwrap();
        assert_eq!(config.max_displayed_errors, 5);
        assert_eq!(config.error_poll_ms, 250);
    }

    #[test]
    fn test_builder_rejects_zero_max_errors() {
        let result = SchedConfigBuilder::default()
            .max_displayed_errors(0usize)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_rejects_zero_poll_interval() {
        let result = SchedConfigBuilder::default().error_poll_ms(0u64).build();
        assert!(result.is_err());
    }
}
