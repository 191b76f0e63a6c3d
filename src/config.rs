//! # Player Configuration
//!
//! Runtime settings read from a YAML file. Every key is optional.
//!
//! ```yaml
//! volume: 180
//! loop-gap-ms: 50
//! channel-capacity: 5
//! send-timeout-ms: 1000
//! envelope:
//!   gap-ms: 20
//!   fade-step: 15
//!   fade-step-ms: 1
//!   fade-floor: 30
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RtttlError;
use crate::output::Envelope;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct PlayerConfig {
    /// Initial PWM level (0-255)
    pub volume: u8,
    /// Silence between loop traversals
    pub loop_gap_ms: u64,
    /// Bound of the background worker's command queue
    pub channel_capacity: usize,
    /// How long a control call waits for queue space
    pub send_timeout_ms: u64,
    pub envelope: Envelope,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            volume: 180,
            loop_gap_ms: 50,
            channel_capacity: 5,
            send_timeout_ms: 1000,
            envelope: Envelope::default(),
        }
    }
}

impl PlayerConfig {
    /// Parse YAML; an empty document yields the defaults.
    pub fn from_yaml(content: &str) -> Result<Self, RtttlError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: PlayerConfig =
            serde_yaml::from_str(content).map_err(|e| RtttlError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RtttlError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    fn validate(&self) -> Result<(), RtttlError> {
        if self.channel_capacity == 0 {
            return Err(RtttlError::ConfigError(
                "channel-capacity must be at least 1".to_string(),
            ));
        }
        if self.envelope.fade_step_ms == 0 {
            return Err(RtttlError::ConfigError(
                "envelope.fade-step-ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(PlayerConfig::from_yaml("").unwrap(), PlayerConfig::default());
    }

    #[test]
    fn test_partial_config() {
        let config = PlayerConfig::from_yaml(
            r#"
volume: 90
envelope:
  gap-ms: 10
"#,
        )
        .unwrap();
        assert_eq!(config.volume, 90);
        assert_eq!(config.envelope.gap_ms, 10);
        assert_eq!(config.envelope.fade_step, 15);
        assert_eq!(config.channel_capacity, 5);
    }

    #[test]
    fn test_invalid_config() {
        let result = PlayerConfig::from_yaml("channel-capacity: 0");
        assert!(matches!(result, Err(RtttlError::ConfigError(_))));

        let result = PlayerConfig::from_yaml("volume: 300");
        assert!(matches!(result, Err(RtttlError::ConfigError(_))));

        let result = PlayerConfig::from_yaml("tempo: 2");
        assert!(matches!(result, Err(RtttlError::ConfigError(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "loop-gap-ms: 0\nsend-timeout-ms: 250").unwrap();

        let config = PlayerConfig::load(file.path()).unwrap();
        assert_eq!(config.loop_gap_ms, 0);
        assert_eq!(config.send_timeout_ms, 250);
    }

    #[test]
    fn test_load_missing_file() {
        let result = PlayerConfig::load("/nonexistent/rtttl.yaml");
        assert!(matches!(result, Err(RtttlError::Io(_))));
    }
}
