//! Runtime configuration
//!
//! Loaded from YAML. Every section has defaults, so an empty file (or no file)
//! yields a usable configuration for a receiver on `/dev/ttyACM0`.
//!
//! ```yaml
//! serial:
//!   port: /dev/ttyACM0
//!   baud_rate: 9600
//! decoder:
//!   nation: ITA
//!   meaconing_threshold: 50
//! validation:
//!   enabled: true
//!   path: validation.txt
//! storage:
//!   directory: data
//! pipeline:
//!   queue_capacity: 256
//!   workers: 4
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{ReaderError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub serial: SerialConfig,
    pub decoder: DecoderConfig,
    pub validation: ValidationConfig,
    pub storage: StorageConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    /// Blocking read timeout; bounds how long shutdown waits on the port.
    pub read_timeout_ms: u64,
    /// Write CFG-MSG frames enabling the required messages after opening.
    pub send_setup: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".to_string(),
            baud_rate: 9600,
            read_timeout_ms: 100,
            send_setup: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Deployment code used in table names.
    pub nation: String,
    /// Clock bias/drift tolerance in nanoseconds.
    pub meaconing_threshold: i64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self { nation: "ITA".to_string(), meaconing_threshold: 50 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub enabled: bool,
    pub path: PathBuf,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self { enabled: false, path: PathBuf::from("validation.txt") }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one `<table>.jsonl` file per table.
    pub directory: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { directory: PathBuf::from("data") }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Frames buffered between the reader and the dispatcher.
    pub queue_capacity: usize,
    /// Concurrent navigation decodes.
    pub workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { queue_capacity: 256, workers: 4 }
    }
}

impl Config {
    /// Load and validate a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|e| ReaderError::file_error(path, e))?;
        Self::from_yaml(&text)
    }

    /// Parse and validate YAML text. Empty text yields the defaults.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Config =
            if text.trim().is_empty() { Config::default() } else { serde_yaml_ng::from_str(text)? };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.decoder.nation.trim().is_empty() {
            return Err(ReaderError::invalid_config("decoder.nation must not be empty"));
        }
        if self.decoder.meaconing_threshold <= 0 {
            return Err(ReaderError::invalid_config(format!(
                "decoder.meaconing_threshold must be positive, got {}",
                self.decoder.meaconing_threshold
            )));
        }
        if self.pipeline.workers == 0 {
            return Err(ReaderError::invalid_config("pipeline.workers must be at least 1"));
        }
        if self.pipeline.queue_capacity == 0 {
            return Err(ReaderError::invalid_config("pipeline.queue_capacity must be at least 1"));
        }
        if self.serial.baud_rate == 0 {
            return Err(ReaderError::invalid_config("serial.baud_rate must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_defaults() {
        let config = Config::from_yaml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.decoder.nation, "ITA");
        assert!(config.serial.send_setup);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = Config::from_yaml(
            "decoder:\n  nation: DEU\nvalidation:\n  enabled: true\npipeline:\n  workers: 2\n",
        )
        .unwrap();

        assert_eq!(config.decoder.nation, "DEU");
        assert_eq!(config.decoder.meaconing_threshold, 50);
        assert!(config.validation.enabled);
        assert_eq!(config.validation.path, PathBuf::from("validation.txt"));
        assert_eq!(config.pipeline.workers, 2);
        assert_eq!(config.pipeline.queue_capacity, 256);
    }

    #[test]
    fn invalid_values_are_rejected() {
        for yaml in [
            "decoder:\n  nation: ''\n",
            "decoder:\n  meaconing_threshold: 0\n",
            "pipeline:\n  workers: 0\n",
            "pipeline:\n  queue_capacity: 0\n",
        ] {
            let err = Config::from_yaml(yaml).unwrap_err();
            assert!(matches!(err, ReaderError::Config { .. }), "{} should be rejected", yaml);
        }
    }

    #[test]
    fn malformed_yaml_is_a_config_error() {
        let err = Config::from_yaml("serial: [unterminated").unwrap_err();
        assert!(matches!(err, ReaderError::Config { source: Some(_), .. }));
    }

    #[test]
    fn round_trips_through_yaml() {
        let mut config = Config::default();
        config.serial.port = "/dev/ttyUSB1".to_string();
        let text = serde_yaml_ng::to_string(&config).unwrap();
        assert_eq!(Config::from_yaml(&text).unwrap(), config);
    }

    #[test]
    fn missing_file_is_a_file_error() {
        assert!(matches!(
            Config::load("/nonexistent/ublox-reader.yaml"),
            Err(ReaderError::File { .. })
        ));
    }
}
