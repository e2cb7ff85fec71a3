use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{pool::DEFAULT_CAPACITY, render::DebugField, LaserError, Result};

/// Upper bound accepted for the pool size.
pub const MAX_CAPACITY: usize = 256;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub transport: TransportConfig,
    pub debug: DebugConfig,
}

impl AppConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        self.transport.validate()
    }
}

/// Settings for the oscillator scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub capacity: usize,
    pub window_len: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            window_len: 256,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_CAPACITY).contains(&self.capacity) {
            return Err(LaserError::msg(format!(
                "engine.capacity must be between 1 and {MAX_CAPACITY}, got {}",
                self.capacity
            )));
        }
        if self.window_len == 0 {
            return Err(LaserError::msg("engine.window_len must be positive"));
        }
        Ok(())
    }
}

/// Serial link parameters. The core only uses `batch_samples`; the port and
/// baud rate are handed to whatever owns the serial device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub port: String,
    pub baud_rate: u32,
    pub batch_samples: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: "COM3".to_string(),
            baud_rate: 1_000_000,
            batch_samples: 32,
        }
    }
}

impl TransportConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_samples == 0 {
            return Err(LaserError::msg("transport.batch_samples must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub field: DebugField,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = AppConfig::from_json_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.engine.capacity, 64);
        assert_eq!(config.engine.window_len, 256);
        assert_eq!(config.transport.batch_samples, 32);
        assert_eq!(config.transport.baud_rate, 1_000_000);
        assert_eq!(config.debug.field, DebugField::X);
    }

    #[test]
    fn partial_overrides_keep_other_defaults() {
        let config = AppConfig::from_json_str(
            r#"{ "engine": { "capacity": 32 }, "debug": { "field": "y" } }"#,
        )
        .unwrap();
        assert_eq!(config.engine.capacity, 32);
        assert_eq!(config.engine.window_len, 256);
        assert_eq!(config.debug.field, DebugField::Y);
        assert_eq!(config.transport.port, "COM3");
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(AppConfig::from_json_str(r#"{ "engine": { "capacity": 0 } }"#).is_err());
        assert!(AppConfig::from_json_str(r#"{ "engine": { "window_len": 0 } }"#).is_err());
        assert!(AppConfig::from_json_str(r#"{ "transport": { "batch_samples": 0 } }"#).is_err());
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = AppConfig::from_json_str("{ engine").unwrap_err();
        assert!(matches!(err, LaserError::Json(_)));
    }
}
