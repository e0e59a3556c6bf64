//! TOML run configuration.

use std::path::Path;

use serde::Deserialize;

use fxlab_core::domain::TimestampNs;
use fxlab_core::execution::Settings;

/// Top-level run configuration from a TOML file.
#[derive(Debug, Deserialize)]
pub struct RunConfig {
    pub run: RunSection,
    #[serde(default)]
    pub venue: VenueSection,
}

/// General run parameters.
#[derive(Debug, Deserialize)]
pub struct RunSection {
    /// Market-data CSV path; `"-"` reads standard input.
    pub input: String,
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Event-loop start time, nanoseconds.
    #[serde(default)]
    pub start_ns: TimestampNs,
}

/// Simulated-venue parameters.
#[derive(Debug, Deserialize)]
pub struct VenueSection {
    #[serde(default = "default_inbound_delay")]
    pub inbound_delay_ns: TimestampNs,
    #[serde(default = "default_outbound_delay")]
    pub outbound_delay_ns: TimestampNs,
    #[serde(default = "default_min_order_gap")]
    pub min_order_gap_ns: TimestampNs,
    #[serde(default = "default_max_nop")]
    pub max_nop: f64,
}

fn default_strategy() -> String {
    "flipper".to_string()
}
fn default_inbound_delay() -> TimestampNs {
    1_000_000 // 1ms
}
fn default_outbound_delay() -> TimestampNs {
    1_000_000 // 1ms
}
fn default_min_order_gap() -> TimestampNs {
    10_000_000_000 // 10s
}
fn default_max_nop() -> f64 {
    10e6
}

impl Default for VenueSection {
    fn default() -> Self {
        Self {
            inbound_delay_ns: default_inbound_delay(),
            outbound_delay_ns: default_outbound_delay(),
            min_order_gap_ns: default_min_order_gap(),
            max_nop: default_max_nop(),
        }
    }
}

impl VenueSection {
    pub fn settings(&self) -> Settings {
        Settings {
            inbound_delay: self.inbound_delay_ns,
            outbound_delay: self.outbound_delay_ns,
            min_order_gap: self.min_order_gap_ns,
            max_nop: self.max_nop,
        }
    }
}

impl RunConfig {
    /// Load from a TOML file path.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&contents)
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// Config loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("TOML parse error: {0}")]
    Parse(String),
}
