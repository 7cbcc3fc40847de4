//! Session configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use super::{
    ModemError, DEFAULT_BAUD_RATE, DEFAULT_INTER_BYTE_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_SETTLE_DELAY_MS,
};

/// Serial parity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    /// No parity bit
    #[default]
    None,
    /// Even parity
    Even,
    /// Odd parity
    Odd,
}

impl FromStr for Parity {
    type Err = ModemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "n" | "none" => Ok(Parity::None),
            "e" | "even" => Ok(Parity::Even),
            "o" | "odd" => Ok(Parity::Odd),
            other => Err(ModemError::Config(format!("unknown parity '{}'", other))),
        }
    }
}

/// Modem session configuration.
///
/// Radio timing values are given in milliseconds and converted to 10 ms
/// protocol ticks when sent; out-of-range values are clamped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Interface name used in log output
    pub name: String,
    /// Serial device path, or `tcp://host:port` for a KISS TCP server
    pub port_name: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits (5-8)
    pub data_bits: u8,
    /// Parity
    pub parity: Parity,
    /// Stop bits (1 or 2)
    pub stop_bits: u8,
    /// Transmitter keyup delay in ms
    pub preamble_ms: i64,
    /// Transmitter tail in ms
    pub tx_tail_ms: i64,
    /// p-persistence (0-255)
    pub persistence: i64,
    /// CSMA slot time in ms
    pub slot_time_ms: i64,
    /// Flow control
    pub flow_control: bool,
    /// Wait after opening the port before configuring the modem
    pub settle_delay_ms: u64,
    /// Sleep between idle peak polls
    pub poll_interval_ms: u64,
    /// Partial frames older than this are discarded
    pub inter_byte_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: "KISS Interface".to_string(),
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            preamble_ms: 350,
            tx_tail_ms: 20,
            persistence: 64,
            slot_time_ms: 20,
            flow_control: false,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            inter_byte_timeout_ms: DEFAULT_INTER_BYTE_TIMEOUT_MS,
        }
    }
}

impl SessionConfig {
    /// Create a configuration for the given device with default settings
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Self::default()
        }
    }

    /// Load a configuration from a JSON file.
    ///
    /// Missing fields take their default values.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ModemError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ModemError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    /// Parse a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, ModemError> {
        serde_json::from_str(json).map_err(|e| ModemError::Config(e.to_string()))
    }

    /// Set the interface name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the parity
    pub fn with_parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    /// Set the preamble (TX delay) in ms
    pub fn with_preamble_ms(mut self, ms: i64) -> Self {
        self.preamble_ms = ms;
        self
    }

    /// Set the TX tail in ms
    pub fn with_tx_tail_ms(mut self, ms: i64) -> Self {
        self.tx_tail_ms = ms;
        self
    }

    /// Set the persistence
    pub fn with_persistence(mut self, persistence: i64) -> Self {
        self.persistence = persistence;
        self
    }

    /// Set the slot time in ms
    pub fn with_slot_time_ms(mut self, ms: i64) -> Self {
        self.slot_time_ms = ms;
        self
    }

    /// Enable or disable flow control
    pub fn with_flow_control(mut self, enabled: bool) -> Self {
        self.flow_control = enabled;
        self
    }

    /// Set the post-open settle delay
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Set the idle poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Post-open settle delay
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Idle poll interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Inter-byte timeout for partial frames
    pub fn inter_byte_timeout(&self) -> Duration {
        Duration::from_millis(self.inter_byte_timeout_ms)
    }
}
