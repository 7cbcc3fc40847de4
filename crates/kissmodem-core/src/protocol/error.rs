//! Protocol errors

use thiserror::Error;

use super::Setting;

/// Errors that can occur while talking to a modem
#[derive(Error, Debug)]
pub enum ModemError {
    #[error("Could not open port {path}: {reason}")]
    TransportOpen { path: String, reason: String },

    #[error("Could not configure {setting}: wrote {written} of {expected} bytes")]
    Configuration {
        setting: Setting,
        written: usize,
        expected: usize,
    },

    #[error("Incomplete data frame write: wrote {written} of {expected} bytes")]
    IncompleteWrite { written: usize, expected: usize },

    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Interface is offline")]
    Offline,

    #[error("Channel lock poisoned")]
    ChannelPoisoned,

    #[error("Configuration file error: {0}")]
    Config(String),
}
