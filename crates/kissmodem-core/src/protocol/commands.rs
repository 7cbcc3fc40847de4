//! Protocol commands
//!
//! Defines the KISS command selectors understood by the modem.

use serde::{Deserialize, Serialize};
use std::fmt;

/// KISS command selector (the byte following the opening FEND)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    /// Data frame (0x00)
    Data,

    /// Transmitter keyup delay, in 10 ms units (0x01)
    TxDelay,

    /// Persistence parameter for p-persistent CSMA (0x02)
    Persistence,

    /// Slot interval, in 10 ms units (0x03)
    SlotTime,

    /// Time to hold the transmitter after the frame, in 10 ms units (0x04)
    TxTail,

    /// Full duplex mode (0x05)
    FullDuplex,

    /// Hardware specific setting (0x06)
    SetHardware,

    /// Host ready / flow control (0x0F)
    Ready,

    /// Audio peak diagnostic request and reply (0x12)
    AudioPeak,

    /// Enable or disable modem diagnostics (0x13)
    EnableDiagnostics,

    /// Sentinel used by the decoder before a selector has been read (0xFE)
    Unknown,

    /// Exit KISS mode (0xFF)
    Return,

    /// Selector byte with no assigned meaning
    Other(u8),
}

impl Command {
    /// Get the wire byte for this command
    pub fn as_byte(&self) -> u8 {
        match self {
            Command::Data => 0x00,
            Command::TxDelay => 0x01,
            Command::Persistence => 0x02,
            Command::SlotTime => 0x03,
            Command::TxTail => 0x04,
            Command::FullDuplex => 0x05,
            Command::SetHardware => 0x06,
            Command::Ready => 0x0F,
            Command::AudioPeak => 0x12,
            Command::EnableDiagnostics => 0x13,
            Command::Unknown => 0xFE,
            Command::Return => 0xFF,
            Command::Other(byte) => *byte,
        }
    }

    /// Map a received selector byte to a command
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => Command::Data,
            0x01 => Command::TxDelay,
            0x02 => Command::Persistence,
            0x03 => Command::SlotTime,
            0x04 => Command::TxTail,
            0x05 => Command::FullDuplex,
            0x06 => Command::SetHardware,
            0x0F => Command::Ready,
            0x12 => Command::AudioPeak,
            0x13 => Command::EnableDiagnostics,
            0xFE => Command::Unknown,
            0xFF => Command::Return,
            other => Command::Other(other),
        }
    }
}

impl From<u8> for Command {
    fn from(byte: u8) -> Self {
        Command::from_byte(byte)
    }
}

/// A modem setting written by a single-byte command frame.
///
/// Used to name the failing setting in configuration errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Setting {
    /// TX delay (preamble)
    Preamble,
    /// TX tail
    TxTail,
    /// p-persistence
    Persistence,
    /// Slot time
    SlotTime,
    /// Flow control / ready
    FlowControl,
    /// Diagnostics on/off
    Diagnostics,
    /// Audio peak poll
    PeakPoll,
}

impl Setting {
    /// The command that carries this setting
    pub fn command(&self) -> Command {
        match self {
            Setting::Preamble => Command::TxDelay,
            Setting::TxTail => Command::TxTail,
            Setting::Persistence => Command::Persistence,
            Setting::SlotTime => Command::SlotTime,
            Setting::FlowControl => Command::Ready,
            Setting::Diagnostics => Command::EnableDiagnostics,
            Setting::PeakPoll => Command::AudioPeak,
        }
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Setting::Preamble => "preamble",
            Setting::TxTail => "TX tail",
            Setting::Persistence => "persistence",
            Setting::SlotTime => "slot time",
            Setting::FlowControl => "flow control",
            Setting::Diagnostics => "diagnostics",
            Setting::PeakPoll => "peak poll",
        };
        f.write_str(name)
    }
}

/// Convert a millisecond value to 10 ms protocol ticks.
///
/// Truncates toward zero, then clamps to `0..=255`.
pub fn ms_to_ticks(ms: i64) -> u8 {
    clamp_byte(ms / 10)
}

/// Clamp a raw value into a single command byte
pub fn clamp_byte(value: i64) -> u8 {
    value.clamp(0, 255) as u8
}
