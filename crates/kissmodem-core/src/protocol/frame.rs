//! Frame encoding
//!
//! Implements KISS frame encoding.
//!
//! Frame format:
//! - 1 byte: FEND (0xC0)
//! - 1 byte: Command selector
//! - N bytes: Payload, with FEND and FESC escaped
//! - 1 byte: FEND (0xC0)

use super::{Command, FEND, FESC, TFEND, TFESC};

/// A logical KISS frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Command selector
    pub command: Command,
    /// Unescaped payload
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a new frame with the given command and payload
    pub fn new(command: Command, payload: Vec<u8>) -> Self {
        Self { command, payload }
    }

    /// Create a data frame
    pub fn data(payload: impl Into<Vec<u8>>) -> Self {
        Self::new(Command::Data, payload.into())
    }

    /// Create a single-byte command frame (configuration, polls)
    pub fn command(command: Command, value: u8) -> Self {
        Self::new(command, vec![value])
    }

    /// Encode the frame to raw bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.encoded_size());
        bytes.push(FEND);
        bytes.push(self.command.as_byte());
        escape_into(&self.payload, &mut bytes);
        bytes.push(FEND);
        bytes
    }

    /// Get the total encoded size, including escape bytes
    pub fn encoded_size(&self) -> usize {
        let reserved = self
            .payload
            .iter()
            .filter(|&&b| b == FEND || b == FESC)
            .count();
        self.payload.len() + reserved + 3
    }

    /// Interpret an audio peak reply as a signed level
    pub fn peak_value(&self) -> Option<i8> {
        match self.command {
            Command::AudioPeak => self.payload.first().map(|&b| b as i8),
            _ => None,
        }
    }
}

/// Escape FEND and FESC bytes in a payload
pub fn escape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    escape_into(data, &mut out);
    out
}

fn escape_into(data: &[u8], out: &mut Vec<u8>) {
    for &b in data {
        match b {
            FEND => out.extend_from_slice(&[FESC, TFEND]),
            FESC => out.extend_from_slice(&[FESC, TFESC]),
            _ => out.push(b),
        }
    }
}
