//! KISS Protocol Communication
//!
//! Implements KISS framing for packet-radio modems, together with the
//! single-byte command sub-protocol used to configure the modem and to poll
//! its audio peak diagnostic.

pub mod commands;
mod config;
mod decoder;
mod error;
mod frame;
pub mod hex;
pub mod serial;
mod session;
pub mod stream;

pub use commands::{clamp_byte, ms_to_ticks, Command, Setting};
pub use config::{Parity, SessionConfig};
pub use decoder::{DecoderPhase, FrameDecoder};
pub use error::ModemError;
pub use frame::{escape, Frame};
pub use serial::{list_ports, open_channel, PortInfo};
pub use session::{LoggingObserver, ModemSession, SessionObserver, SessionState};
pub use stream::{ModemChannel, SerialChannel, TcpChannel};

/// Frame delimiter
pub const FEND: u8 = 0xC0;

/// Frame escape
pub const FESC: u8 = 0xDB;

/// Transposed frame delimiter, only valid after [`FESC`]
pub const TFEND: u8 = 0xDC;

/// Transposed frame escape, only valid after [`FESC`]
pub const TFESC: u8 = 0xDD;

/// Default baud rate for modem communication
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Maximum payload the decoder will accumulate for one frame
pub const MAX_PAYLOAD: usize = 611;

/// Delay after opening the port before the modem accepts configuration
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 2000;

/// Sleep between idle polls of the receive loop
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 80;

/// A partial frame older than this is discarded
pub const DEFAULT_INTER_BYTE_TIMEOUT_MS: u64 = 100;
