//! # KissModem Core Library
//!
//! Core functionality for talking to KISS packet-radio modems.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - KISS frame encoding and a byte-at-a-time frame decoder
//! - Serial (and KISS-over-TCP) channel access
//! - Modem configuration commands (TX delay, TX tail, persistence, slot time)
//! - A background receive loop with audio peak polling
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kissmodem_core::protocol::{LoggingObserver, ModemSession, SessionConfig};
//!
//! let config = SessionConfig::new("/dev/ttyUSB0").with_preamble_ms(150);
//! let session = ModemSession::open(config, Arc::new(LoggingObserver))?;
//! session.enable_diagnostics()?;
//! ```

pub mod protocol;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::protocol::{
        Command, Frame, FrameDecoder, ModemError, ModemSession, SessionConfig, SessionObserver,
        SessionState,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
