//! Frame decoding
//!
//! Reassembles KISS frames from a serial byte stream, one byte at a time.

use std::time::{Duration, Instant};
use tracing::debug;

use super::hex::pretty_hexrep;
use super::{
    Command, Frame, DEFAULT_INTER_BYTE_TIMEOUT_MS, FEND, FESC, MAX_PAYLOAD, TFEND, TFESC,
};

/// Where the decoder is within a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderPhase {
    /// Outside any frame
    Idle,
    /// Collecting the command selector or payload
    InFrame,
    /// Previous payload byte was FESC
    Escaped,
}

/// Stateful KISS frame decoder.
///
/// The decoder owns a bounded accumulator of [`MAX_PAYLOAD`] bytes. Bytes
/// arriving once the accumulator is full are dropped until the next FEND
/// restarts the frame.
///
/// A FEND arriving while a non-DATA frame is open silently restarts the
/// frame; only DATA frames are closed by a trailing FEND. Audio peak replies
/// are emitted as soon as their value byte arrives.
#[derive(Debug)]
pub struct FrameDecoder {
    phase: DecoderPhase,
    command: Command,
    buffer: Vec<u8>,
    last_byte: Instant,
    inter_byte_timeout: Duration,
}

impl FrameDecoder {
    /// Create a decoder with the default inter-byte timeout
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_millis(DEFAULT_INTER_BYTE_TIMEOUT_MS))
    }

    /// Create a decoder that discards partial frames after `inter_byte_timeout`
    pub fn with_timeout(inter_byte_timeout: Duration) -> Self {
        Self {
            phase: DecoderPhase::Idle,
            command: Command::Unknown,
            buffer: Vec::with_capacity(MAX_PAYLOAD),
            last_byte: Instant::now(),
            inter_byte_timeout,
        }
    }

    /// Current phase
    pub fn phase(&self) -> DecoderPhase {
        self.phase
    }

    /// Command selector of the frame being assembled
    pub fn command(&self) -> Command {
        self.command
    }

    /// Payload bytes accumulated so far
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Whether the decoder is inside a frame
    pub fn in_frame(&self) -> bool {
        self.phase != DecoderPhase::Idle
    }

    /// Feed one byte received at `now`, returning a frame if one completed
    pub fn push(&mut self, byte: u8, now: Instant) -> Option<Frame> {
        self.last_byte = now;

        if self.in_frame() && byte == FEND && self.command == Command::Data {
            self.phase = DecoderPhase::Idle;
            let payload = std::mem::replace(&mut self.buffer, Vec::with_capacity(MAX_PAYLOAD));
            return Some(Frame::new(Command::Data, payload));
        }

        if byte == FEND {
            self.phase = DecoderPhase::InFrame;
            self.command = Command::Unknown;
            self.buffer.clear();
            return None;
        }

        if !self.in_frame() || self.buffer.len() >= MAX_PAYLOAD {
            return None;
        }

        if self.buffer.is_empty() && self.command == Command::Unknown {
            self.command = Command::from_byte(byte);
            return None;
        }

        match self.command {
            Command::Data => {
                self.push_data(byte);
                None
            }
            Command::AudioPeak => Some(Frame::command(Command::AudioPeak, byte)),
            _ => None,
        }
    }

    fn push_data(&mut self, byte: u8) {
        match self.phase {
            DecoderPhase::Escaped => {
                let unescaped = match byte {
                    TFEND => FEND,
                    TFESC => FESC,
                    other => other,
                };
                self.buffer.push(unescaped);
                self.phase = DecoderPhase::InFrame;
            }
            _ if byte == FESC => self.phase = DecoderPhase::Escaped,
            _ => self.buffer.push(byte),
        }
    }

    /// Discard a stalled partial frame.
    ///
    /// Returns `true` when the buffer was non-empty and no byte arrived for
    /// longer than the inter-byte timeout, in which case the decoder is back
    /// in [`DecoderPhase::Idle`].
    pub fn check_idle(&mut self, now: Instant) -> bool {
        if self.buffer.is_empty()
            || now.saturating_duration_since(self.last_byte) <= self.inter_byte_timeout
        {
            return false;
        }

        debug!(
            "Discarding stalled {:?} frame {}",
            self.command,
            pretty_hexrep(&self.buffer)
        );
        self.reset();
        true
    }

    /// Return to [`DecoderPhase::Idle`] with an empty buffer
    pub fn reset(&mut self) {
        self.phase = DecoderPhase::Idle;
        self.command = Command::Unknown;
        self.buffer.clear();
    }

    /// Lazily decode frames from a byte source
    pub fn frames<'a, I>(&'a mut self, bytes: I) -> impl Iterator<Item = Frame> + 'a
    where
        I: IntoIterator<Item = u8> + 'a,
        I::IntoIter: 'a,
    {
        bytes
            .into_iter()
            .filter_map(move |b| self.push(b, Instant::now()))
    }

    /// Decode every frame completed by `bytes`
    pub fn decode(&mut self, bytes: &[u8]) -> Vec<Frame> {
        self.frames(bytes.iter().copied()).collect()
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
