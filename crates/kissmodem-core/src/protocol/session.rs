//! Session management
//!
//! Handles the modem session lifecycle: opening the link, sending the
//! configuration handshake, and running the background receive loop that
//! decodes frames and polls the audio peak while the link is idle.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::hex::pretty_hexrep;
use super::{
    clamp_byte, ms_to_ticks, open_channel, Command, Frame, FrameDecoder, ModemChannel,
    ModemError, SessionConfig, Setting,
};

/// Channel shared between the caller and the receive loop
type SharedChannel = Arc<Mutex<Box<dyn ModemChannel>>>;

/// Receives decoded traffic from the receive loop.
///
/// Callbacks run synchronously on the receive thread, so they should return
/// quickly.
pub trait SessionObserver: Send + Sync {
    /// A DATA frame was decoded
    fn on_data_frame(&self, payload: &[u8]);

    /// An audio peak reply was decoded
    fn on_peak_value(&self, peak: i8);

    /// The receive loop ended because of a transport error
    fn on_offline(&self, _error: &ModemError) {}
}

/// Observer that only logs what it receives
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl SessionObserver for LoggingObserver {
    fn on_data_frame(&self, payload: &[u8]) {
        info!("Decoded packet {}", pretty_hexrep(payload));
    }

    fn on_peak_value(&self, peak: i8) {
        info!("Peak is: {}", peak);
    }
}

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Link open, configuration not yet complete
    Closed,
    /// Configured, receive loop running
    Ready,
    /// Transport failed or session closed; terminal
    Offline,
}

/// A live connection to a KISS modem
pub struct ModemSession {
    /// Modem link, writes serialized by the mutex
    channel: SharedChannel,
    /// Session configuration
    config: SessionConfig,
    /// Cleared permanently on transport failure or close
    online: Arc<AtomicBool>,
    /// Set once the configuration handshake completed
    interface_ready: bool,
    /// Stop signal for the receive loop
    stop: Arc<AtomicBool>,
    /// Receive loop thread
    reader: Option<JoinHandle<()>>,
    /// Decoded traffic sink
    observer: Arc<dyn SessionObserver>,
}

impl ModemSession {
    /// Open the device named in `config` and start a session on it
    pub fn open(
        config: SessionConfig,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<Self, ModemError> {
        let channel = open_channel(&config).map_err(|e| {
            error!("Could not open port {}", config.port_name);
            e
        })?;
        Self::start(channel, config, observer)
    }

    /// Start a session on an already open channel.
    ///
    /// Waits for the modem to settle, sends the preamble, TX tail,
    /// persistence, slot time and flow control settings, then starts the
    /// receive loop. If any setting fails the session is dropped and the
    /// error returned.
    pub fn start(
        mut channel: Box<dyn ModemChannel>,
        config: SessionConfig,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<Self, ModemError> {
        let settle = config.settle_delay();
        if !settle.is_zero() {
            debug!(
                "Waiting {}ms for {} to initialise",
                settle.as_millis(),
                config.port_name
            );
            thread::sleep(settle);
        }
        // Drop anything the modem printed while booting
        channel.clear_input_buffer()?;

        let mut session = Self {
            channel: Arc::new(Mutex::new(channel)),
            config,
            online: Arc::new(AtomicBool::new(true)),
            interface_ready: false,
            stop: Arc::new(AtomicBool::new(false)),
            reader: None,
            observer,
        };
        info!("Port {} is now open", session.config.port_name);

        info!("Configuring KISS interface parameters...");
        if let Err(e) = session.configure() {
            error!("{} configuration failed: {}", session, e);
            session.online.store(false, Ordering::SeqCst);
            return Err(e);
        }
        session.interface_ready = true;
        info!("KISS interface configured");

        session.spawn_receive_loop()?;
        Ok(session)
    }

    fn configure(&self) -> Result<(), ModemError> {
        self.set_preamble(self.config.preamble_ms)?;
        self.set_tx_tail(self.config.tx_tail_ms)?;
        self.set_persistence(self.config.persistence)?;
        self.set_slot_time(self.config.slot_time_ms)?;
        self.set_flow_control(self.config.flow_control)
    }

    fn spawn_receive_loop(&mut self) -> Result<(), ModemError> {
        let receiver = ReceiveLoop {
            name: self.to_string(),
            channel: Arc::clone(&self.channel),
            online: Arc::clone(&self.online),
            stop: Arc::clone(&self.stop),
            observer: Arc::clone(&self.observer),
            poll_interval: self.config.poll_interval(),
            inter_byte_timeout: self.config.inter_byte_timeout(),
        };

        let handle = thread::Builder::new()
            .name(format!("kiss-rx-{}", self.config.port_name))
            .spawn(move || receiver.run())?;
        self.reader = Some(handle);
        Ok(())
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        if !self.interface_ready {
            SessionState::Closed
        } else if self.is_online() {
            SessionState::Ready
        } else {
            SessionState::Offline
        }
    }

    /// Whether the link is still usable
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Whether the configuration handshake completed
    pub fn is_ready(&self) -> bool {
        self.interface_ready
    }

    /// Session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Set the transmitter keyup delay
    pub fn set_preamble(&self, preamble_ms: i64) -> Result<(), ModemError> {
        let value = ms_to_ticks(preamble_ms);
        info!("Setting preamble to {} ({}ms)", value, preamble_ms);
        self.send_setting(Setting::Preamble, value)
    }

    /// Set the transmitter tail
    pub fn set_tx_tail(&self, tx_tail_ms: i64) -> Result<(), ModemError> {
        let value = ms_to_ticks(tx_tail_ms);
        debug!("Setting TX tail to {} ({}ms)", value, tx_tail_ms);
        self.send_setting(Setting::TxTail, value)
    }

    /// Set the CSMA persistence
    pub fn set_persistence(&self, persistence: i64) -> Result<(), ModemError> {
        let value = clamp_byte(persistence);
        debug!("Setting persistence to {}", value);
        self.send_setting(Setting::Persistence, value)
    }

    /// Set the CSMA slot time
    pub fn set_slot_time(&self, slot_time_ms: i64) -> Result<(), ModemError> {
        let value = ms_to_ticks(slot_time_ms);
        debug!("Setting slot time to {} ({}ms)", value, slot_time_ms);
        self.send_setting(Setting::SlotTime, value)
    }

    /// Send the flow control / host ready command.
    ///
    /// The modem is always told the host is ready; `enabled` is only logged.
    pub fn set_flow_control(&self, enabled: bool) -> Result<(), ModemError> {
        debug!("Signalling host ready (flow control {})", enabled);
        self.send_setting(Setting::FlowControl, 0x01)
    }

    /// Turn on modem diagnostics
    pub fn enable_diagnostics(&self) -> Result<(), ModemError> {
        info!("Enabling KISS interface diagnostics");
        self.send_setting(Setting::Diagnostics, 0x01)
    }

    /// Turn off modem diagnostics
    pub fn disable_diagnostics(&self) -> Result<(), ModemError> {
        info!("Disabling KISS interface diagnostics");
        self.send_setting(Setting::Diagnostics, 0x00)
    }

    /// Request an audio peak reading
    pub fn ask_for_peak(&self) -> Result<(), ModemError> {
        self.send_setting(Setting::PeakPoll, 0x01)
    }

    /// Send an application payload as a DATA frame
    pub fn send_data(&self, payload: &[u8]) -> Result<(), ModemError> {
        self.ensure_online()?;
        let bytes = Frame::data(payload).to_bytes();
        let written = write_frame(&self.channel, &bytes)?;
        if written != bytes.len() {
            return Err(ModemError::IncompleteWrite {
                written,
                expected: bytes.len(),
            });
        }
        debug!("Sent data frame {}", pretty_hexrep(payload));
        Ok(())
    }

    fn send_setting(&self, setting: Setting, value: u8) -> Result<(), ModemError> {
        self.ensure_online()?;
        write_command(&self.channel, setting, value)
    }

    fn ensure_online(&self) -> Result<(), ModemError> {
        if self.is_online() {
            Ok(())
        } else {
            Err(ModemError::Offline)
        }
    }

    /// Stop the receive loop and wait for it to finish.
    ///
    /// The session is offline afterwards.
    pub fn close(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.reader.take() {
            if handle.join().is_err() {
                warn!("Receive loop for {} panicked", self);
            }
        }
        self.online.store(false, Ordering::SeqCst);
    }
}

impl fmt::Display for ModemSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KISSInterface[{}]", self.config.name)
    }
}

impl Drop for ModemSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn lock_channel(
    channel: &SharedChannel,
) -> Result<MutexGuard<'_, Box<dyn ModemChannel>>, ModemError> {
    channel.lock().map_err(|_| ModemError::ChannelPoisoned)
}

/// Write an encoded frame, returning the number of bytes the channel accepted
fn write_frame(channel: &SharedChannel, bytes: &[u8]) -> Result<usize, ModemError> {
    let mut channel = lock_channel(channel)?;
    Ok(channel.write(bytes)?)
}

/// Write a single-byte command frame for `setting`
fn write_command(channel: &SharedChannel, setting: Setting, value: u8) -> Result<(), ModemError> {
    let bytes = Frame::command(setting.command(), value).to_bytes();
    let written = write_frame(channel, &bytes)?;
    if written != bytes.len() {
        return Err(ModemError::Configuration {
            setting,
            written,
            expected: bytes.len(),
        });
    }
    Ok(())
}

/// State moved onto the receive thread
struct ReceiveLoop {
    name: String,
    channel: SharedChannel,
    online: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    observer: Arc<dyn SessionObserver>,
    poll_interval: Duration,
    inter_byte_timeout: Duration,
}

impl ReceiveLoop {
    fn run(self) {
        let result = self.process();
        self.online.store(false, Ordering::SeqCst);

        match result {
            Ok(()) => info!("Receive loop for {} stopped", self.name),
            Err(e) => {
                error!("A serial port error occurred: {}", e);
                error!(
                    "The interface {} is now offline. Open a new session to reconnect.",
                    self.name
                );
                self.observer.on_offline(&e);
            }
        }
    }

    fn process(&self) -> Result<(), ModemError> {
        let mut decoder = FrameDecoder::with_timeout(self.inter_byte_timeout);

        while !self.stop.load(Ordering::SeqCst) {
            match self.read_byte()? {
                Some(byte) => {
                    if let Some(frame) = decoder.push(byte, Instant::now()) {
                        self.dispatch(frame);
                    }
                }
                None => {
                    decoder.check_idle(Instant::now());
                    thread::sleep(self.poll_interval);
                    if self.stop.load(Ordering::SeqCst) {
                        break;
                    }
                    write_command(&self.channel, Setting::PeakPoll, 0x01)?;
                }
            }
        }
        Ok(())
    }

    /// Read one byte if the channel has any pending
    fn read_byte(&self) -> Result<Option<u8>, ModemError> {
        let mut channel = lock_channel(&self.channel)?;
        if channel.bytes_to_read()? == 0 {
            return Ok(None);
        }

        let mut byte = [0u8; 1];
        match channel.read(&mut byte) {
            Ok(1) => Ok(Some(byte[0])),
            Ok(_) => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "modem link closed").into()),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn dispatch(&self, frame: Frame) {
        match frame.command {
            Command::Data => {
                debug!("Received data frame {}", pretty_hexrep(&frame.payload));
                self.observer.on_data_frame(&frame.payload);
            }
            Command::AudioPeak => {
                if let Some(peak) = frame.peak_value() {
                    self.observer.on_peak_value(peak);
                }
            }
            other => debug!("Ignoring {:?} frame", other),
        }
    }
}
