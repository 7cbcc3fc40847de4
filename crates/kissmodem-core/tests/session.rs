use kissmodem_core::protocol::{
    Command, Frame, ModemChannel, ModemError, ModemSession, SessionConfig, SessionObserver,
    SessionState, Setting,
};
use pretty_assertions::assert_eq;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const PEAK_POLL: [u8; 4] = [0xC0, 0x12, 0x01, 0xC0];

/// Shared state behind the mock modem link
#[derive(Default)]
struct MockState {
    incoming: VecDeque<u8>,
    written: Vec<Vec<u8>>,
    /// Frames with this command byte are written one byte short
    short_write_command: Option<u8>,
    fail_io: bool,
    cleared: usize,
}

/// Mock serial link; clones share state so the test can inspect traffic
#[derive(Clone, Default)]
struct MockChannel {
    state: Arc<Mutex<MockState>>,
}

impl MockChannel {
    fn feed(&self, bytes: &[u8]) {
        self.state.lock().unwrap().incoming.extend(bytes);
    }

    fn written(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().written.clone()
    }

    /// Writes other than idle peak polls
    fn commands(&self) -> Vec<Vec<u8>> {
        self.written()
            .into_iter()
            .filter(|w| w.as_slice() != PEAK_POLL)
            .collect()
    }

    fn fail(&self) {
        self.state.lock().unwrap().fail_io = true;
    }
}

impl Read for MockChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        if state.fail_io {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        let mut n = 0;
        while n < buf.len() {
            match state.incoming.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

impl Write for MockChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        if state.fail_io {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        let len = match state.short_write_command {
            Some(cmd) if buf.get(1) == Some(&cmd) => buf.len() - 1,
            _ => buf.len(),
        };
        state.written.push(buf[..len].to_vec());
        Ok(len)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ModemChannel for MockChannel {
    fn bytes_to_read(&mut self) -> io::Result<u32> {
        let state = self.state.lock().unwrap();
        if state.fail_io {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        Ok(state.incoming.len() as u32)
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.incoming.clear();
        state.cleared += 1;
        Ok(())
    }
}

#[derive(Default)]
struct RecordingObserver {
    data: Mutex<Vec<Vec<u8>>>,
    peaks: Mutex<Vec<i8>>,
    offline: Mutex<Vec<String>>,
}

impl SessionObserver for RecordingObserver {
    fn on_data_frame(&self, payload: &[u8]) {
        self.data.lock().unwrap().push(payload.to_vec());
    }

    fn on_peak_value(&self, peak: i8) {
        self.peaks.lock().unwrap().push(peak);
    }

    fn on_offline(&self, error: &ModemError) {
        self.offline.lock().unwrap().push(error.to_string());
    }
}

fn test_config() -> SessionConfig {
    SessionConfig::new("mock")
        .with_name("Test Modem")
        .with_preamble_ms(150)
        .with_tx_tail_ms(10)
        .with_persistence(255)
        .with_slot_time_ms(20)
        .with_settle_delay(Duration::ZERO)
        .with_poll_interval(Duration::from_millis(5))
}

fn start_session(
    config: SessionConfig,
) -> (ModemSession, MockChannel, Arc<RecordingObserver>) {
    let channel = MockChannel::default();
    let observer = Arc::new(RecordingObserver::default());
    let session = ModemSession::start(Box::new(channel.clone()), config, observer.clone())
        .expect("session should start");
    (session, channel, observer)
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

#[test]
fn test_start_sends_configuration_in_order() {
    let (session, channel, _observer) = start_session(test_config());

    assert_eq!(session.state(), SessionState::Ready);
    assert!(session.is_online());
    assert!(session.is_ready());
    assert_eq!(channel.state.lock().unwrap().cleared, 1);

    let written = channel.written();
    assert_eq!(
        written[..5].to_vec(),
        vec![
            vec![0xC0, 0x01, 15, 0xC0],
            vec![0xC0, 0x04, 1, 0xC0],
            vec![0xC0, 0x02, 255, 0xC0],
            vec![0xC0, 0x03, 2, 0xC0],
            vec![0xC0, 0x0F, 0x01, 0xC0],
        ]
    );
}

#[test]
fn test_idle_link_is_polled_for_peak() {
    let (_session, channel, _observer) = start_session(test_config());
    assert!(wait_until(|| channel
        .written()
        .iter()
        .filter(|w| w.as_slice() == PEAK_POLL)
        .count()
        >= 3));
}

#[test]
fn test_data_frame_reaches_observer() {
    let (_session, channel, observer) = start_session(test_config());
    channel.feed(&[0xC0, 0x00, 0x41, 0xDB, 0xDC, 0x42, 0xC0]);

    assert!(wait_until(|| !observer.data.lock().unwrap().is_empty()));
    assert_eq!(
        observer.data.lock().unwrap().clone(),
        vec![vec![0x41, 0xC0, 0x42]]
    );
}

#[test]
fn test_peak_reply_reaches_observer() {
    let (_session, channel, observer) = start_session(test_config());
    channel.feed(&[0xC0, 0x12, 0xF6, 0xC0]);

    assert!(wait_until(|| !observer.peaks.lock().unwrap().is_empty()));
    assert_eq!(observer.peaks.lock().unwrap().clone(), vec![-10]);
}

#[test]
fn test_stalled_frame_is_discarded() {
    let config = SessionConfig {
        inter_byte_timeout_ms: 20,
        ..test_config()
    };
    let (_session, channel, observer) = start_session(config);

    channel.feed(&[0xC0, 0x00, 0x41]);
    // Several idle ticks pass the inter-byte timeout
    std::thread::sleep(Duration::from_millis(150));
    channel.feed(&Frame::data(vec![0x42]).to_bytes());

    assert!(wait_until(|| !observer.data.lock().unwrap().is_empty()));
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(observer.data.lock().unwrap().clone(), vec![vec![0x42]]);
}

#[test]
fn test_setting_clamps() {
    let (session, channel, _observer) = start_session(test_config());

    session.set_preamble(3000).unwrap();
    session.set_preamble(-5).unwrap();
    session.set_preamble(120).unwrap();

    let preambles: Vec<Vec<u8>> = channel
        .commands()
        .into_iter()
        .filter(|w| w[1] == Command::TxDelay.as_byte())
        .collect();
    assert_eq!(
        preambles,
        vec![
            vec![0xC0, 0x01, 15, 0xC0],
            vec![0xC0, 0x01, 255, 0xC0],
            vec![0xC0, 0x01, 0, 0xC0],
            vec![0xC0, 0x01, 12, 0xC0],
        ]
    );
}

#[test]
fn test_diagnostics_commands() {
    let (session, channel, _observer) = start_session(test_config());

    session.enable_diagnostics().unwrap();
    session.disable_diagnostics().unwrap();

    let commands = channel.commands();
    assert_eq!(
        commands[5..].to_vec(),
        vec![vec![0xC0, 0x13, 0x01, 0xC0], vec![0xC0, 0x13, 0x00, 0xC0]]
    );
}

#[test]
fn test_send_data_escapes_payload() {
    let (session, channel, _observer) = start_session(test_config());

    session.send_data(&[0x01, 0xC0, 0xDB]).unwrap();

    let commands = channel.commands();
    assert_eq!(
        commands.last().unwrap().clone(),
        vec![0xC0, 0x00, 0x01, 0xDB, 0xDC, 0xDB, 0xDD, 0xC0]
    );
}

#[test]
fn test_short_configuration_write_fails() {
    let channel = MockChannel::default();
    channel.state.lock().unwrap().short_write_command = Some(Command::TxTail.as_byte());
    let observer = Arc::new(RecordingObserver::default());

    let result = ModemSession::start(Box::new(channel.clone()), test_config(), observer);
    match result {
        Err(ModemError::Configuration {
            setting,
            written,
            expected,
        }) => {
            assert_eq!(setting, Setting::TxTail);
            assert_eq!(written, 3);
            assert_eq!(expected, 4);
        }
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("short write must not be ignored"),
    }

    // Nothing after the failing setting was sent
    assert_eq!(channel.written().len(), 2);
}

#[test]
fn test_short_write_on_reconfiguration() {
    let (session, channel, _observer) = start_session(test_config());
    channel.state.lock().unwrap().short_write_command = Some(Command::SlotTime.as_byte());

    let err = session.set_slot_time(50).unwrap_err();
    assert!(matches!(
        err,
        ModemError::Configuration {
            setting: Setting::SlotTime,
            ..
        }
    ));
    assert!(err.to_string().contains("slot time"));
}

#[test]
fn test_transport_failure_takes_session_offline() {
    let (session, channel, observer) = start_session(test_config());
    channel.fail();

    assert!(wait_until(|| !session.is_online()));
    assert_eq!(session.state(), SessionState::Offline);
    assert!(wait_until(|| !observer.offline.lock().unwrap().is_empty()));
    assert!(observer.offline.lock().unwrap()[0].contains("device unplugged"));

    assert!(matches!(session.set_preamble(100), Err(ModemError::Offline)));
    assert!(matches!(session.send_data(b"x"), Err(ModemError::Offline)));
}

#[test]
fn test_close_stops_receive_loop() {
    let (mut session, channel, observer) = start_session(test_config());
    session.close();

    assert_eq!(session.state(), SessionState::Offline);
    let count = channel.written().len();
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(channel.written().len(), count);
    // A clean stop is not reported as a failure
    assert!(observer.offline.lock().unwrap().is_empty());
    assert!(matches!(session.ask_for_peak(), Err(ModemError::Offline)));
}

#[test]
fn test_session_display() {
    let (session, _channel, _observer) = start_session(test_config());
    assert_eq!(session.to_string(), "KISSInterface[Test Modem]");
}
