use kissmodem_core::protocol::{
    escape, ms_to_ticks, Command, DecoderPhase, Frame, FrameDecoder, FEND, FESC, MAX_PAYLOAD,
};
use pretty_assertions::assert_eq;
use std::time::{Duration, Instant};

/// Deterministic payload covering every byte value, reserved bytes included
fn payload_of(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + 3) as u8).collect()
}

#[test]
fn test_data_roundtrip_with_reserved_bytes() {
    let payload = vec![0xC0, 0x41, 0xDB, 0xDB, 0xC0, 0xDC, 0xDD, 0x00];
    let encoded = Frame::data(payload.clone()).to_bytes();

    let mut decoder = FrameDecoder::new();
    let frames = decoder.decode(&encoded);
    assert_eq!(frames, vec![Frame::data(payload)]);
}

#[test]
fn test_data_roundtrip_various_lengths() {
    for len in [0, 1, 2, 64, 255, 256, 610, MAX_PAYLOAD] {
        let payload = payload_of(len);
        let encoded = Frame::data(payload.clone()).to_bytes();
        let frames = FrameDecoder::new().decode(&encoded);
        assert_eq!(frames.len(), 1, "length {}", len);
        assert_eq!(frames[0].payload, payload, "length {}", len);
    }
}

#[test]
fn test_frame_length_without_reserved_bytes() {
    let payload = b"hello modem".to_vec();
    let encoded = Frame::data(payload.clone()).to_bytes();
    assert_eq!(encoded.len(), payload.len() + 3);
    assert_eq!(encoded[0], FEND);
    assert_eq!(encoded[1], Command::Data.as_byte());
    assert_eq!(&encoded[2..encoded.len() - 1], payload.as_slice());
    assert_eq!(*encoded.last().unwrap(), FEND);
}

#[test]
fn test_each_reserved_byte_adds_one() {
    let payload = vec![0x01, FEND, 0x02, FESC, FESC];
    let encoded = Frame::data(payload.clone()).to_bytes();
    assert_eq!(encoded.len(), payload.len() + 3 + 3);
    assert_eq!(escape(&payload).len(), payload.len() + 3);
}

#[test]
fn test_decoder_never_exceeds_max_payload() {
    let mut stream = vec![FEND, 0x00];
    stream.extend(payload_of(MAX_PAYLOAD * 2).into_iter().filter(|&b| b != FEND && b != FESC));
    stream.push(FEND);

    let frames = FrameDecoder::new().decode(&stream);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].payload.len(), MAX_PAYLOAD);
}

#[test]
fn test_known_data_stream() {
    let frames = FrameDecoder::new().decode(&[0xC0, 0x00, 0x41, 0xDB, 0xDC, 0x42, 0xC0]);
    assert_eq!(frames, vec![Frame::data(vec![0x41, 0xC0, 0x42])]);
}

#[test]
fn test_known_peak_stream() {
    let frames = FrameDecoder::new().decode(&[0xC0, 0x12, 0xF6, 0xC0]);
    assert_eq!(frames, vec![Frame::command(Command::AudioPeak, 0xF6)]);
    assert_eq!(frames[0].peak_value(), Some(-10));
}

#[test]
fn test_peak_between_data_frames() {
    let mut stream = Frame::data(vec![0x10]).to_bytes();
    stream.extend([0xC0, 0x12, 0x05, 0xC0]);
    stream.extend(Frame::data(vec![0x20, 0xC0]).to_bytes());

    let frames = FrameDecoder::new().decode(&stream);
    assert_eq!(
        frames,
        vec![
            Frame::data(vec![0x10]),
            Frame::command(Command::AudioPeak, 0x05),
            Frame::data(vec![0x20, 0xC0]),
        ]
    );
}

#[test]
fn test_stalled_frame_then_valid_frame() {
    let mut decoder = FrameDecoder::with_timeout(Duration::from_millis(100));
    let start = Instant::now();
    for b in [0xC0, 0x00, 0x41] {
        assert!(decoder.push(b, start).is_none());
    }

    assert!(decoder.check_idle(start + Duration::from_millis(101)));
    assert_eq!(decoder.phase(), DecoderPhase::Idle);

    let later = start + Duration::from_millis(200);
    let frames: Vec<Frame> = Frame::data(vec![0x42])
        .to_bytes()
        .into_iter()
        .filter_map(|b| decoder.push(b, later))
        .collect();
    assert_eq!(frames, vec![Frame::data(vec![0x42])]);
}

#[test]
fn test_without_idle_check_stale_bytes_leak() {
    // Without the timeout, the next opening FEND closes the stalled DATA frame
    let mut decoder = FrameDecoder::new();
    let mut stream = vec![0xC0, 0x00, 0x41];
    stream.extend(Frame::data(vec![0x42]).to_bytes());
    let frames = decoder.decode(&stream);
    assert_eq!(frames[0], Frame::data(vec![0x41]));
}

#[test]
fn test_lazy_frames_iterator() {
    let mut decoder = FrameDecoder::new();
    let bytes = [Frame::data(vec![1]).to_bytes(), Frame::data(vec![2]).to_bytes()].concat();
    let mut frames = decoder.frames(bytes);
    assert_eq!(frames.next(), Some(Frame::data(vec![1])));
    assert_eq!(frames.next(), Some(Frame::data(vec![2])));
    assert_eq!(frames.next(), None);
}

#[test]
fn test_config_clamp() {
    assert_eq!(ms_to_ticks(3000), 255);
    assert_eq!(ms_to_ticks(-5), 0);
    assert_eq!(ms_to_ticks(120), 12);
    assert_eq!(
        Frame::command(Command::TxDelay, ms_to_ticks(120)).to_bytes(),
        vec![0xC0, 0x01, 0x0C, 0xC0]
    );
}
