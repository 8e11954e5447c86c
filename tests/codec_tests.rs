// Integration tests for G.711 µ-law transcoding and rate adaptation

use callbridge::audio::codec::{decode, decode_buffer, encode, encode_buffer, quantization_step};
use callbridge::audio::resample::to_telephony_rate;
use callbridge::audio::{AudioFrame, Direction};
use callbridge::error::BridgeError;

#[test]
fn test_decode_reference_values() {
    assert_eq!(decode(0xFF), 0, "0xFF is positive zero");
    assert_eq!(decode(0x7F), 0, "0x7F is negative zero");
    assert_eq!(decode(0x00), -32124);
    assert_eq!(decode(0x80), 32124);
    assert_eq!(decode(16), -15996);
    assert_eq!(decode(112), -120);
}

#[test]
fn test_encode_decode_round_trip_all_bytes() {
    for byte in 0..=255u8 {
        let expected = if byte == 0x7F { 0xFF } else { byte };
        assert_eq!(
            encode(decode(byte)),
            expected,
            "byte {:#04x} decodes to {}",
            byte,
            decode(byte)
        );
    }
}

#[test]
fn test_encode_error_within_quantization_step() {
    for sample in i16::MIN..=i16::MAX {
        let byte = encode(sample);
        let error = (decode(byte) as i32 - sample as i32).abs();
        assert!(
            error <= quantization_step(byte),
            "sample {} -> {:#04x} -> {} (error {})",
            sample,
            byte,
            decode(byte),
            error
        );
    }
}

#[test]
fn test_encode_extremes_clip_to_top_segment() {
    assert_eq!(encode(i16::MAX), 0x80);
    assert_eq!(encode(i16::MIN), 0x00);
    assert_eq!(encode(0), 0xFF);
}

#[test]
fn test_buffers_preserve_length() {
    let bytes: Vec<u8> = (0..=255).collect();
    let pcm = decode_buffer(&bytes);
    assert_eq!(pcm.len(), 256);
    assert_eq!(encode_buffer(&pcm).len(), 256);

    assert!(decode_buffer(&[]).is_empty());
    assert!(encode_buffer(&[]).is_empty());
}

#[test]
fn test_frame_conversion_keeps_identity() {
    let frame = AudioFrame::companded(Direction::Inbound, 7, 140, vec![0xFF; 160]);
    let linear = frame.into_linear();

    assert_eq!(linear.sequence, 7);
    assert_eq!(linear.timestamp_ms, 140);
    assert_eq!(linear.direction, Direction::Inbound);
    assert_eq!(linear.samples().map(|s| s.len()), Some(160));
    assert!(linear.is_silent());

    let back = linear.into_companded();
    assert_eq!(back.bytes(), Some(&[0xFFu8; 160][..]));
}

#[test]
fn test_resample_passthrough_at_telephony_rate() {
    let samples = vec![1, 2, 3, 4];
    assert_eq!(to_telephony_rate(samples.clone(), 8000, 8000), Ok(samples));
}

fn tone(frequency: f64, sample_rate: u32, amplitude: f64, len: usize) -> Vec<i16> {
    (0..len)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            (amplitude * (2.0 * std::f64::consts::PI * frequency * t).sin()) as i16
        })
        .collect()
}

fn peak(samples: &[i16]) -> i32 {
    samples.iter().map(|&s| (s as i32).abs()).max().unwrap_or(0)
}

#[test]
fn test_resample_output_length_follows_rate_ratio() {
    for (rate, len) in [(16000, 320), (22050, 441), (24000, 480), (44100, 882), (48000, 960)] {
        let out = to_telephony_rate(vec![0; len], rate, 8000).unwrap();
        assert_eq!(out.len(), 160, "{}Hz chunk of {} samples", rate, len);
    }
}

#[test]
fn test_resample_keeps_speech_band() {
    let input = tone(500.0, 22050, 10000.0, 4410);
    let out = to_telephony_rate(input, 22050, 8000).unwrap();

    assert_eq!(out.len(), 1600);
    let middle = peak(&out[200..1400]);
    assert!((9000..=10500).contains(&middle), "500Hz tone peak {}", middle);
}

#[test]
fn test_resample_removes_energy_above_nyquist() {
    // 6kHz cannot be carried at 8kHz and must not fold back as a 2kHz tone
    let input = tone(6000.0, 16000, 10000.0, 3200);
    let out = to_telephony_rate(input, 16000, 8000).unwrap();

    assert_eq!(out.len(), 1600);
    let middle = peak(&out[200..1400]);
    assert!(middle < 500, "aliased energy peak {}", middle);
}

#[test]
fn test_resample_rejects_zero_rates() {
    for (from, to) in [(0, 8000), (16000, 0)] {
        let result = to_telephony_rate(vec![0; 100], from, to);
        assert!(
            matches!(result, Err(BridgeError::Transcode(_))),
            "{}Hz -> {}Hz should be rejected",
            from,
            to
        );
    }
}
