use crate::error::BridgeError;
use rubato::{FftFixedIn, Resampler};
use tracing::trace;

/// Largest input block handed to the FFT resampler
const CHUNK_FRAMES: usize = 1024;

/// Bring synthesized audio to the telephony rate
///
/// Any input rate is accepted. Each synthesized chunk is resampled on its
/// own with an FFT resampler, so the result is band-limited to the target
/// rate and has exactly `len * target_rate / sample_rate` samples.
pub fn to_telephony_rate(
    samples: Vec<i16>,
    sample_rate: u32,
    target_rate: u32,
) -> Result<Vec<i16>, BridgeError> {
    if sample_rate == 0 || target_rate == 0 {
        return Err(BridgeError::Transcode(format!(
            "cannot convert {}Hz audio to {}Hz",
            sample_rate, target_rate
        )));
    }

    if sample_rate == target_rate || samples.is_empty() {
        return Ok(samples);
    }

    let expected = (samples.len() as u64 * target_rate as u64 / sample_rate as u64) as usize;
    if expected == 0 {
        return Ok(Vec::new());
    }

    let mut resampler = FftFixedIn::<f32>::new(
        sample_rate as usize,
        target_rate as usize,
        samples.len().min(CHUNK_FRAMES),
        2, // sub chunks
        1, // mono
    )
    .map_err(|e| BridgeError::Transcode(e.to_string()))?;

    let input: Vec<f32> = samples.iter().map(|&s| s as f32 / 32768.0).collect();

    // The resampler delays its output, so keep feeding (zero padded past
    // the end of the input) until the delayed tail has come out
    let delay = resampler.output_delay();
    let mut output: Vec<f32> = Vec::with_capacity(expected + delay + CHUNK_FRAMES);
    let mut pos = 0;

    while output.len() < delay + expected {
        let needed = resampler.input_frames_next();
        let mut block = vec![0.0f32; needed];
        if pos < input.len() {
            let end = (pos + needed).min(input.len());
            block[..end - pos].copy_from_slice(&input[pos..end]);
        }
        pos += needed;

        let resampled = resampler
            .process(&[block], None)
            .map_err(|e| BridgeError::Transcode(e.to_string()))?;
        output.extend_from_slice(&resampled[0]);
    }

    trace!("Resampled {} -> {} samples", samples.len(), expected);

    Ok(output[delay..delay + expected]
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
        .collect())
}
