// G.711 µ-law transcoding between 8-bit companded samples and 16-bit linear PCM
//
// Decoding goes through a 256-entry table built at compile time, so the only
// process-wide state is immutable and needs no locking. Encoding is the
// inverse segment/mantissa compression with the standard 0x84 bias.
//
// Both directions are total over their input types: callers hand in a `u8`
// or an `i16`, so there is no out-of-range input to reject.

/// Bias added before segment search (G.711)
const BIAS: i32 = 0x84;

/// Largest magnitude that still fits the top segment after biasing
const CLIP: i32 = 32635;

/// µ-law byte → linear sample lookup table
pub static MULAW_TO_LINEAR: [i16; 256] = build_decode_table();

const fn decode_byte(byte: u8) -> i16 {
    let u = !byte;
    let exponent = ((u >> 4) & 0x07) as i32;
    let mantissa = (u & 0x0F) as i32;
    let magnitude = (((mantissa << 3) + BIAS) << exponent) - BIAS;
    if u & 0x80 != 0 {
        -magnitude as i16
    } else {
        magnitude as i16
    }
}

const fn build_decode_table() -> [i16; 256] {
    let mut table = [0i16; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = decode_byte(i as u8);
        i += 1;
    }
    table
}

/// Decode one µ-law byte to a 16-bit linear sample
#[inline]
pub fn decode(byte: u8) -> i16 {
    MULAW_TO_LINEAR[byte as usize]
}

/// Encode one 16-bit linear sample to a µ-law byte
pub fn encode(sample: i16) -> u8 {
    let mut magnitude = sample as i32;
    let sign = if magnitude < 0 {
        magnitude = -magnitude;
        0x80
    } else {
        0x00
    };

    let biased = magnitude.min(CLIP) + BIAS;

    // Segment = position of the highest set bit above bit 7
    let mut exponent = 7;
    let mut mask = 0x4000;
    while exponent > 0 && biased & mask == 0 {
        exponent -= 1;
        mask >>= 1;
    }

    let mantissa = (biased >> (exponent + 3)) & 0x0F;
    !((sign | (exponent << 4) | mantissa) as u8)
}

/// Decode a µ-law payload into linear PCM
pub fn decode_buffer(bytes: &[u8]) -> Vec<i16> {
    bytes.iter().map(|&b| decode(b)).collect()
}

/// Encode linear PCM into a µ-law payload
pub fn encode_buffer(samples: &[i16]) -> Vec<u8> {
    samples.iter().map(|&s| encode(s)).collect()
}

/// Quantization step of the segment a µ-law byte belongs to
///
/// Upper bound on `|decode(encode(s)) - s|` for any sample that encodes to `byte`.
pub fn quantization_step(byte: u8) -> i32 {
    let exponent = ((!byte >> 4) & 0x07) as i32;
    8 << exponent
}
