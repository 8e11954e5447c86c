use super::codec;

/// Which way a frame travels relative to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Audio from the caller
    Inbound,
    /// Audio played back to the caller
    Outbound,
}

/// Sample representation carried by a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePayload {
    /// 8-bit µ-law bytes, as carried on the telephony leg
    Companded(Vec<u8>),
    /// 16-bit linear PCM
    Linear(Vec<i16>),
}

/// A fixed-size, timestamped chunk of call audio
///
/// Frames are value objects: transcoding produces a new frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub direction: Direction,
    /// Position in this direction's frame sequence
    pub sequence: u64,
    /// Media time of the first sample, in milliseconds since stream start
    pub timestamp_ms: u64,
    pub payload: FramePayload,
}

impl AudioFrame {
    pub fn companded(direction: Direction, sequence: u64, timestamp_ms: u64, bytes: Vec<u8>) -> Self {
        Self {
            direction,
            sequence,
            timestamp_ms,
            payload: FramePayload::Companded(bytes),
        }
    }

    pub fn linear(direction: Direction, sequence: u64, timestamp_ms: u64, samples: Vec<i16>) -> Self {
        Self {
            direction,
            sequence,
            timestamp_ms,
            payload: FramePayload::Linear(samples),
        }
    }

    /// Number of samples regardless of representation
    pub fn len(&self) -> usize {
        match &self.payload {
            FramePayload::Companded(bytes) => bytes.len(),
            FramePayload::Linear(samples) => samples.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert to linear PCM (no-op if already linear)
    pub fn into_linear(self) -> Self {
        match self.payload {
            FramePayload::Companded(bytes) => Self {
                payload: FramePayload::Linear(codec::decode_buffer(&bytes)),
                ..self
            },
            FramePayload::Linear(_) => self,
        }
    }

    /// Convert to µ-law (no-op if already companded)
    pub fn into_companded(self) -> Self {
        match self.payload {
            FramePayload::Linear(samples) => Self {
                payload: FramePayload::Companded(codec::encode_buffer(&samples)),
                ..self
            },
            FramePayload::Companded(_) => self,
        }
    }

    /// Linear samples, if this frame is linear
    pub fn samples(&self) -> Option<&[i16]> {
        match &self.payload {
            FramePayload::Linear(samples) => Some(samples),
            FramePayload::Companded(_) => None,
        }
    }

    /// µ-law bytes, if this frame is companded
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.payload {
            FramePayload::Companded(bytes) => Some(bytes),
            FramePayload::Linear(_) => None,
        }
    }

    /// True when every sample is digital silence
    pub fn is_silent(&self) -> bool {
        match &self.payload {
            FramePayload::Linear(samples) => samples.iter().all(|&s| s == 0),
            FramePayload::Companded(bytes) => bytes.iter().all(|&b| codec::decode(b) == 0),
        }
    }
}
