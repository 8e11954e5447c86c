pub mod codec;
pub mod frame;
pub mod resample;
pub mod ring;
pub mod scheduler;

pub use frame::{AudioFrame, Direction, FramePayload};
pub use ring::PcmRing;
pub use scheduler::{BargeInPolicy, OutboundScheduler, PushOutcome, SchedulerConfig, SchedulerStats};

/// Telephony sample rate for µ-law media streams
pub const TELEPHONY_SAMPLE_RATE: u32 = 8000;
