// Outbound audio scheduler
//
// Synthesis delivers audio in bursts; the call wants one fixed-duration frame
// per tick. The scheduler holds synthesized PCM in a bounded FIFO and hands
// out exactly one frame per call to `next_frame`. The timer that calls it
// lives with the session (see `session::playout`).
//
// Policies:
// - The queue is capped (`max_queue`); overflow evicts the oldest audio so
//   translation lag cannot grow without bound.
// - Barge-in is an explicit choice (`BargeInPolicy`), never a side effect of
//   buffer sizing.
// - A partial last frame is zero-padded. When the queue runs dry mid-playback
//   the scheduler emits silence for up to `underrun_padding` before going idle.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::frame::{AudioFrame, Direction};
use super::ring::PcmRing;

/// What to do with queued playback when the caller starts talking again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BargeInPolicy {
    /// Let queued translated audio play out
    #[default]
    Finish,
    /// Drop queued translated audio immediately
    Flush,
}

/// Configuration for the outbound scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Telephony sample rate (8kHz for µ-law calls)
    pub sample_rate: u32,
    /// Duration of one outbound frame (matches the inbound cadence)
    pub frame_duration: Duration,
    /// Maximum queued audio before oldest-first eviction
    pub max_queue: Duration,
    /// How long to fill a starved queue with silence before going idle
    pub underrun_padding: Duration,
    pub barge_in: BargeInPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 8000,
            frame_duration: Duration::from_millis(20),
            max_queue: Duration::from_secs(5),
            underrun_padding: Duration::from_millis(200),
            barge_in: BargeInPolicy::Finish,
        }
    }
}

impl SchedulerConfig {
    pub fn frame_samples(&self) -> usize {
        samples_for(self.sample_rate, self.frame_duration)
    }
}

fn samples_for(sample_rate: u32, duration: Duration) -> usize {
    (sample_rate as u128 * duration.as_millis() / 1000) as usize
}

/// Result of pushing audio into the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Audio queued; `dropped` older samples were evicted to make room
    Accepted { dropped: usize },
    /// Scheduler is draining and no longer takes new audio
    Rejected,
}

/// Counters kept by the scheduler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub frames_emitted: u64,
    pub padded_frames: u64,
    pub dropped_samples: u64,
    pub flushed_samples: u64,
    pub rejected_pushes: u64,
}

pub struct OutboundScheduler {
    config: SchedulerConfig,
    queue: PcmRing,
    frame_samples: usize,
    padding_frames: u64,
    padding_left: u64,
    sequence: u64,
    accepting: bool,
    stats: SchedulerStats,
}

impl OutboundScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let frame_samples = config.frame_samples().max(1);
        let queue = PcmRing::new(samples_for(config.sample_rate, config.max_queue).max(frame_samples));
        let frame_ms = config.frame_duration.as_millis().max(1);
        let padding_frames = (config.underrun_padding.as_millis() / frame_ms) as u64;

        debug!(
            "Outbound scheduler: {} samples/frame, queue cap {} samples, barge-in {:?}",
            frame_samples,
            queue.capacity(),
            config.barge_in
        );

        Self {
            config,
            queue,
            frame_samples,
            padding_frames,
            padding_left: 0,
            sequence: 0,
            accepting: true,
            stats: SchedulerStats::default(),
        }
    }

    /// Queue synthesized audio. Never blocks.
    pub fn push(&mut self, pcm: &[i16]) -> PushOutcome {
        if !self.accepting {
            self.stats.rejected_pushes += 1;
            return PushOutcome::Rejected;
        }

        let dropped = self.queue.push(pcm);
        if dropped > 0 {
            self.stats.dropped_samples += dropped as u64;
            warn!(
                "Outbound queue over {}ms, dropped {} oldest samples",
                self.config.max_queue.as_millis(),
                dropped
            );
        }

        PushOutcome::Accepted { dropped }
    }

    /// Take the next frame for this tick, if there is anything to play
    pub fn next_frame(&mut self) -> Option<AudioFrame> {
        let samples = if !self.queue.is_empty() {
            let mut samples = self.queue.pop(self.frame_samples);
            if samples.len() < self.frame_samples {
                samples.resize(self.frame_samples, 0);
                self.stats.padded_frames += 1;
            }
            self.padding_left = self.padding_frames;
            samples
        } else if self.padding_left > 0 && self.accepting {
            self.padding_left -= 1;
            self.stats.padded_frames += 1;
            vec![0; self.frame_samples]
        } else {
            return None;
        };

        let sequence = self.sequence;
        self.sequence += 1;
        self.stats.frames_emitted += 1;

        let timestamp_ms = sequence * self.config.frame_duration.as_millis() as u64;
        Some(AudioFrame::linear(Direction::Outbound, sequence, timestamp_ms, samples))
    }

    /// Caller started speaking while audio may still be queued
    ///
    /// Returns true if queued audio was flushed.
    pub fn barge_in(&mut self) -> bool {
        match self.config.barge_in {
            BargeInPolicy::Finish => false,
            BargeInPolicy::Flush => {
                if self.queue.is_empty() {
                    return false;
                }
                self.flush();
                true
            }
        }
    }

    /// Discard all queued audio, returning how many samples were dropped
    pub fn flush(&mut self) -> usize {
        let flushed = self.queue.clear();
        self.padding_left = 0;
        self.stats.flushed_samples += flushed as u64;
        flushed
    }

    /// Stop accepting new audio; already queued audio still plays out
    pub fn begin_drain(&mut self) {
        self.accepting = false;
        self.padding_left = 0;
    }

    /// Draining and nothing left to play
    pub fn is_drained(&self) -> bool {
        !self.accepting && self.queue.is_empty()
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting
    }

    /// Number of samples waiting for playout
    pub fn queued_samples(&self) -> usize {
        self.queue.len()
    }

    pub fn queued_duration(&self) -> Duration {
        Duration::from_millis(self.queue.len() as u64 * 1000 / self.config.sample_rate.max(1) as u64)
    }

    pub fn frame_samples(&self) -> usize {
        self.frame_samples
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }
}
