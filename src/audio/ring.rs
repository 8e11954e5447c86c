// Bounded PCM FIFO that drops the oldest samples on overflow
//
// Shared by the translation adapter (inbound audio held across backend
// reconnects) and the outbound scheduler (synthesized audio waiting for
// playout). Pushing never blocks and never grows past `capacity`.

use std::collections::VecDeque;

#[derive(Debug)]
pub struct PcmRing {
    samples: VecDeque<i16>,
    capacity: usize,
    dropped: u64,
}

impl PcmRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Ring sized to hold `duration_ms` of audio at `sample_rate`
    pub fn with_duration(sample_rate: u32, duration_ms: u64) -> Self {
        Self::new((sample_rate as u64 * duration_ms / 1000) as usize)
    }

    /// Append samples, evicting the oldest ones if the ring is full
    ///
    /// Returns how many samples were dropped by this push.
    pub fn push(&mut self, pcm: &[i16]) -> usize {
        // Only the newest `capacity` samples of an oversized push can survive
        let incoming = if pcm.len() > self.capacity {
            &pcm[pcm.len() - self.capacity..]
        } else {
            pcm
        };
        let mut dropped = pcm.len() - incoming.len();

        let overflow = (self.samples.len() + incoming.len()).saturating_sub(self.capacity);
        if overflow > 0 {
            self.samples.drain(..overflow);
            dropped += overflow;
        }
        self.samples.extend(incoming.iter().copied());

        self.dropped += dropped as u64;
        dropped
    }

    /// Put samples back ahead of the queued ones
    ///
    /// Used when audio taken from the ring could not be delivered. Only as
    /// much of the newest part of `pcm` as fits is kept, since everything
    /// already queued is newer. Returns how many samples were dropped.
    pub fn push_front(&mut self, pcm: &[i16]) -> usize {
        let room = self.capacity - self.samples.len().min(self.capacity);
        let keep = pcm.len().min(room);
        let dropped = pcm.len() - keep;

        for &sample in pcm[dropped..].iter().rev() {
            self.samples.push_front(sample);
        }

        self.dropped += dropped as u64;
        dropped
    }

    /// Remove up to `n` samples from the front
    pub fn pop(&mut self, n: usize) -> Vec<i16> {
        let n = n.min(self.samples.len());
        self.samples.drain(..n).collect()
    }

    /// Remove everything
    pub fn take_all(&mut self) -> Vec<i16> {
        self.samples.drain(..).collect()
    }

    /// Discard everything, returning how many samples were discarded
    pub fn clear(&mut self) -> usize {
        let n = self.samples.len();
        self.samples.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total samples evicted over the ring's lifetime
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
