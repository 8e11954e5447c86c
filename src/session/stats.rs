use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle phase of a call session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// Registered, no audio engine yet
    Init,
    /// Adapter open, audio flowing both ways
    Streaming,
    /// Stop requested, draining events and queued playback
    Stopping,
    /// Terminal, all resources released
    Closed,
}

/// Statistics about a call session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub call_sid: String,
    pub stream_sid: String,
    pub phase: SessionPhase,

    /// When the session was created
    pub started_at: DateTime<Utc>,

    /// Time since creation in seconds
    pub duration_secs: f64,

    pub source_language: Option<String>,
    pub target_language: Option<String>,

    /// Media frames pushed to translation
    pub inbound_frames: u64,

    /// Media frames dropped because the session was not streaming
    pub ignored_frames: u64,

    /// Frames played back to the caller
    pub outbound_frames: u64,

    pub partial_events: u64,
    pub final_events: u64,
    pub synthesized_chunks: u64,

    /// Inbound samples lost to the adapter's bounded buffer
    pub adapter_dropped_samples: u64,

    /// Synthesized samples lost to the outbound queue cap
    pub scheduler_dropped_samples: u64,

    /// Playout ticks that overran the frame duration
    pub late_ticks: u64,

    /// Times queued playback was flushed because the caller spoke
    pub barge_ins: u64,

    pub reconnects: u64,

    /// Times the outbound scheduler was stopped (at most once per session)
    pub scheduler_stops: u64,

    /// Translation lost and the call continues untranslated
    pub degraded: bool,
}
