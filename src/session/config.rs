use crate::audio::SchedulerConfig;
use crate::config::{Config, FailurePolicy};
use crate::translation::{AdapterConfig, LanguagePair};
use std::time::Duration;

/// Configuration for one call session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Telephony sample rate (µ-law calls are 8kHz)
    pub sample_rate: u32,

    /// Duration of one media frame in both directions
    pub frame_duration: Duration,

    /// Languages used when the start signal carries none
    pub default_languages: LanguagePair,

    /// Translation adapter settings (buffering, reconnects, close grace)
    pub adapter: AdapterConfig,

    /// Outbound scheduler settings (queue cap, barge-in, padding)
    pub scheduler: SchedulerConfig,

    /// What to do once the backend cannot be recovered
    pub on_failure: FailurePolicy,

    /// Upper bound on playing out queued audio after stop
    pub drain_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for SessionConfig {
    fn from(config: &Config) -> Self {
        let telephony = &config.telephony;
        let translation = &config.translation;
        let playout = &config.playout;
        let frame_duration = Duration::from_millis(telephony.frame_ms);

        Self {
            sample_rate: telephony.sample_rate,
            frame_duration,
            default_languages: LanguagePair::new(
                translation.source_language.clone(),
                translation.target_language.clone(),
            ),
            adapter: AdapterConfig {
                sample_rate: telephony.sample_rate,
                buffer: Duration::from_millis(translation.buffer_ms),
                connect_timeout: Duration::from_millis(translation.connect_timeout_ms),
                max_reconnect_attempts: translation.max_reconnect_attempts,
                reconnect_base: Duration::from_millis(translation.reconnect_base_ms),
                reconnect_max: Duration::from_millis(translation.reconnect_max_ms),
                close_grace: Duration::from_millis(translation.close_grace_ms),
                ..AdapterConfig::default()
            },
            scheduler: SchedulerConfig {
                sample_rate: telephony.sample_rate,
                frame_duration,
                max_queue: Duration::from_millis(playout.max_queue_ms),
                underrun_padding: Duration::from_millis(playout.underrun_padding_ms),
                barge_in: playout.barge_in,
            },
            on_failure: translation.on_failure,
            drain_timeout: Duration::from_millis(playout.drain_timeout_ms),
        }
    }
}
