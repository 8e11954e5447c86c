use crate::audio::BargeInPolicy;
use anyhow::{ensure, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub telephony: TelephonyConfig,
    pub translation: TranslationConfig,
    pub playout: PlayoutConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
    /// Host advertised in call-control markup; defaults to the request's Host header
    pub public_host: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "callbridge".to_string(),
            http: HttpConfig::default(),
            public_host: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelephonyConfig {
    pub sample_rate: u32,
    pub frame_ms: u64,
    /// Spoken to the caller before the media stream starts
    pub greeting: String,
    /// Number the call is forwarded to once streaming starts
    pub forward_to: Option<String>,
    pub dial_timeout_secs: u32,
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            sample_rate: 8000,
            frame_ms: 20,
            greeting: "Welcome to the translation service. Connecting you now.".to_string(),
            forward_to: None,
            dial_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Replays caller utterances; no external service
    #[default]
    Echo,
}

/// What a session does when the translation backend cannot be recovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Close the session (the media stream ends)
    #[default]
    Terminate,
    /// Keep the call up untranslated; queued audio still plays out
    Degrade,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub backend: BackendKind,
    pub source_language: String,
    pub target_language: String,
    /// Inbound audio buffered while the backend is slow or reconnecting
    pub buffer_ms: u64,
    pub connect_timeout_ms: u64,
    pub max_reconnect_attempts: u32,
    pub reconnect_base_ms: u64,
    pub reconnect_max_ms: u64,
    pub close_grace_ms: u64,
    pub on_failure: FailurePolicy,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Echo,
            source_language: "es-ES".to_string(),
            target_language: "en".to_string(),
            buffer_ms: 2000,
            connect_timeout_ms: 10_000,
            max_reconnect_attempts: 3,
            reconnect_base_ms: 250,
            reconnect_max_ms: 4000,
            close_grace_ms: 2000,
            on_failure: FailurePolicy::Terminate,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlayoutConfig {
    pub max_queue_ms: u64,
    pub barge_in: BargeInPolicy,
    pub underrun_padding_ms: u64,
    pub drain_timeout_ms: u64,
}

impl Default for PlayoutConfig {
    fn default() -> Self {
        Self {
            max_queue_ms: 5000,
            barge_in: BargeInPolicy::Finish,
            underrun_padding_ms: 200,
            drain_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Load from a config file (any format the `config` crate knows, extension
    /// optional) layered with `CALLBRIDGE__SECTION__KEY` environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("CALLBRIDGE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the media path cannot run with
    pub fn validate(&self) -> Result<()> {
        let telephony = &self.telephony;
        ensure!(telephony.sample_rate > 0, "telephony.sample_rate must be positive");
        ensure!(telephony.frame_ms > 0, "telephony.frame_ms must be positive");
        ensure!(
            telephony.sample_rate as u64 * telephony.frame_ms / 1000 > 0,
            "telephony.frame_ms = {} holds no samples at {}Hz",
            telephony.frame_ms,
            telephony.sample_rate
        );
        ensure!(
            self.playout.max_queue_ms >= telephony.frame_ms,
            "playout.max_queue_ms ({}) is shorter than one frame ({}ms)",
            self.playout.max_queue_ms,
            telephony.frame_ms
        );
        ensure!(self.translation.buffer_ms > 0, "translation.buffer_ms must be positive");
        Ok(())
    }
}
