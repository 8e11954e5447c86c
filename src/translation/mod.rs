//! Streaming speech translation
//!
//! This module hides the concrete recognition/translation/synthesis service
//! behind two seams:
//! - `TranslationBackend` / `BackendAudioSink`: what a backend must implement
//! - `TranslationAdapter`: what a call session talks to (push audio in,
//!   receive `TranslationEvent`s out, close once)
//!
//! Backends are selected by configuration through `create_backend`.

mod adapter;
mod echo;

pub use adapter::{AdapterConfig, AdapterMetrics, TranslationAdapter, TranslationEvents};
pub use echo::{EchoBackend, EchoConfig};

use crate::config::{BackendKind, TranslationConfig};
use crate::error::BackendError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Source/target language selection for one call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguagePair {
    /// Language spoken by the caller (e.g. "es-ES")
    pub source: String,
    /// Language the caller's speech is translated into (e.g. "en")
    pub target: String,
}

impl LanguagePair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Events produced by a translation stream, consumed in arrival order
///
/// For one utterance, `Partial`s never follow its `Final`, and its
/// `SynthesizedAudio` only follows its `Final`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationEvent {
    /// Interim recognition of the utterance in progress
    Partial { text: String },
    /// Utterance complete: recognized source text and its translation
    Final {
        source_text: String,
        translated_text: String,
    },
    /// Target-language speech for the last final utterance
    SynthesizedAudio { samples: Vec<i16>, sample_rate: u32 },
    /// The backend could not be recovered
    AdapterError { cause: String },
}

impl TranslationEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            TranslationEvent::Partial { .. } => "partial",
            TranslationEvent::Final { .. } => "final",
            TranslationEvent::SynthesizedAudio { .. } => "synthesized_audio",
            TranslationEvent::AdapterError { .. } => "adapter_error",
        }
    }
}

/// One live connection to a backend
pub struct BackendSession {
    /// Where linear PCM goes
    pub sink: Box<dyn BackendAudioSink>,
    /// What comes back. An `Err` or the end of the stream means the
    /// connection was interrupted.
    pub events: mpsc::Receiver<Result<TranslationEvent, BackendError>>,
}

/// Recognition/translation/synthesis service
///
/// Implementations:
/// - `EchoBackend`: replays caller utterances (no external service)
#[async_trait::async_trait]
pub trait TranslationBackend: Send + Sync {
    /// Open a continuous recognition session for a language pair
    async fn connect(&self, languages: &LanguagePair) -> Result<BackendSession, BackendError>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Audio input half of a backend connection
#[async_trait::async_trait]
pub trait BackendAudioSink: Send {
    /// Send a chunk of linear PCM at the telephony rate
    async fn send_audio(&mut self, pcm: &[i16]) -> Result<(), BackendError>;

    /// Request graceful end of recognition
    ///
    /// The backend may still emit events for audio already sent, then ends
    /// its event stream.
    async fn close(&mut self) -> Result<(), BackendError>;
}

/// Create the configured translation backend
pub fn create_backend(config: &TranslationConfig) -> Arc<dyn TranslationBackend> {
    match config.backend {
        BackendKind::Echo => Arc::new(EchoBackend::new(EchoConfig::default())),
    }
}
