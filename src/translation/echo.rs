// Echo translation backend
//
// Segments the caller's audio into utterances with a simple energy gate and
// plays each utterance back as its own "translation". Useful for exercising
// the full call path (ingest, events, playout) without a speech service.

use super::{BackendAudioSink, BackendSession, LanguagePair, TranslationBackend, TranslationEvent};
use crate::error::BackendError;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Configuration for the echo backend
#[derive(Debug, Clone)]
pub struct EchoConfig {
    pub sample_rate: u32,
    /// RMS level above which a 20ms window counts as speech
    pub speech_threshold: f64,
    /// Silence that ends an utterance
    pub pause_ms: u64,
    /// Utterances longer than this are cut
    pub max_utterance_ms: u64,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            sample_rate: 8000,
            speech_threshold: 500.0,
            pause_ms: 600,
            max_utterance_ms: 10_000,
        }
    }
}

pub struct EchoBackend {
    config: EchoConfig,
}

impl EchoBackend {
    pub fn new(config: EchoConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl TranslationBackend for EchoBackend {
    async fn connect(&self, languages: &LanguagePair) -> Result<BackendSession, BackendError> {
        info!(
            "Echo backend session started ({} -> {})",
            languages.source, languages.target
        );

        let (tx, rx) = mpsc::channel(64);

        Ok(BackendSession {
            sink: Box::new(EchoSink::new(self.config.clone(), tx)),
            events: rx,
        })
    }

    fn name(&self) -> &str {
        "echo"
    }
}

struct EchoSink {
    config: EchoConfig,
    tx: Option<mpsc::Sender<Result<TranslationEvent, BackendError>>>,
    utterance: Vec<i16>,
    in_speech: bool,
    trailing_silence: usize,
    utterances: u64,
}

impl EchoSink {
    fn new(config: EchoConfig, tx: mpsc::Sender<Result<TranslationEvent, BackendError>>) -> Self {
        Self {
            config,
            tx: Some(tx),
            utterance: Vec::new(),
            in_speech: false,
            trailing_silence: 0,
            utterances: 0,
        }
    }

    fn window(&self) -> usize {
        (self.config.sample_rate as usize / 50).max(1)
    }

    fn samples_for_ms(&self, ms: u64) -> usize {
        (self.config.sample_rate as u64 * ms / 1000) as usize
    }

    fn emit(&self, event: TranslationEvent) {
        if let Some(tx) = &self.tx {
            if let Err(e) = tx.try_send(Ok(event)) {
                warn!("Echo backend dropped event: {}", e);
            }
        }
    }

    fn process_window(&mut self, window: &[i16]) {
        let speech = rms(window) >= self.config.speech_threshold;

        if speech {
            if !self.in_speech {
                self.in_speech = true;
                self.emit(TranslationEvent::Partial {
                    text: format!("utterance {}", self.utterances + 1),
                });
            }
            self.trailing_silence = 0;
            self.utterance.extend_from_slice(window);
        } else if self.in_speech {
            self.utterance.extend_from_slice(window);
            self.trailing_silence += window.len();
            if self.trailing_silence >= self.samples_for_ms(self.config.pause_ms) {
                self.finish_utterance();
                return;
            }
        }

        if self.utterance.len() >= self.samples_for_ms(self.config.max_utterance_ms) {
            self.finish_utterance();
        }
    }

    fn finish_utterance(&mut self) {
        let keep = self.utterance.len().saturating_sub(self.trailing_silence);
        self.utterance.truncate(keep);
        self.in_speech = false;
        self.trailing_silence = 0;

        if self.utterance.is_empty() {
            return;
        }

        self.utterances += 1;
        let text = format!("utterance {}", self.utterances);
        debug!("Echo backend finished {} ({} samples)", text, self.utterance.len());

        self.emit(TranslationEvent::Final {
            source_text: text.clone(),
            translated_text: text,
        });
        let samples = std::mem::take(&mut self.utterance);
        self.emit(TranslationEvent::SynthesizedAudio {
            samples,
            sample_rate: self.config.sample_rate,
        });
    }
}

#[async_trait::async_trait]
impl BackendAudioSink for EchoSink {
    async fn send_audio(&mut self, pcm: &[i16]) -> Result<(), BackendError> {
        if self.tx.is_none() {
            return Err(BackendError::Stream("echo session closed".to_string()));
        }

        let window = self.window();
        for chunk in pcm.chunks(window) {
            self.process_window(chunk);
        }

        Ok(())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        if self.in_speech {
            self.finish_utterance();
        }
        // Ends the event stream
        self.tx = None;
        Ok(())
    }
}

fn rms(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt()
}
