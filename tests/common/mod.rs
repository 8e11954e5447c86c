// Scripted in-process translation backend shared by the integration tests
//
// Records every sample it receives, counts connects and closes, and lets a
// test inject events, interrupt the live connection or make connects fail.

#![allow(dead_code)]

use callbridge::error::BackendError;
use callbridge::translation::{
    BackendAudioSink, BackendSession, LanguagePair, TranslationBackend, TranslationEvent,
};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

type EventTx = mpsc::Sender<Result<TranslationEvent, BackendError>>;

#[derive(Default)]
struct ScriptState {
    connects: usize,
    closes: usize,
    fail_next: usize,
    fail_all: bool,
    send_failures: usize,
    connect_delay: Option<Duration>,
    languages: Vec<LanguagePair>,
    audio: Vec<i16>,
    on_close: Vec<TranslationEvent>,
    current: Option<EventTx>,
}

#[derive(Clone, Default)]
pub struct ScriptedBackend {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap()
    }

    pub fn connect_count(&self) -> usize {
        self.state().connects
    }

    pub fn close_count(&self) -> usize {
        self.state().closes
    }

    pub fn received_audio(&self) -> Vec<i16> {
        self.state().audio.clone()
    }

    pub fn received_len(&self) -> usize {
        self.state().audio.len()
    }

    pub fn languages(&self) -> Vec<LanguagePair> {
        self.state().languages.clone()
    }

    /// Fail the next `n` connect attempts
    pub fn fail_next_connects(&self, n: usize) {
        self.state().fail_next = n;
    }

    /// Fail the next `n` audio sends on whatever connection is live
    pub fn fail_next_sends(&self, n: usize) {
        self.state().send_failures = n;
    }

    pub fn fail_all_connects(&self, fail: bool) {
        self.state().fail_all = fail;
    }

    pub fn delay_connects(&self, delay: Duration) {
        self.state().connect_delay = Some(delay);
    }

    /// Events the backend emits when asked to close
    pub fn emit_on_close(&self, events: Vec<TranslationEvent>) {
        self.state().on_close = events;
    }

    /// Emit an event on the live connection. False if there is none.
    pub fn emit(&self, event: TranslationEvent) -> bool {
        match &self.state().current {
            Some(tx) => tx.try_send(Ok(event)).is_ok(),
            None => false,
        }
    }

    /// Break the live connection
    pub fn interrupt(&self) {
        if let Some(tx) = self.state().current.take() {
            let _ = tx.try_send(Err(BackendError::Stream("connection reset".to_string())));
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state().current.is_some()
    }
}

#[async_trait::async_trait]
impl TranslationBackend for ScriptedBackend {
    async fn connect(&self, languages: &LanguagePair) -> Result<BackendSession, BackendError> {
        let delay = self.state().connect_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        state.connects += 1;
        state.languages.push(languages.clone());

        if state.fail_all {
            return Err(BackendError::Unavailable("scripted outage".to_string()));
        }
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(BackendError::Unavailable("scripted connect failure".to_string()));
        }

        let (tx, rx) = mpsc::channel(64);
        state.current = Some(tx.clone());

        Ok(BackendSession {
            sink: Box::new(ScriptedSink {
                state: Arc::clone(&self.state),
                tx: Some(tx),
            }),
            events: rx,
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct ScriptedSink {
    state: Arc<Mutex<ScriptState>>,
    tx: Option<EventTx>,
}

#[async_trait::async_trait]
impl BackendAudioSink for ScriptedSink {
    async fn send_audio(&mut self, pcm: &[i16]) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        if state.send_failures > 0 {
            state.send_failures -= 1;
            return Err(BackendError::Stream("send failed".to_string()));
        }
        state.audio.extend_from_slice(pcm);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        let on_close = {
            let mut state = self.state.lock().unwrap();
            state.closes += 1;
            state.current = None;
            std::mem::take(&mut state.on_close)
        };

        if let Some(tx) = self.tx.take() {
            for event in on_close {
                let _ = tx.send(Ok(event)).await;
            }
        }
        Ok(())
    }
}

/// Poll `condition` until it holds or `limit` elapses
pub async fn wait_until<F>(limit: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Like `wait_until` for async conditions
pub async fn wait_until_async<F, Fut>(limit: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition().await
}
