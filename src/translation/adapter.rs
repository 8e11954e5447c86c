use super::{BackendSession, LanguagePair, TranslationBackend, TranslationEvent};
use crate::audio::PcmRing;
use crate::error::BridgeError;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, timeout_at, Instant};
use tracing::{debug, error, info, warn};

/// How long `abort` waits for the worker before cancelling it
const ABORT_JOIN_TIMEOUT: Duration = Duration::from_millis(250);

/// Configuration for a translation adapter
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Sample rate of pushed audio
    pub sample_rate: u32,
    /// Inbound audio held while the backend is slow or reconnecting
    pub buffer: Duration,
    /// Timeout for each backend connect attempt
    pub connect_timeout: Duration,
    /// Reconnect attempts after an interruption before giving up
    pub max_reconnect_attempts: u32,
    /// First reconnect delay; doubles per attempt
    pub reconnect_base: Duration,
    /// Upper bound on the reconnect delay
    pub reconnect_max: Duration,
    /// How long `close` lets the backend finish pending results
    pub close_grace: Duration,
    /// Capacity of the event channel towards the session
    pub event_capacity: usize,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            sample_rate: 8000,
            buffer: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(10),
            max_reconnect_attempts: 3,
            reconnect_base: Duration::from_millis(250),
            reconnect_max: Duration::from_secs(4),
            close_grace: Duration::from_secs(2),
            event_capacity: 64,
        }
    }
}

impl AdapterConfig {
    /// Delay before reconnect attempt `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.reconnect_base.saturating_mul(factor).min(self.reconnect_max)
    }
}

/// Snapshot of adapter counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdapterMetrics {
    pub pushed_samples: u64,
    pub sent_samples: u64,
    pub dropped_samples: u64,
    pub reconnect_attempts: u64,
    pub reconnects: u64,
    pub discarded_events: u64,
}

#[derive(Default)]
struct Counters {
    pushed_samples: AtomicU64,
    sent_samples: AtomicU64,
    dropped_samples: AtomicU64,
    reconnect_attempts: AtomicU64,
    reconnects: AtomicU64,
    discarded_events: AtomicU64,
}

/// State shared between the adapter handle, its worker and its event stream
struct Shared {
    ring: Mutex<PcmRing>,
    pending: Notify,
    /// Events handed to the session but not yet received
    in_flight: AtomicUsize,
    consumed: Notify,
    closed: AtomicBool,
    failed: AtomicBool,
    counters: Counters,
}

impl Shared {
    fn take_buffered(&self) -> Vec<i16> {
        self.ring.lock().unwrap_or_else(|e| e.into_inner()).take_all()
    }

    /// Return audio the backend did not accept to the head of the buffer
    fn restore(&self, pcm: &[i16]) {
        let dropped = self.ring.lock().unwrap_or_else(|e| e.into_inner()).push_front(pcm);
        if dropped > 0 {
            self.counters.dropped_samples.fetch_add(dropped as u64, Ordering::Relaxed);
            debug!("Translation buffer full, dropped {} unsent samples", dropped);
        }
    }

    /// Empty the buffer, counting everything in it as dropped
    fn discard_buffered(&self) -> usize {
        let discarded = self.ring.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.counters.dropped_samples.fetch_add(discarded as u64, Ordering::Relaxed);
        discarded
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shutdown {
    Running,
    Graceful,
    Immediate,
}

/// Handle to one open translation stream
///
/// Owned by exactly one call session. Audio goes in through `push_audio`,
/// which never blocks; events come out of the `TranslationEvents` returned
/// by `open`. A background worker moves buffered audio to the backend and
/// reconnects on interruption.
pub struct TranslationAdapter {
    shared: Arc<Shared>,
    shutdown: watch::Sender<Shutdown>,
    worker: Mutex<Option<JoinHandle<()>>>,
    close_requested: AtomicBool,
    languages: LanguagePair,
    config: AdapterConfig,
}

/// Event stream of one adapter
///
/// Yields nothing once the adapter is closed, even if events were in flight.
pub struct TranslationEvents {
    rx: mpsc::Receiver<TranslationEvent>,
    shared: Arc<Shared>,
}

impl TranslationEvents {
    pub async fn recv(&mut self) -> Option<TranslationEvent> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return None;
        }

        let event = self.rx.recv().await?;
        self.shared.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.shared.consumed.notify_one();

        if self.shared.closed.load(Ordering::SeqCst) {
            self.shared.counters.discarded_events.fetch_add(1, Ordering::Relaxed);
            debug!("Discarding {} event received after close", event.kind());
            return None;
        }

        Some(event)
    }
}

impl TranslationAdapter {
    /// Connect to the backend and start streaming
    ///
    /// Fails with `SessionInit` if the first connection cannot be made.
    pub async fn open(
        backend: Arc<dyn TranslationBackend>,
        languages: LanguagePair,
        config: AdapterConfig,
    ) -> Result<(Self, TranslationEvents), BridgeError> {
        info!(
            "Opening {} translation stream ({} -> {})",
            backend.name(),
            languages.source,
            languages.target
        );

        let session = match timeout(config.connect_timeout, backend.connect(&languages)).await {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => return Err(BridgeError::SessionInit(e.to_string())),
            Err(_) => {
                return Err(BridgeError::SessionInit(format!(
                    "connect to {} timed out after {:?}",
                    backend.name(),
                    config.connect_timeout
                )))
            }
        };

        let shared = Arc::new(Shared {
            ring: Mutex::new(PcmRing::with_duration(
                config.sample_rate,
                config.buffer.as_millis() as u64,
            )),
            pending: Notify::new(),
            in_flight: AtomicUsize::new(0),
            consumed: Notify::new(),
            closed: AtomicBool::new(false),
            failed: AtomicBool::new(false),
            counters: Counters::default(),
        });

        let (event_tx, event_rx) = mpsc::channel(config.event_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(Shutdown::Running);

        let worker = Worker {
            backend,
            languages: languages.clone(),
            config: config.clone(),
            shared: Arc::clone(&shared),
            events_out: event_tx,
            shutdown: shutdown_rx,
        };
        let handle = tokio::spawn(worker.run(session));

        info!("Translation stream open");

        Ok((
            Self {
                shared: Arc::clone(&shared),
                shutdown: shutdown_tx,
                worker: Mutex::new(Some(handle)),
                close_requested: AtomicBool::new(false),
                languages,
                config,
            },
            TranslationEvents {
                rx: event_rx,
                shared,
            },
        ))
    }

    /// Queue linear PCM for the backend
    ///
    /// Returns immediately. When the buffer is full the oldest audio is
    /// dropped; after close or failure the chunk is dropped. Both are counted.
    pub fn push_audio(&self, pcm: &[i16]) {
        let counters = &self.shared.counters;
        counters.pushed_samples.fetch_add(pcm.len() as u64, Ordering::Relaxed);

        if self.shared.closed.load(Ordering::SeqCst) || self.shared.failed.load(Ordering::SeqCst) {
            counters.dropped_samples.fetch_add(pcm.len() as u64, Ordering::Relaxed);
            return;
        }

        let dropped = self
            .shared
            .ring
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(pcm);

        if dropped > 0 {
            counters.dropped_samples.fetch_add(dropped as u64, Ordering::Relaxed);
            debug!("Translation buffer full, dropped {} oldest samples", dropped);
        }

        self.shared.pending.notify_one();
    }

    /// End the stream gracefully
    ///
    /// Sends buffered audio, asks the backend to finish recognition and
    /// delivers its last results for up to `close_grace`. After this returns
    /// no further event is delivered. Calling it again is a no-op.
    pub async fn close(&self) {
        if self.close_requested.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("Closing translation stream ({} -> {})", self.languages.source, self.languages.target);
        let _ = self.shutdown.send(Shutdown::Graceful);
        let deadline = Instant::now() + self.config.close_grace;

        let handle = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(mut handle) = handle {
            if timeout_at(deadline, &mut handle).await.is_err() {
                warn!(
                    "Translation stream did not finish within {:?}, forcing close",
                    self.config.close_grace
                );
                let _ = self.shutdown.send(Shutdown::Immediate);
                if timeout(ABORT_JOIN_TIMEOUT, &mut handle).await.is_err() {
                    handle.abort();
                }
            }
        }

        // Results produced within the grace period still reach the session
        while self.shared.in_flight.load(Ordering::SeqCst) > 0 {
            if timeout_at(deadline, self.shared.consumed.notified()).await.is_err() {
                debug!("Session did not take pending results before close");
                break;
            }
        }

        self.shared.closed.store(true, Ordering::SeqCst);
        info!("Translation stream closed");
    }

    /// End the stream immediately, discarding pending results
    ///
    /// Safe to call after, or concurrently with, `close`.
    pub async fn abort(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.close_requested.store(true, Ordering::SeqCst);
        let _ = self.shutdown.send(Shutdown::Immediate);

        let handle = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(mut handle) = handle {
            info!("Aborting translation stream");
            if timeout(ABORT_JOIN_TIMEOUT, &mut handle).await.is_err() {
                handle.abort();
            }
        }
    }

    /// Samples waiting to be sent to the backend
    pub fn buffered_samples(&self) -> usize {
        self.shared.ring.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Buffer capacity in samples
    pub fn buffer_capacity(&self) -> usize {
        self.shared.ring.lock().unwrap_or_else(|e| e.into_inner()).capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Reconnection was exhausted
    pub fn is_failed(&self) -> bool {
        self.shared.failed.load(Ordering::SeqCst)
    }

    pub fn languages(&self) -> &LanguagePair {
        &self.languages
    }

    pub fn metrics(&self) -> AdapterMetrics {
        let c = &self.shared.counters;
        AdapterMetrics {
            pushed_samples: c.pushed_samples.load(Ordering::Relaxed),
            sent_samples: c.sent_samples.load(Ordering::Relaxed),
            dropped_samples: c.dropped_samples.load(Ordering::Relaxed),
            reconnect_attempts: c.reconnect_attempts.load(Ordering::Relaxed),
            reconnects: c.reconnects.load(Ordering::Relaxed),
            discarded_events: c.discarded_events.load(Ordering::Relaxed),
        }
    }
}

enum PumpExit {
    Shutdown(Shutdown),
    Interrupted(String),
}

enum Reconnect {
    Connected(BackendSession),
    Shutdown,
    Exhausted(String),
}

/// Background task that owns the backend connection
struct Worker {
    backend: Arc<dyn TranslationBackend>,
    languages: LanguagePair,
    config: AdapterConfig,
    shared: Arc<Shared>,
    events_out: mpsc::Sender<TranslationEvent>,
    shutdown: watch::Receiver<Shutdown>,
}

impl Worker {
    async fn run(mut self, mut session: BackendSession) {
        debug!("Translation worker started");

        loop {
            match self.pump(&mut session).await {
                PumpExit::Shutdown(mode) => {
                    self.finish(session, mode).await;
                    break;
                }
                PumpExit::Interrupted(cause) => {
                    warn!("Translation stream interrupted: {}", cause);
                    drop(session);

                    match self.reconnect().await {
                        Reconnect::Connected(next) => session = next,
                        Reconnect::Shutdown => break,
                        Reconnect::Exhausted(cause) => {
                            self.fail(cause).await;
                            break;
                        }
                    }
                }
            }
        }

        debug!("Translation worker stopped");
    }

    /// Move audio and events until shutdown or interruption
    async fn pump(&mut self, session: &mut BackendSession) -> PumpExit {
        loop {
            let mode = *self.shutdown.borrow();
            if mode != Shutdown::Running {
                return PumpExit::Shutdown(mode);
            }

            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        // Adapter handle dropped without closing
                        return PumpExit::Shutdown(Shutdown::Immediate);
                    }
                }
                _ = self.shared.pending.notified() => {
                    if let Err(e) = self.send_buffered(session).await {
                        return PumpExit::Interrupted(e);
                    }
                }
                event = session.events.recv() => match event {
                    Some(Ok(event)) => self.forward(event).await,
                    Some(Err(e)) => return PumpExit::Interrupted(e.to_string()),
                    None => return PumpExit::Interrupted("event stream ended".to_string()),
                },
            }
        }
    }

    async fn send_buffered(&self, session: &mut BackendSession) -> Result<(), String> {
        let pcm = self.shared.take_buffered();
        if pcm.is_empty() {
            return Ok(());
        }

        if let Err(e) = session.sink.send_audio(&pcm).await {
            // Held for the next connection
            self.shared.restore(&pcm);
            return Err(e.to_string());
        }
        self.shared
            .counters
            .sent_samples
            .fetch_add(pcm.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    async fn forward(&self, event: TranslationEvent) {
        if self.shared.closed.load(Ordering::SeqCst) {
            self.shared.counters.discarded_events.fetch_add(1, Ordering::Relaxed);
            debug!("Discarding {} event after close", event.kind());
            return;
        }

        self.shared.in_flight.fetch_add(1, Ordering::SeqCst);
        if self.events_out.send(event).await.is_err() {
            self.shared.in_flight.fetch_sub(1, Ordering::SeqCst);
            debug!("Translation event consumer gone");
        }
    }

    async fn finish(&mut self, mut session: BackendSession, mode: Shutdown) {
        if mode == Shutdown::Graceful {
            if let Err(e) = self.send_buffered(&mut session).await {
                let discarded = self.shared.discard_buffered();
                warn!("Failed to send final audio, {} samples lost: {}", discarded, e);
            }
        }

        if let Err(e) = session.sink.close().await {
            warn!("Backend close failed: {}", e);
        }

        if mode != Shutdown::Graceful {
            return;
        }

        // Deliver results for audio already sent until the backend ends its stream
        loop {
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() == Shutdown::Immediate {
                        break;
                    }
                }
                event = session.events.recv() => match event {
                    Some(Ok(event)) => self.forward(event).await,
                    Some(Err(e)) => {
                        debug!("Backend stream error during close: {}", e);
                        break;
                    }
                    None => break,
                },
            }
        }
    }

    async fn reconnect(&mut self) -> Reconnect {
        let max = self.config.max_reconnect_attempts;
        let mut last_error = "no reconnect attempts configured".to_string();

        for attempt in 1..=max {
            let delay = self.config.backoff(attempt);
            info!(
                "Reconnecting to {} in {:?} (attempt {}/{})",
                self.backend.name(),
                delay,
                attempt,
                max
            );

            tokio::select! {
                _ = sleep(delay) => {}
                _ = wait_for_shutdown(&mut self.shutdown) => {
                    info!("Translation stream closed while reconnecting");
                    return Reconnect::Shutdown;
                }
            }

            self.shared
                .counters
                .reconnect_attempts
                .fetch_add(1, Ordering::Relaxed);

            match timeout(self.config.connect_timeout, self.backend.connect(&self.languages)).await {
                Ok(Ok(session)) => {
                    info!("Reconnected to {} after {} attempt(s)", self.backend.name(), attempt);
                    self.shared.counters.reconnects.fetch_add(1, Ordering::Relaxed);
                    // Audio buffered during the outage goes out first
                    self.shared.pending.notify_one();
                    return Reconnect::Connected(session);
                }
                Ok(Err(e)) => {
                    warn!("Reconnect attempt {} failed: {}", attempt, e);
                    last_error = e.to_string();
                }
                Err(_) => {
                    warn!("Reconnect attempt {} timed out", attempt);
                    last_error = format!("connect timed out after {:?}", self.config.connect_timeout);
                }
            }
        }

        Reconnect::Exhausted(last_error)
    }

    async fn fail(&self, cause: String) {
        error!("Translation backend lost after reconnect attempts: {}", cause);
        self.shared.failed.store(true, Ordering::SeqCst);

        self.shared.discard_buffered();

        self.forward(TranslationEvent::AdapterError { cause }).await;
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<Shutdown>) {
    loop {
        if *shutdown.borrow() != Shutdown::Running {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
