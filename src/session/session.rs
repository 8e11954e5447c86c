use super::config::SessionConfig;
use super::playout::Playout;
use super::stats::{SessionPhase, SessionStats};
use crate::audio::{resample, AudioFrame, Direction, OutboundScheduler, PushOutcome, SchedulerStats};
use crate::config::FailurePolicy;
use crate::error::BridgeError;
use crate::translation::{
    AdapterMetrics, LanguagePair, TranslationAdapter, TranslationBackend, TranslationEvent,
    TranslationEvents,
};
use crate::transport::OutboundMessage;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Identifiers assigned by the media transport when the stream starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallIdentity {
    pub call_sid: String,
    pub stream_sid: String,
}

impl CallIdentity {
    pub fn new(call_sid: impl Into<String>, stream_sid: impl Into<String>) -> Self {
        Self {
            call_sid: call_sid.into(),
            stream_sid: stream_sid.into(),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) inbound_frames: u64,
    pub(crate) ignored_frames: u64,
    pub(crate) partial_events: u64,
    pub(crate) final_events: u64,
    pub(crate) synthesized_chunks: u64,
    pub(crate) late_ticks: u64,
    pub(crate) barge_ins: u64,
    pub(crate) scheduler_stops: u64,
}

/// Session-mutable state, guarded by the session's single mutex
///
/// The ingest path, the translation event loop and the playout tick all go
/// through this lock; nothing here is shared across sessions.
pub(crate) struct SessionCore {
    pub(crate) phase: SessionPhase,
    opening: bool,
    adapter: Option<TranslationAdapter>,
    pub(crate) scheduler: Option<OutboundScheduler>,
    playout: Option<Playout>,
    event_loop: Option<JoinHandle<()>>,
    languages: Option<LanguagePair>,
    degraded: bool,
    inbound_sequence: u64,
    inbound_media_ms: u64,
    pub(crate) counters: Counters,
    adapter_metrics: AdapterMetrics,
    scheduler_stats: SchedulerStats,
}

impl SessionCore {
    fn new() -> Self {
        Self {
            phase: SessionPhase::Init,
            opening: false,
            adapter: None,
            scheduler: None,
            playout: None,
            event_loop: None,
            languages: None,
            degraded: false,
            inbound_sequence: 0,
            inbound_media_ms: 0,
            counters: Counters::default(),
            adapter_metrics: AdapterMetrics::default(),
            scheduler_stats: SchedulerStats::default(),
        }
    }
}

/// One live call bridged to a translation stream
///
/// Owns exactly one translation adapter and one outbound scheduler, both
/// created on the transition to `Streaming` and released on the transition
/// to `Closed`. Every teardown path goes through the phase guard, so the
/// adapter is closed and the scheduler stopped exactly once no matter how
/// many stop/error signals race.
pub struct CallSession {
    identity: CallIdentity,
    config: SessionConfig,
    backend: Arc<dyn TranslationBackend>,
    outbound: mpsc::Sender<OutboundMessage>,
    core: Arc<Mutex<SessionCore>>,
    phase_tx: watch::Sender<SessionPhase>,
    /// Signalled when a fatal error interrupts a graceful stop
    force: Notify,
    started_at: DateTime<Utc>,
}

impl CallSession {
    /// Create a session in `Init`
    ///
    /// `outbound` is the connection's writer; it serializes everything the
    /// session sends back onto the media stream.
    pub fn new(
        identity: CallIdentity,
        config: SessionConfig,
        backend: Arc<dyn TranslationBackend>,
        outbound: mpsc::Sender<OutboundMessage>,
    ) -> Self {
        info!(
            "Creating call session: call {} stream {}",
            identity.call_sid, identity.stream_sid
        );

        let (phase_tx, _) = watch::channel(SessionPhase::Init);

        Self {
            identity,
            config,
            backend,
            outbound,
            core: Arc::new(Mutex::new(SessionCore::new())),
            phase_tx,
            force: Notify::new(),
            started_at: Utc::now(),
        }
    }

    pub fn identity(&self) -> &CallIdentity {
        &self.identity
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase_tx.borrow()
    }

    /// Watch phase transitions
    pub fn subscribe_phase(&self) -> watch::Receiver<SessionPhase> {
        self.phase_tx.subscribe()
    }

    fn set_phase(&self, core: &mut SessionCore, phase: SessionPhase) {
        if core.phase != phase {
            debug!(
                "Stream {}: {:?} -> {:?}",
                self.identity.stream_sid, core.phase, phase
            );
        }
        core.phase = phase;
        self.phase_tx.send_replace(phase);
    }

    /// `Init -> Streaming`: open the adapter and start playout
    ///
    /// Uses the configured default languages when `languages` is None. On
    /// adapter failure the session goes straight to `Closed` and the error is
    /// returned. In any phase other than `Init` this is a no-op.
    pub async fn start(self: &Arc<Self>, languages: Option<LanguagePair>) -> Result<(), BridgeError> {
        let languages = languages.unwrap_or_else(|| self.config.default_languages.clone());

        {
            let mut core = self.core.lock().await;
            if core.phase != SessionPhase::Init || core.opening {
                debug!(
                    "Start ignored for stream {} in {:?}",
                    self.identity.stream_sid, core.phase
                );
                return Ok(());
            }

            let frame_samples = self.config.scheduler.frame_samples();
            if frame_samples == 0 || self.config.frame_duration.is_zero() {
                self.set_phase(&mut core, SessionPhase::Closed);
                return Err(BridgeError::SessionInit(format!(
                    "{:?} frames at {}Hz carry no audio",
                    self.config.frame_duration, self.config.sample_rate
                )));
            }
            core.opening = true;
        }

        info!(
            "Stream started: {} (call {}, {} -> {})",
            self.identity.stream_sid, self.identity.call_sid, languages.source, languages.target
        );

        // The lock is not held while connecting, so ingest never waits on it
        let opened = TranslationAdapter::open(
            Arc::clone(&self.backend),
            languages.clone(),
            self.config.adapter.clone(),
        )
        .await;

        let mut core = self.core.lock().await;
        core.opening = false;

        let (adapter, events) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                error!(
                    "Failed to open translation for stream {}: {}",
                    self.identity.stream_sid, e
                );
                self.set_phase(&mut core, SessionPhase::Closed);
                return Err(e);
            }
        };

        if core.phase != SessionPhase::Init {
            // Stopped or failed while connecting
            drop(core);
            info!(
                "Stream {} ended while translation was opening",
                self.identity.stream_sid
            );
            adapter.abort().await;
            return Ok(());
        }

        core.languages = Some(languages);
        core.adapter = Some(adapter);
        core.scheduler = Some(OutboundScheduler::new(self.config.scheduler.clone()));
        core.playout = Some(Playout::spawn(
            Arc::downgrade(&self.core),
            self.outbound.clone(),
            self.identity.stream_sid.clone(),
            self.config.frame_duration,
        ));
        core.event_loop = Some(self.spawn_event_loop(events));
        self.set_phase(&mut core, SessionPhase::Streaming);
        drop(core);

        info!("Session streaming: {}", self.identity.stream_sid);

        Ok(())
    }

    /// Decode one inbound µ-law frame and push it to translation
    ///
    /// Ignored (and counted) in any phase other than `Streaming`.
    pub async fn handle_media(&self, payload: Vec<u8>) {
        let mut core = self.core.lock().await;

        if core.phase != SessionPhase::Streaming || core.degraded {
            core.counters.ignored_frames += 1;
            debug!(
                "Ignoring media frame for stream {} in {:?}{}",
                self.identity.stream_sid,
                core.phase,
                if core.degraded { " (degraded)" } else { "" }
            );
            return;
        }

        let sequence = core.inbound_sequence;
        let timestamp_ms = core.inbound_media_ms;
        core.inbound_sequence += 1;
        core.inbound_media_ms += payload.len() as u64 * 1000 / self.config.sample_rate.max(1) as u64;

        let frame = AudioFrame::companded(Direction::Inbound, sequence, timestamp_ms, payload).into_linear();
        core.counters.inbound_frames += 1;

        if let (Some(adapter), Some(pcm)) = (core.adapter.as_ref(), frame.samples()) {
            adapter.push_audio(pcm);
        }
    }

    /// `Streaming -> Stopping -> Closed`
    ///
    /// Closes the adapter gracefully, plays out queued audio (bounded by the
    /// drain timeout) and releases everything. A stop in `Init` closes
    /// directly; in `Stopping` or `Closed` it is a no-op.
    pub async fn stop(&self) {
        let (adapter, playout) = {
            let mut core = self.core.lock().await;
            match core.phase {
                SessionPhase::Init => {
                    info!("Stream {} stopped before start", self.identity.stream_sid);
                    self.set_phase(&mut core, SessionPhase::Closed);
                    return;
                }
                SessionPhase::Streaming => {
                    self.set_phase(&mut core, SessionPhase::Stopping);
                    (core.adapter.take(), core.playout.take())
                }
                SessionPhase::Stopping | SessionPhase::Closed => {
                    debug!(
                        "Stop ignored for stream {} in {:?}",
                        self.identity.stream_sid, core.phase
                    );
                    return;
                }
            }
        };

        info!("Stream stopped: {}", self.identity.stream_sid);

        let mut forced = false;

        if let Some(adapter) = adapter {
            tokio::select! {
                _ = adapter.close() => {}
                _ = self.force.notified() => {
                    forced = true;
                    adapter.abort().await;
                }
            }
            self.core.lock().await.adapter_metrics = adapter.metrics();
        }

        // Synthesized audio delivered during the close grace goes in before draining
        let event_loop = self.core.lock().await.event_loop.take();
        if let Some(event_loop) = event_loop {
            if !forced {
                tokio::select! {
                    joined = timeout(self.config.drain_timeout, event_loop) => {
                        if joined.is_err() {
                            warn!("Translation events for stream {} still pending at drain", self.identity.stream_sid);
                        }
                    }
                    _ = self.force.notified() => forced = true,
                }
            }
        }

        {
            let mut core = self.core.lock().await;
            if let Some(scheduler) = core.scheduler.as_mut() {
                scheduler.begin_drain();
            }
            if core.phase == SessionPhase::Closed {
                forced = true;
            }
        }

        if let Some(playout) = playout {
            if forced {
                playout.halt().await;
            } else {
                tokio::select! {
                    drained = playout.drain(self.config.drain_timeout) => {
                        if !drained {
                            warn!("Stream {} did not drain in time", self.identity.stream_sid);
                        }
                    }
                    _ = self.force.notified() => {
                        debug!("Drain interrupted for stream {}", self.identity.stream_sid);
                    }
                }
            }
            self.core.lock().await.counters.scheduler_stops += 1;
        }

        let mut core = self.core.lock().await;
        if let Some(scheduler) = core.scheduler.take() {
            core.scheduler_stats = scheduler.stats();
        }
        self.set_phase(&mut core, SessionPhase::Closed);

        info!("Session closed: {}", self.identity.stream_sid);
    }

    /// Any phase -> `Closed` without draining
    ///
    /// Used for transport errors and unrecoverable adapter or transcode
    /// errors. If a graceful stop is in progress it is cut short. Phase
    /// watchers see `Closed` only after playout and the adapter are released.
    pub async fn fail(&self, cause: BridgeError) {
        let (adapter, playout) = {
            let mut core = self.core.lock().await;
            match core.phase {
                SessionPhase::Closed => {
                    debug!(
                        "Error after close on stream {} ignored: {}",
                        self.identity.stream_sid, cause
                    );
                    return;
                }
                SessionPhase::Init => {
                    warn!("Stream {} failed before start: {}", self.identity.stream_sid, cause);
                    self.set_phase(&mut core, SessionPhase::Closed);
                    return;
                }
                SessionPhase::Stopping => {
                    error!("Stream {} failed while stopping: {}", self.identity.stream_sid, cause);
                    // `stop` releases what it took and publishes Closed
                    core.phase = SessionPhase::Closed;
                    self.force.notify_one();
                    return;
                }
                SessionPhase::Streaming => {
                    error!("Stream {} failed: {}", self.identity.stream_sid, cause);
                    // Closed is published below, once everything is released
                    core.phase = SessionPhase::Closed;
                    // Detached: the loop ends once the adapter is aborted
                    core.event_loop.take();
                    (core.adapter.take(), core.playout.take())
                }
            }
        };

        if let Some(playout) = playout {
            playout.halt().await;
            self.core.lock().await.counters.scheduler_stops += 1;
        }

        if let Some(adapter) = adapter {
            adapter.abort().await;
            self.core.lock().await.adapter_metrics = adapter.metrics();
        }

        let mut core = self.core.lock().await;
        if let Some(mut scheduler) = core.scheduler.take() {
            scheduler.flush();
            core.scheduler_stats = scheduler.stats();
        }
        self.set_phase(&mut core, SessionPhase::Closed);

        info!("Session closed after error: {}", self.identity.stream_sid);
    }

    fn spawn_event_loop(self: &Arc<Self>, mut events: TranslationEvents) -> JoinHandle<()> {
        let session = Arc::downgrade(self);
        let stream_sid = self.identity.stream_sid.clone();

        tokio::spawn(async move {
            debug!("Translation event loop started for stream {}", stream_sid);

            while let Some(event) = events.recv().await {
                let Some(session) = session.upgrade() else {
                    break;
                };
                if !session.handle_event(event).await {
                    break;
                }
            }

            debug!("Translation event loop finished for stream {}", stream_sid);
        })
    }

    /// Route one translation event. Returns false when the loop should end.
    async fn handle_event(&self, event: TranslationEvent) -> bool {
        match event {
            TranslationEvent::Partial { text } => {
                debug!("Recognizing: {}", text);

                let flushed = {
                    let mut core = self.core.lock().await;
                    core.counters.partial_events += 1;
                    let flushed = core.phase == SessionPhase::Streaming
                        && core.scheduler.as_mut().map(|s| s.barge_in()).unwrap_or(false);
                    if flushed {
                        core.counters.barge_ins += 1;
                    }
                    flushed
                };

                if flushed {
                    info!("Caller barged in on stream {}, flushed playback", self.identity.stream_sid);
                    let clear = OutboundMessage::clear(&self.identity.stream_sid);
                    if self.outbound.send(clear).await.is_err() {
                        debug!("Outbound transport gone, clear not sent");
                    }
                }
            }

            TranslationEvent::Final {
                source_text,
                translated_text,
            } => {
                info!("Recognized: {}", source_text);
                info!("Translated: {}", translated_text);
                self.core.lock().await.counters.final_events += 1;
            }

            TranslationEvent::SynthesizedAudio { samples, sample_rate } => {
                let pcm = match resample::to_telephony_rate(samples, sample_rate, self.config.sample_rate) {
                    Ok(pcm) => pcm,
                    Err(e) => {
                        self.fail(e).await;
                        return false;
                    }
                };

                let mut core = self.core.lock().await;
                core.counters.synthesized_chunks += 1;

                let playing = matches!(core.phase, SessionPhase::Streaming | SessionPhase::Stopping);
                match core.scheduler.as_mut() {
                    Some(scheduler) if playing => {
                        if scheduler.push(&pcm) == PushOutcome::Rejected {
                            debug!("Scheduler draining, synthesized audio discarded");
                        }
                    }
                    _ => debug!("Synthesized audio after close discarded"),
                }
            }

            TranslationEvent::AdapterError { cause } => {
                error!("Translation lost on stream {}: {}", self.identity.stream_sid, cause);

                match self.config.on_failure {
                    FailurePolicy::Terminate => {
                        self.fail(BridgeError::Adapter(cause)).await;
                        return false;
                    }
                    FailurePolicy::Degrade => {
                        warn!(
                            "Stream {} continues untranslated (degraded)",
                            self.identity.stream_sid
                        );
                        self.core.lock().await.degraded = true;
                    }
                }
            }
        }

        true
    }

    /// Current statistics
    pub async fn stats(&self) -> SessionStats {
        let core = self.core.lock().await;

        let adapter = core
            .adapter
            .as_ref()
            .map(|a| a.metrics())
            .unwrap_or(core.adapter_metrics);
        let scheduler = core
            .scheduler
            .as_ref()
            .map(|s| s.stats())
            .unwrap_or(core.scheduler_stats);

        let duration = Utc::now().signed_duration_since(self.started_at);

        SessionStats {
            call_sid: self.identity.call_sid.clone(),
            stream_sid: self.identity.stream_sid.clone(),
            phase: core.phase,
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            source_language: core.languages.as_ref().map(|l| l.source.clone()),
            target_language: core.languages.as_ref().map(|l| l.target.clone()),
            inbound_frames: core.counters.inbound_frames,
            ignored_frames: core.counters.ignored_frames,
            outbound_frames: scheduler.frames_emitted,
            partial_events: core.counters.partial_events,
            final_events: core.counters.final_events,
            synthesized_chunks: core.counters.synthesized_chunks,
            adapter_dropped_samples: adapter.dropped_samples,
            scheduler_dropped_samples: scheduler.dropped_samples,
            late_ticks: core.counters.late_ticks,
            barge_ins: core.counters.barge_ins,
            reconnects: adapter.reconnects,
            scheduler_stops: core.counters.scheduler_stops,
            degraded: core.degraded,
        }
    }
}
