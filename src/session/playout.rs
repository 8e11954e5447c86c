// Fixed-cadence playout of the outbound scheduler
//
// One task per session ticks every frame duration, takes at most one frame
// from the scheduler, encodes it to µ-law and hands it to the connection's
// single writer. The interval keeps absolute deadlines, so ticks do not drift;
// a tick that wakes or finishes late is counted and logged as a latency fault.

use super::session::SessionCore;
use crate::transport::OutboundMessage;
use std::sync::Weak;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

const HALT_JOIN_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Run,
    /// Exit once the scheduler reports it is drained
    Drain,
    Halt,
}

/// Handle to a running playout task
///
/// Stopping consumes the handle, so a playout can only be stopped once.
pub(crate) struct Playout {
    control: watch::Sender<Control>,
    handle: JoinHandle<()>,
}

impl Playout {
    pub(crate) fn spawn(
        core: Weak<Mutex<SessionCore>>,
        outbound: mpsc::Sender<OutboundMessage>,
        stream_sid: String,
        frame_duration: Duration,
    ) -> Self {
        let (control, control_rx) = watch::channel(Control::Run);
        let handle = tokio::spawn(run(core, control_rx, outbound, stream_sid, frame_duration));
        Self { control, handle }
    }

    /// Play out what is queued, then stop. Returns false if `limit` elapsed first.
    pub(crate) async fn drain(mut self, limit: Duration) -> bool {
        let _ = self.control.send(Control::Drain);
        match timeout(limit, &mut self.handle).await {
            Ok(_) => true,
            Err(_) => {
                warn!("Playout drain exceeded {:?}, discarding queued audio", limit);
                self.halt().await;
                false
            }
        }
    }

    /// Stop immediately, discarding queued audio
    pub(crate) async fn halt(mut self) {
        let _ = self.control.send(Control::Halt);
        if timeout(HALT_JOIN_TIMEOUT, &mut self.handle).await.is_err() {
            self.handle.abort();
        }
    }
}

async fn run(
    core: Weak<Mutex<SessionCore>>,
    mut control: watch::Receiver<Control>,
    outbound: mpsc::Sender<OutboundMessage>,
    stream_sid: String,
    frame_duration: Duration,
) {
    info!("Playout started for stream {} ({:?} frames)", stream_sid, frame_duration);

    let mut ticker = interval(frame_duration);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut overrun = false;

    loop {
        let scheduled = tokio::select! {
            biased;
            changed = control.changed() => {
                if changed.is_err() || *control.borrow() == Control::Halt {
                    break;
                }
                continue;
            }
            deadline = ticker.tick() => deadline,
        };

        let Some(core) = core.upgrade() else {
            break;
        };

        let (frame, drained) = {
            let mut core = core.lock().await;

            let woke_late = Instant::now().saturating_duration_since(scheduled) > frame_duration;
            if woke_late || overrun {
                core.counters.late_ticks += 1;
                warn!(
                    "Playout tick for stream {} missed its {:?} deadline",
                    stream_sid, frame_duration
                );
            }

            match core.scheduler.as_mut() {
                Some(scheduler) => (scheduler.next_frame(), scheduler.is_drained()),
                None => (None, true),
            }
        };
        drop(core);

        if let Some(frame) = frame {
            let frame = frame.into_companded();
            if let Some(bytes) = frame.bytes() {
                let message = OutboundMessage::media(&stream_sid, bytes);
                if outbound.send(message).await.is_err() {
                    warn!("Outbound transport for stream {} is gone, stopping playout", stream_sid);
                    break;
                }
            }
        }

        overrun = Instant::now().saturating_duration_since(scheduled) > frame_duration;

        if drained && *control.borrow() == Control::Drain {
            debug!("Playout drained for stream {}", stream_sid);
            break;
        }
    }

    info!("Playout stopped for stream {}", stream_sid);
}
