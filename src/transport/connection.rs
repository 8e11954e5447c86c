use super::messages::{InboundMessage, MediaPayload, OutboundMessage, StartPayload};
use crate::error::BridgeError;
use crate::session::{CallIdentity, CallSession, ConnectionId, SessionConfig, SessionRegistry};
use crate::translation::TranslationBackend;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Drives one media connection
///
/// Turns parsed transport messages into session signals. It knows nothing
/// about the socket itself, which keeps it usable from tests: the socket
/// loop feeds it text frames and close/error notifications, and everything
/// the session sends back goes through `outbound`.
pub struct MediaStreamConnection {
    id: ConnectionId,
    registry: Arc<SessionRegistry>,
    backend: Arc<dyn TranslationBackend>,
    config: SessionConfig,
    outbound: mpsc::Sender<OutboundMessage>,
    session: Option<Arc<CallSession>>,
}

impl MediaStreamConnection {
    pub fn new(
        registry: Arc<SessionRegistry>,
        backend: Arc<dyn TranslationBackend>,
        config: SessionConfig,
        outbound: mpsc::Sender<OutboundMessage>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            registry,
            backend,
            config,
            outbound,
            session: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The session started on this connection, if any
    pub fn session(&self) -> Option<&Arc<CallSession>> {
        self.session.as_ref()
    }

    /// Handle one text frame
    ///
    /// Returns `Protocol` errors for malformed or out-of-place messages; the
    /// caller logs and drops them. `SessionInit` is returned when the
    /// session could not start (it is already closed and unregistered).
    pub async fn handle_text(&mut self, text: &str) -> Result<(), BridgeError> {
        match InboundMessage::parse(text)? {
            InboundMessage::Connected { protocol, version } => {
                info!(
                    "Media stream connected ({} {})",
                    protocol.as_deref().unwrap_or("unknown"),
                    version.as_deref().unwrap_or("")
                );
                Ok(())
            }
            InboundMessage::Start { stream_sid, start } => self.on_start(stream_sid, start).await,
            InboundMessage::Media { stream_sid, media } => self.on_media(stream_sid, media).await,
            InboundMessage::Stop { stream_sid } => {
                self.check_stream(stream_sid.as_deref())?;
                self.on_stop().await;
                Ok(())
            }
            InboundMessage::Mark { mark, .. } => {
                debug!("Playback mark reached: {}", mark.name);
                Ok(())
            }
            InboundMessage::Dtmf { dtmf, .. } => {
                debug!("DTMF digit {} ignored", dtmf.digit);
                Ok(())
            }
        }
    }

    async fn on_start(&mut self, stream_sid: Option<String>, start: StartPayload) -> Result<(), BridgeError> {
        if let Some(existing) = &self.session {
            return Err(BridgeError::Protocol(format!(
                "second start on connection already used by stream {}",
                existing.identity().stream_sid
            )));
        }

        let stream_sid = stream_sid
            .or_else(|| start.stream_sid.clone())
            .ok_or_else(|| BridgeError::Protocol("start without streamSid".to_string()))?;

        let languages = start.languages(&self.config.default_languages);
        let identity = CallIdentity::new(start.call_sid.clone(), stream_sid);

        let session = Arc::new(CallSession::new(
            identity,
            self.config.clone(),
            Arc::clone(&self.backend),
            self.outbound.clone(),
        ));

        self.registry.insert(self.id, Arc::clone(&session)).await?;
        self.session = Some(Arc::clone(&session));

        if let Err(e) = session.start(Some(languages)).await {
            self.registry.remove(&self.id).await;
            return Err(e);
        }

        Ok(())
    }

    /// Messages tagged with another stream's id do not belong to this session
    fn check_stream(&self, stream_sid: Option<&str>) -> Result<(), BridgeError> {
        match (&self.session, stream_sid) {
            (Some(session), Some(sid)) if sid != session.identity().stream_sid => {
                Err(BridgeError::Protocol(format!(
                    "message for stream {} on connection bound to {}",
                    sid,
                    session.identity().stream_sid
                )))
            }
            _ => Ok(()),
        }
    }

    async fn on_media(&mut self, stream_sid: Option<String>, media: MediaPayload) -> Result<(), BridgeError> {
        if !media.is_caller_audio() {
            return Ok(());
        }

        let Some(session) = &self.session else {
            debug!("Media before start on connection {}, ignoring", self.id);
            return Ok(());
        };
        self.check_stream(stream_sid.as_deref())?;

        let bytes = media.decode()?;
        session.handle_media(bytes).await;
        Ok(())
    }

    async fn on_stop(&mut self) {
        match &self.session {
            Some(session) => {
                session.stop().await;
                self.registry.remove(&self.id).await;
            }
            None => debug!("Stop without start on connection {}", self.id),
        }
    }

    /// The socket closed cleanly: same as an explicit stop
    pub async fn on_closed(&mut self) {
        info!("Media connection {} closed", self.id);
        self.on_stop().await;
    }

    /// The socket failed: tear the session down without draining
    pub async fn on_transport_error(&mut self, cause: String) {
        warn!("Media connection {} failed: {}", self.id, cause);
        if let Some(session) = &self.session {
            session.fail(BridgeError::Transport(cause)).await;
        }
        self.registry.remove(&self.id).await;
    }

    /// The session closed on its own (adapter or transcode failure)
    pub async fn on_session_closed(&mut self) {
        self.registry.remove(&self.id).await;
    }
}
