use super::connection::MediaStreamConnection;
use super::messages::OutboundMessage;
use crate::session::{SessionConfig, SessionPhase, SessionRegistry};
use crate::translation::TranslationBackend;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Outbound messages buffered per connection before playout waits on the writer
const OUTBOUND_CAPACITY: usize = 256;

/// Serve one media-stream WebSocket until it closes
///
/// All outbound traffic for the connection goes through a single writer
/// task, so playout frames and control messages never interleave on the
/// socket.
pub async fn serve_media_socket(
    socket: WebSocket,
    registry: Arc<SessionRegistry>,
    backend: Arc<dyn TranslationBackend>,
    config: SessionConfig,
) {
    let (mut sink, mut stream) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundMessage>(OUTBOUND_CAPACITY);

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to serialize outbound message: {}", e);
                    continue;
                }
            };
            if let Err(e) = sink.send(Message::Text(text)).await {
                debug!("WebSocket write failed: {}", e);
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut connection = MediaStreamConnection::new(registry, backend, config, outbound_tx);
    info!("New WebSocket connection {}", connection.id());

    let mut phase: Option<watch::Receiver<SessionPhase>> = None;

    loop {
        tokio::select! {
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if let Err(e) = connection.handle_text(&text).await {
                        warn!("Dropping message on connection {}: {}", connection.id(), e);
                    }
                    if phase.is_none() {
                        phase = connection.session().map(|s| s.subscribe_phase());
                    }
                }
                Some(Ok(Message::Binary(_))) => {
                    warn!("Dropping binary frame on connection {}", connection.id());
                }
                Some(Ok(Message::Close(_))) | None => {
                    connection.on_closed().await;
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("WebSocket error: {}", e);
                    connection.on_transport_error(e.to_string()).await;
                    break;
                }
            },
            _ = session_closed(&mut phase) => {
                info!("Session ended, closing connection {}", connection.id());
                connection.on_session_closed().await;
                break;
            }
        }
    }

    // Dropping the connection (and its session) releases the last writer handle
    drop(connection);
    if writer.await.is_err() {
        error!("WebSocket writer task panicked");
    }
}

async fn session_closed(phase: &mut Option<watch::Receiver<SessionPhase>>) {
    match phase {
        Some(rx) => {
            let _ = rx.wait_for(|p| *p == SessionPhase::Closed).await;
        }
        None => std::future::pending::<()>().await,
    }
}
