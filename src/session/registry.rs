use super::session::CallSession;
use super::stats::SessionStats;
use crate::error::BridgeError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Identifies one accepted media connection
pub type ConnectionId = Uuid;

/// Live call sessions, keyed by the media connection that carries them
///
/// A connection is bound to at most one session.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<ConnectionId, Arc<CallSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a session to its connection
    pub async fn insert(&self, connection: ConnectionId, session: Arc<CallSession>) -> Result<(), BridgeError> {
        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(&connection) {
            return Err(BridgeError::Protocol(format!(
                "connection {} already carries stream {}",
                connection,
                existing.identity().stream_sid
            )));
        }

        info!(
            "Registered stream {} on connection {}",
            session.identity().stream_sid,
            connection
        );
        sessions.insert(connection, session);
        Ok(())
    }

    pub async fn get(&self, connection: &ConnectionId) -> Option<Arc<CallSession>> {
        self.sessions.read().await.get(connection).cloned()
    }

    /// Unbind a connection. Removing an absent connection is a no-op.
    pub async fn remove(&self, connection: &ConnectionId) -> Option<Arc<CallSession>> {
        let removed = self.sessions.write().await.remove(connection);
        if let Some(session) = &removed {
            info!(
                "Unregistered stream {} from connection {}",
                session.identity().stream_sid,
                connection
            );
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Statistics for every registered session
    pub async fn snapshot(&self) -> Vec<SessionStats> {
        let sessions: Vec<Arc<CallSession>> = self.sessions.read().await.values().cloned().collect();

        let mut stats = Vec::with_capacity(sessions.len());
        for session in sessions {
            stats.push(session.stats().await);
        }
        stats
    }

    /// Stop and unregister every session (process shutdown)
    pub async fn stop_all(&self) {
        let sessions: Vec<(ConnectionId, Arc<CallSession>)> =
            self.sessions.write().await.drain().collect();

        info!("Stopping {} active session(s)", sessions.len());

        let stops = sessions.iter().map(|(_, session)| session.stop());
        futures::future::join_all(stops).await;
    }
}
