//! Error types for the call bridge
//!
//! Every variant is scoped to a single call session. None of them is allowed
//! to take down other sessions or the process.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Malformed inbound message. Dropped, the session continues.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The translation adapter could not be opened. Aborts this session only.
    #[error("Session init error: {0}")]
    SessionInit(String),

    /// Translation backend unreachable after all reconnect attempts.
    #[error("Adapter error: {0}")]
    Adapter(String),

    /// Audio outside the transcoder's domain. Fatal to the session.
    #[error("Transcode error: {0}")]
    Transcode(String),

    /// The media connection dropped. Forces immediate teardown.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl BridgeError {
    /// Whether this error ends the session without draining
    pub fn is_fatal(&self) -> bool {
        !matches!(self, BridgeError::Protocol(_))
    }
}

/// Errors reported by a translation backend implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Backend rejected session: {0}")]
    Rejected(String),

    #[error("Backend stream error: {0}")]
    Stream(String),
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        BridgeError::Protocol(e.to_string())
    }
}

impl From<base64::DecodeError> for BridgeError {
    fn from(e: base64::DecodeError) -> Self {
        BridgeError::Protocol(format!("invalid base64 payload: {}", e))
    }
}
