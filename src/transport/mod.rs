//! Media-stream transport
//!
//! JSON messages exchanged with the telephony provider over a WebSocket,
//! and the per-connection driver that maps them onto call sessions.

pub mod connection;
pub mod messages;
mod socket;

pub use connection::MediaStreamConnection;
pub use messages::{InboundMessage, MediaPayload, OutboundMedia, OutboundMessage, StartPayload};
pub use socket::serve_media_socket;
