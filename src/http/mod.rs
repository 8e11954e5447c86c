//! HTTP surface for the telephony provider
//!
//! - POST /voice - Call-control webhook, answers with markup that starts the media stream
//! - GET /media-stream - Media stream WebSocket (one connection per call leg)
//! - GET /sessions - Statistics for live sessions
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::twiml_response;
pub use routes::create_router;
pub use state::AppState;
