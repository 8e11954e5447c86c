//! Call session management
//!
//! This module provides the `CallSession` abstraction that manages:
//! - The per-call lifecycle (Init → Streaming → Stopping → Closed)
//! - Decoding inbound media and pushing it to the translation adapter
//! - Routing translation events (barge-in, synthesized audio, failures)
//! - Fixed-cadence playout of synthesized audio back onto the call
//! - The registry binding media connections to sessions

mod config;
mod playout;
mod registry;
#[allow(clippy::module_inception)]
mod session;
mod stats;

pub use config::SessionConfig;
pub use registry::{ConnectionId, SessionRegistry};
pub use session::{CallIdentity, CallSession};
pub use stats::{SessionPhase, SessionStats};
