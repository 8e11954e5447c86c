pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod session;
pub mod translation;
pub mod transport;

pub use audio::{AudioFrame, BargeInPolicy, OutboundScheduler, PcmRing, SchedulerConfig};
pub use config::{Config, FailurePolicy};
pub use error::{BackendError, BridgeError};
pub use http::{create_router, AppState};
pub use session::{CallIdentity, CallSession, SessionConfig, SessionPhase, SessionRegistry, SessionStats};
pub use translation::{
    BackendAudioSink, BackendSession, LanguagePair, TranslationAdapter, TranslationBackend,
    TranslationEvent,
};
pub use transport::{InboundMessage, MediaStreamConnection, OutboundMessage};
