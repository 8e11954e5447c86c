use super::state::AppState;
use crate::config::Config;
use crate::session::SessionStats;
use crate::transport::serve_media_socket;
use axum::{
    extract::{ws::WebSocketUpgrade, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    Form,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Call-control webhook form (only the fields we use)
#[derive(Debug, Default, Deserialize)]
pub struct VoiceRequest {
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,

    #[serde(rename = "From")]
    pub from: Option<String>,

    #[serde(rename = "To")]
    pub to: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub count: usize,
    pub sessions: Vec<SessionStats>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /voice
/// Answer an incoming call: greet, start the media stream, optionally forward
pub async fn voice_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(req): Form<VoiceRequest>,
) -> impl IntoResponse {
    info!(
        "Incoming call {} from {} to {}",
        req.call_sid.as_deref().unwrap_or("-"),
        req.from.as_deref().unwrap_or("unknown"),
        req.to.as_deref().unwrap_or("unknown")
    );

    let host = state.config.service.public_host.clone().or_else(|| {
        headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
    });

    let Some(host) = host else {
        warn!("No Host header and no public host configured, cannot build stream URL");
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Host header required".to_string(),
            }),
        )
            .into_response();
    };

    let body = twiml_response(&state.config, &host, req.from.as_deref());

    (StatusCode::OK, [(header::CONTENT_TYPE, "text/xml")], body).into_response()
}

/// Call-control markup for one incoming call
pub fn twiml_response(config: &Config, host: &str, caller: Option<&str>) -> String {
    let stream_url = format!("wss://{}/media-stream", host);

    let mut twiml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Response>\n");
    twiml.push_str(&format!(
        "  <Say>{}</Say>\n",
        escape_xml(&config.telephony.greeting)
    ));
    twiml.push_str("  <Start>\n");
    twiml.push_str(&format!(
        "    <Stream url=\"{}\" track=\"both_tracks\"/>\n",
        escape_xml(&stream_url)
    ));
    twiml.push_str("  </Start>\n");

    if let Some(number) = &config.telephony.forward_to {
        let caller_id = caller
            .map(|c| format!(" callerId=\"{}\"", escape_xml(c)))
            .unwrap_or_default();
        twiml.push_str(&format!(
            "  <Dial timeout=\"{}\"{}>\n    <Number>{}</Number>\n  </Dial>\n",
            config.telephony.dial_timeout_secs,
            caller_id,
            escape_xml(number)
        ));
    }

    twiml.push_str("</Response>\n");
    twiml
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// GET /media-stream
/// Upgrade to the media stream WebSocket
pub async fn media_stream(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        serve_media_socket(socket, state.registry, state.backend, state.session_config)
    })
}

/// GET /sessions
/// Statistics for every live session
pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    let sessions = state.registry.snapshot().await;

    (
        StatusCode::OK,
        Json(SessionsResponse {
            count: sessions.len(),
            sessions,
        }),
    )
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
