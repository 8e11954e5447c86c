use crate::error::BridgeError;
use crate::translation::LanguagePair;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Message received on the media WebSocket
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum InboundMessage {
    /// Socket established, no stream yet
    Connected {
        #[serde(default)]
        protocol: Option<String>,
        #[serde(default)]
        version: Option<String>,
    },
    /// Stream metadata; carries the call/stream identifiers
    Start {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
        start: StartPayload,
    },
    /// One chunk of base64 µ-law audio
    Media {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
        media: MediaPayload,
    },
    /// Stream ended (call hung up or stream stopped)
    Stop {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
    },
    /// Playback marker acknowledged by the provider
    Mark {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
        mark: MarkPayload,
    },
    /// Keypad digit pressed by the caller
    Dtmf {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
        dtmf: DtmfPayload,
    },
}

impl InboundMessage {
    /// Parse one text frame. Malformed JSON or an unknown event tag is a
    /// protocol error.
    pub fn parse(text: &str) -> Result<Self, BridgeError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            InboundMessage::Connected { .. } => "connected",
            InboundMessage::Start { .. } => "start",
            InboundMessage::Media { .. } => "media",
            InboundMessage::Stop { .. } => "stop",
            InboundMessage::Mark { .. } => "mark",
            InboundMessage::Dtmf { .. } => "dtmf",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartPayload {
    #[serde(rename = "callSid")]
    pub call_sid: String,

    #[serde(rename = "streamSid", default)]
    pub stream_sid: Option<String>,

    #[serde(rename = "accountSid", default)]
    pub account_sid: Option<String>,

    #[serde(default)]
    pub tracks: Vec<String>,

    #[serde(rename = "mediaFormat", default)]
    pub media_format: Option<MediaFormat>,

    /// Parameters set on the stream by the call-control markup
    #[serde(rename = "customParameters", default)]
    pub custom_parameters: HashMap<String, String>,
}

impl StartPayload {
    /// Language pair requested for this stream, falling back per side to `defaults`
    pub fn languages(&self, defaults: &LanguagePair) -> LanguagePair {
        let pick = |key: &str, fallback: &str| {
            self.custom_parameters
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .unwrap_or(fallback)
                .to_string()
        };

        LanguagePair {
            source: pick("sourceLanguage", &defaults.source),
            target: pick("targetLanguage", &defaults.target),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaFormat {
    pub encoding: String,
    #[serde(rename = "sampleRate")]
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaPayload {
    /// "inbound" (caller) or "outbound" (far leg) when both tracks are streamed
    #[serde(default)]
    pub track: Option<String>,
    #[serde(default)]
    pub chunk: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Base64-encoded µ-law bytes
    pub payload: String,
}

impl MediaPayload {
    pub fn is_caller_audio(&self) -> bool {
        !matches!(self.track.as_deref(), Some("outbound"))
    }

    pub fn decode(&self) -> Result<Vec<u8>, BridgeError> {
        Ok(base64::engine::general_purpose::STANDARD.decode(&self.payload)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarkPayload {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DtmfPayload {
    #[serde(default)]
    pub track: Option<String>,
    pub digit: String,
}

/// Message sent back on the media WebSocket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum OutboundMessage {
    /// Audio to play to the caller
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: OutboundMedia,
    },
    /// Discard audio the provider has buffered but not yet played
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutboundMedia {
    /// Base64-encoded µ-law bytes
    pub payload: String,
}

impl OutboundMessage {
    pub fn media(stream_sid: &str, mulaw: &[u8]) -> Self {
        OutboundMessage::Media {
            stream_sid: stream_sid.to_string(),
            media: OutboundMedia {
                payload: base64::engine::general_purpose::STANDARD.encode(mulaw),
            },
        }
    }

    pub fn clear(stream_sid: &str) -> Self {
        OutboundMessage::Clear {
            stream_sid: stream_sid.to_string(),
        }
    }

    pub fn stream_sid(&self) -> &str {
        match self {
            OutboundMessage::Media { stream_sid, .. } | OutboundMessage::Clear { stream_sid } => stream_sid,
        }
    }

    /// µ-law bytes carried by a media message
    pub fn mulaw(&self) -> Option<Result<Vec<u8>, BridgeError>> {
        match self {
            OutboundMessage::Media { media, .. } => Some(
                base64::engine::general_purpose::STANDARD
                    .decode(&media.payload)
                    .map_err(BridgeError::from),
            ),
            OutboundMessage::Clear { .. } => None,
        }
    }
}
