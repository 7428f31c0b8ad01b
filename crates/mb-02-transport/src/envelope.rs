//! Wire envelope.
//!
//! On the wire an envelope is a JSON object:
//!
//! ```json
//! {"timestamp": "...", "kind": "inline", "message": {"v": 1}}
//! {"timestamp": "...", "kind": "repository", "server": "repo", "port": "21",
//!  "file path": "mbus-1/exp/a1/observations/json/o1/...", "file extension": ".json"}
//! ```
//!
//! Decoding goes by `kind`. A field the kind requires but the envelope
//! lacks (the `message` of an `inline` envelope, a pointer field of a
//! `repository` envelope) is an encoding error rather than a guess.

use mb_01_repository::BlobPointer;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;
use shared_types::BusError;

/// Where the payload of a posting lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeBody {
    /// JSON text carried in the event itself.
    Inline(Vec<u8>),
    /// Blob in a repository.
    Remote(BlobPointer),
}

/// Event payload wrapping one posting, either inline or as a blob pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Timestamp of the posting, set by the poster.
    pub timestamp: String,
    /// The payload or where to fetch it.
    pub body: EnvelopeBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum WireKind {
    Inline,
    Repository,
}

#[derive(Serialize, Deserialize)]
struct WireEnvelope {
    timestamp: String,
    kind: WireKind,
    #[serde(
        default,
        deserialize_with = "present_message",
        skip_serializing_if = "Option::is_none"
    )]
    message: Option<Box<RawValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    port: Option<String>,
    #[serde(rename = "file path", default, skip_serializing_if = "Option::is_none")]
    file_path: Option<String>,
    #[serde(rename = "file extension", default, skip_serializing_if = "Option::is_none")]
    file_extension: Option<String>,
}

impl Envelope {
    /// Envelope carrying `payload` in the event.
    pub fn inline(timestamp: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            timestamp: timestamp.into(),
            body: EnvelopeBody::Inline(payload),
        }
    }

    /// Envelope pointing at an uploaded blob.
    pub fn remote(timestamp: impl Into<String>, pointer: BlobPointer) -> Self {
        Self {
            timestamp: timestamp.into(),
            body: EnvelopeBody::Remote(pointer),
        }
    }

    /// Whether the payload travels in the event.
    pub fn is_inline(&self) -> bool {
        matches!(self.body, EnvelopeBody::Inline(_))
    }

    /// Serialize for publishing. Inline payloads must be valid JSON.
    pub fn encode(&self) -> Result<Vec<u8>, BusError> {
        let wire = match &self.body {
            EnvelopeBody::Inline(payload) => {
                let text = std::str::from_utf8(payload).map_err(BusError::encoding)?;
                let message = RawValue::from_string(text.to_string()).map_err(BusError::encoding)?;
                WireEnvelope {
                    timestamp: self.timestamp.clone(),
                    kind: WireKind::Inline,
                    message: Some(message),
                    server: None,
                    port: None,
                    file_path: None,
                    file_extension: None,
                }
            }
            EnvelopeBody::Remote(pointer) => WireEnvelope {
                timestamp: self.timestamp.clone(),
                kind: WireKind::Repository,
                message: None,
                server: Some(pointer.server.clone()),
                port: Some(pointer.port.to_string()),
                file_path: Some(pointer.file_path.clone()),
                file_extension: Some(pointer.file_extension.clone()),
            },
        };
        serde_json::to_vec(&wire).map_err(BusError::encoding)
    }

    /// Parse a received event payload. Malformed JSON, an unknown kind or a
    /// field missing for the kind is a [`BusError::Encoding`].
    pub fn decode(bytes: &[u8]) -> Result<Self, BusError> {
        let wire: WireEnvelope = serde_json::from_slice(bytes).map_err(BusError::encoding)?;

        let body = match wire.kind {
            WireKind::Inline => {
                let message = wire.message.ok_or_else(|| missing("message"))?;
                EnvelopeBody::Inline(message.get().as_bytes().to_vec())
            }
            WireKind::Repository => {
                let port = wire.port.ok_or_else(|| missing("port"))?;
                let port = port.parse::<u16>().map_err(|e| {
                    BusError::Encoding(format!("invalid port '{}': {}", port, e))
                })?;
                EnvelopeBody::Remote(BlobPointer {
                    server: wire.server.ok_or_else(|| missing("server"))?,
                    port,
                    file_path: wire.file_path.ok_or_else(|| missing("file path"))?,
                    file_extension: wire
                        .file_extension
                        .ok_or_else(|| missing("file extension"))?,
                })
            }
        };

        Ok(Self {
            timestamp: wire.timestamp,
            body,
        })
    }
}

/// A present `message` keeps its raw text, including a literal `null`;
/// only an absent field stays `None`.
fn present_message<'de, D>(deserializer: D) -> Result<Option<Box<RawValue>>, D::Error>
where
    D: Deserializer<'de>,
{
    Box::<RawValue>::deserialize(deserializer).map(Some)
}

fn missing(field: &str) -> BusError {
    BusError::Encoding(format!("envelope field '{}' missing", field))
}
