//! Wire message types
//!
//! Every frame is a JSON object. Inbound messages carry a `type` tag with
//! the remaining fields alongside it; outbound messages are keyed by their
//! kind, e.g. `{"manifestUpdate": {...}}` or `{"request": "sampleTime"}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::Manifest;

// =============================================================================
// Client -> Server Messages
// =============================================================================

/// An inbound frame: the tagged message plus fields shared by every kind
#[derive(Debug, Clone, Deserialize)]
pub struct ClientEnvelope {
    #[serde(flatten)]
    pub message: ClientMessage,

    /// Client clock position the command was issued at, in seconds
    #[serde(rename = "atTime", default)]
    pub at_time: Option<f64>,

    /// Participant the client says the command originates from
    #[serde(default)]
    pub from: Option<String>,
}

impl ClientEnvelope {
    pub fn new(message: ClientMessage) -> Self {
        Self {
            message,
            at_time: None,
            from: None,
        }
    }

    pub fn at(mut self, at_time: f64) -> Self {
        self.at_time = Some(at_time);
        self
    }

    pub fn sent_by(mut self, participant_id: impl Into<String>) -> Self {
        self.from = Some(participant_id.into());
        self
    }
}

/// Messages sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Start or pause playback
    Play { value: bool },

    /// Seek to a position in seconds
    Time { value: f64 },

    /// Select the item being played
    Select {
        #[serde(default)]
        value: Option<Value>,
    },

    /// Claim the driver role (value present) or release it (value absent)
    Control {
        #[serde(default)]
        value: Option<Value>,
    },

    /// Answer to a server request
    Response {
        #[serde(default)]
        request: Option<String>,
        #[serde(default)]
        response: Option<Value>,
    },

    #[serde(other)]
    Unknown,
}

// =============================================================================
// Server -> Client Messages
// =============================================================================

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ServerMessage {
    /// Full replacement of the session manifest
    ManifestUpdate(Manifest),

    /// The driver changed through an explicit handoff
    DriverUpdate(DriverUpdatePayload),

    /// Something the server wants the client to answer
    Request(RequestKind),

    /// Something went wrong with the client's last frame or connection
    Error(String),
}

impl ServerMessage {
    /// Ask the driver to report its playhead
    pub fn sample_time() -> Self {
        Self::Request(RequestKind::SampleTime)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }
}

/// Payload of a driver handoff notice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverUpdatePayload {
    pub driver: Option<Value>,
    pub selection: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestKind {
    SampleTime,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SampleTime => "sampleTime",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(raw: Value) -> ClientEnvelope {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_play_with_at_time() {
        let envelope = parse(json!({"type": "play", "value": true, "atTime": 12.5}));
        assert!(matches!(envelope.message, ClientMessage::Play { value: true }));
        assert_eq!(envelope.at_time, Some(12.5));
        assert_eq!(envelope.from, None);
    }

    #[test]
    fn test_time_accepts_integer_seconds() {
        let envelope = parse(json!({"type": "time", "value": 30}));
        assert!(matches!(envelope.message, ClientMessage::Time { value } if value == 30.0));
    }

    #[test]
    fn test_select_keeps_opaque_value() {
        let envelope = parse(json!({"type": "select", "value": {"id": "movie42", "title": "Heat"}}));
        match envelope.message {
            ClientMessage::Select { value } => {
                assert_eq!(value, Some(json!({"id": "movie42", "title": "Heat"})))
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_control_without_value_is_release() {
        let envelope = parse(json!({"type": "control", "from": "b"}));
        assert!(matches!(envelope.message, ClientMessage::Control { value: None }));
        assert_eq!(envelope.from.as_deref(), Some("b"));

        let envelope = parse(json!({"type": "control", "value": null}));
        assert!(matches!(envelope.message, ClientMessage::Control { value: None }));
    }

    #[test]
    fn test_response_fields() {
        let envelope = parse(json!({"type": "response", "request": "sampleTime", "response": 57.3}));
        match envelope.message {
            ClientMessage::Response { request, response } => {
                assert_eq!(request.as_deref(), Some(RequestKind::SampleTime.as_str()));
                assert_eq!(response, Some(json!(57.3)));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_parses() {
        let envelope = parse(json!({"type": "dance", "value": 1}));
        assert!(matches!(envelope.message, ClientMessage::Unknown));
    }

    #[test]
    fn test_missing_type_is_an_error() {
        let result = serde_json::from_value::<ClientEnvelope>(json!({"value": true}));
        assert!(result.is_err());
    }

    #[test]
    fn test_server_message_wire_format() {
        assert_eq!(
            serde_json::to_value(ServerMessage::sample_time()).unwrap(),
            json!({"request": "sampleTime"})
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::error("nope")).unwrap(),
            json!({"error": "nope"})
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::DriverUpdate(DriverUpdatePayload {
                driver: None,
                selection: None,
            }))
            .unwrap(),
            json!({"driverUpdate": {"driver": null, "selection": null}})
        );

        let manifest = Manifest {
            current_time: 3.5,
            is_playing: true,
            controller: Some("a".into()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(ServerMessage::ManifestUpdate(manifest)).unwrap(),
            json!({"manifestUpdate": {"currentTime": 3.5, "isPlaying": true, "controller": "a"}})
        );
    }
}
