use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
/// Messages accepted from signal gateway WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeInboundMessage {
    /// A button press. `token` is a key token or a color name.
    Signal { token: String },
}

/// Why a gateway frame was dropped.
#[derive(Debug, Error)]
pub enum BridgeFrameError {
    #[error("empty frame")]
    Empty,
    #[error("malformed JSON frame: {0}")]
    Json(#[from] serde_json::Error),
}

impl BridgeInboundMessage {
    /// Parse a text frame. JSON objects are decoded as tagged messages; anything
    /// else is a bare token, trimmed and lower-cased.
    pub fn from_frame(text: &str) -> Result<Self, BridgeFrameError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(BridgeFrameError::Empty);
        }
        if trimmed.starts_with('{') {
            return Ok(serde_json::from_str(trimmed)?);
        }
        Ok(Self::Signal {
            token: trimmed.to_lowercase(),
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Sent to a gateway once its connection is registered.
pub struct BridgeAck {
    pub id: Uuid,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_frames_are_trimmed_and_lowercased() {
        assert_eq!(
            BridgeInboundMessage::from_frame("  Blue\n").unwrap(),
            BridgeInboundMessage::Signal {
                token: "blue".into()
            }
        );
        assert_eq!(
            BridgeInboundMessage::from_frame("К").unwrap(),
            BridgeInboundMessage::Signal { token: "к".into() }
        );
    }

    #[test]
    fn json_frames_are_decoded() {
        assert_eq!(
            BridgeInboundMessage::from_frame(r#"{"type":"signal","token":"b"}"#).unwrap(),
            BridgeInboundMessage::Signal { token: "b".into() }
        );
        assert!(matches!(
            BridgeInboundMessage::from_frame(r#"{"type":"hello"}"#),
            Err(BridgeFrameError::Json(_))
        ));
    }

    #[test]
    fn empty_frames_are_rejected() {
        assert!(matches!(
            BridgeInboundMessage::from_frame("   "),
            Err(BridgeFrameError::Empty)
        ));
    }
}
