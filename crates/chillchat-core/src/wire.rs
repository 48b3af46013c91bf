//! Serial wire codec
//!
//! One JSON object per write: `{"text", "timestamp", "sender"}`. The decode
//! side accepts that structured form from peers running this app, and falls
//! back to treating the raw payload as plain text for peers that are not
//! speaking the format (a serial terminal, an older build). Inbound traffic
//! is always normalized to `sender = "other"`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{ChatError, Result};
use crate::message::{ChatMessage, Sender};

// ----------------------------------------------------------------------------
// Wire Message
// ----------------------------------------------------------------------------

/// The frame as written to the serial link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub sender: Sender,
}

impl WireMessage {
    pub fn from_message(message: &ChatMessage) -> Self {
        Self {
            text: message.text.clone(),
            timestamp: message.timestamp,
            sender: message.sender,
        }
    }
}

/// Structured frame as accepted from the peer; the sender tag is ignored on
/// receipt and the timestamp may be absent
#[derive(Debug, Deserialize)]
struct InboundFrame {
    text: String,
    timestamp: Option<DateTime<Utc>>,
}

// ----------------------------------------------------------------------------
// Codec
// ----------------------------------------------------------------------------

/// Encoder/decoder for serial frames
pub struct WireCodec;

impl WireCodec {
    /// Encode an outgoing message as a JSON frame
    pub fn encode(message: &ChatMessage) -> Result<Vec<u8>> {
        serde_json::to_vec(&WireMessage::from_message(message))
            .map_err(|e| ChatError::write_error(format!("Failed to encode frame: {}", e)))
    }

    /// Decode an inbound payload into a received message
    ///
    /// Never fails: payloads that do not parse as a structured frame are
    /// taken verbatim as message text with a locally generated timestamp.
    pub fn decode(bytes: &[u8]) -> ChatMessage {
        match serde_json::from_slice::<InboundFrame>(bytes) {
            Ok(frame) => {
                let timestamp = frame.timestamp.unwrap_or_else(Utc::now);
                ChatMessage::incoming(frame.text, timestamp)
            }
            Err(_) => {
                let text = String::from_utf8_lossy(bytes).into_owned();
                debug!(len = bytes.len(), "Inbound payload is not a frame, treating as plain text");
                ChatMessage::incoming(text, Utc::now())
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
