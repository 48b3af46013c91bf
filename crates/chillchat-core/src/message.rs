//! Chat message records
//!
//! Messages are immutable once appended to a session. Ids are sortable by
//! generation time (`msg_<unix-millis>_<random suffix>`), matching histories
//! written by earlier builds of the app.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ChatError, Result};

/// Length of the random id suffix
const ID_SUFFIX_LEN: usize = 9;

// ----------------------------------------------------------------------------
// Sender
// ----------------------------------------------------------------------------

/// Who produced a message, as persisted and as spoken on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Me,
    Other,
    /// Connection banners and similar UI artifacts; never sent on the wire
    System,
}

// ----------------------------------------------------------------------------
// Chat Message
// ----------------------------------------------------------------------------

/// A single message within a chat session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub sender: Sender,
}

impl ChatMessage {
    /// Build a locally-originated message, validating the text
    ///
    /// Leading/trailing whitespace is trimmed before validation, mirroring
    /// what the compose field sends.
    pub fn outgoing(text: &str, max_len: usize) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let length = text.chars().count();
        if length > max_len {
            return Err(ChatError::MessageTooLong {
                length,
                max: max_len,
            });
        }
        Ok(Self {
            id: generate_message_id(),
            text: text.to_string(),
            timestamp: Utc::now(),
            sender: Sender::Me,
        })
    }

    /// Build a message received from the connected peer
    pub fn incoming(text: String, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: generate_message_id(),
            text,
            timestamp,
            sender: Sender::Other,
        }
    }

    /// Build a session-local system banner (not persisted by the core)
    pub fn system<T: Into<String>>(text: T) -> Self {
        Self {
            id: generate_message_id(),
            text: text.into(),
            timestamp: Utc::now(),
            sender: Sender::System,
        }
    }
}

// ----------------------------------------------------------------------------
// Id Generation
// ----------------------------------------------------------------------------

/// Generate a message id: generation millis plus a random suffix
pub fn generate_message_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let uuid = Uuid::new_v4().simple().to_string();
    format!("msg_{}_{}", millis, &uuid[..ID_SUFFIX_LEN])
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outgoing_trims_and_tags_sender() {
        let message = ChatMessage::outgoing("  hello  ", 500).unwrap();
        assert_eq!(message.text, "hello");
        assert_eq!(message.sender, Sender::Me);
        assert!(message.id.starts_with("msg_"));
    }

    #[test]
    fn test_outgoing_rejects_empty() {
        assert!(matches!(
            ChatMessage::outgoing("   ", 500),
            Err(ChatError::EmptyMessage)
        ));
    }

    #[test]
    fn test_outgoing_rejects_oversized() {
        let text = "x".repeat(501);
        match ChatMessage::outgoing(&text, 500) {
            Err(ChatError::MessageTooLong { length, max }) => {
                assert_eq!(length, 501);
                assert_eq!(max, 500);
            }
            other => panic!("expected MessageTooLong, got {:?}", other),
        }

        // Exactly at the bound is fine
        let text = "x".repeat(500);
        assert!(ChatMessage::outgoing(&text, 500).is_ok());
    }

    #[test]
    fn test_message_id_shape() {
        let id = generate_message_id();
        let parts: Vec<&str> = id.splitn(3, '_').collect();
        assert_eq!(parts[0], "msg");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
    }

    #[test]
    fn test_message_ids_are_unique() {
        let a = generate_message_id();
        let b = generate_message_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_sender_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Sender::Me).unwrap(), "\"me\"");
        assert_eq!(serde_json::to_string(&Sender::Other).unwrap(), "\"other\"");
        assert_eq!(serde_json::to_string(&Sender::System).unwrap(), "\"system\"");
    }
}
