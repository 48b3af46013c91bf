//! Persisted chat sessions
//!
//! One session per device identity, created on the first successful
//! connection and kept until the user deletes it. Serialized field names are
//! camelCase so records written by earlier builds of the app stay readable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::ChatMessage;
use crate::types::{Device, DeviceAddress, DeviceId};

// ----------------------------------------------------------------------------
// Chat Session
// ----------------------------------------------------------------------------

/// The conversation record for one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub device_id: DeviceId,
    pub device_name: String,
    pub device_address: DeviceAddress,
    pub last_connected: DateTime<Utc>,
    pub messages: Vec<ChatMessage>,
    pub is_active: bool,
}

impl ChatSession {
    /// Create the session for a newly connected device
    pub fn new(device: &Device) -> Self {
        Self {
            device_id: device.id.clone(),
            device_name: device.name.clone(),
            device_address: device.address.clone(),
            last_connected: Utc::now(),
            messages: Vec::new(),
            is_active: true,
        }
    }

    /// Most recent message, if any
    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RawDevice;
    use crate::message::Sender;

    fn test_device() -> Device {
        Device::from_raw(
            RawDevice {
                name: Some("Peer1".to_string()),
                address: "AA:BB:CC:DD:EE:FF".to_string(),
            },
            false,
        )
    }

    #[test]
    fn test_new_session_is_active_and_empty() {
        let session = ChatSession::new(&test_device());
        assert_eq!(session.device_id.as_str(), "AA_BB_CC_DD_EE_FF");
        assert_eq!(session.device_name, "Peer1");
        assert!(session.is_active);
        assert!(session.messages.is_empty());
        assert!(session.last_message().is_none());
    }

    #[test]
    fn test_serialized_field_names_are_camel_case() {
        let session = ChatSession::new(&test_device());
        let value = serde_json::to_value(&session).unwrap();

        assert!(value.get("deviceId").is_some());
        assert!(value.get("deviceName").is_some());
        assert!(value.get("deviceAddress").is_some());
        assert!(value.get("lastConnected").is_some());
        assert!(value.get("isActive").is_some());
    }

    #[test]
    fn test_last_message_follows_append_order() {
        let mut session = ChatSession::new(&test_device());
        session
            .messages
            .push(ChatMessage::incoming("first".to_string(), Utc::now()));
        session
            .messages
            .push(ChatMessage::incoming("second".to_string(), Utc::now()));

        assert_eq!(session.message_count(), 2);
        let last = session.last_message().unwrap();
        assert_eq!(last.text, "second");
        assert_eq!(last.sender, Sender::Other);
    }
}
