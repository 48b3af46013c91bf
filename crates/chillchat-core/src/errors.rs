//! Error types for the ChillChat core
//!
//! Storage failures get their own enum so callers can tell a persistence
//! problem from a radio problem; `ChatError` unifies everything the service
//! layer surfaces to UI collaborators.

use thiserror::Error;

// ----------------------------------------------------------------------------
// Storage Errors
// ----------------------------------------------------------------------------

/// Errors from the key-value store capability or record (de)serialization
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Failed to encode {record} record: {reason}")]
    Encode { record: &'static str, reason: String },

    #[error("Failed to decode {record} record: {reason}")]
    Decode { record: &'static str, reason: String },

    #[error("No session for device {device_id}")]
    SessionNotFound { device_id: String },
}

impl StorageError {
    /// Create a backend error with a message
    pub fn backend<T: Into<String>>(message: T) -> Self {
        StorageError::Backend(message.into())
    }

    /// Create an encode error for a named record kind
    pub fn encode(record: &'static str, err: serde_json::Error) -> Self {
        StorageError::Encode {
            record,
            reason: err.to_string(),
        }
    }

    /// Create a decode error for a named record kind
    pub fn decode(record: &'static str, err: serde_json::Error) -> Self {
        StorageError::Decode {
            record,
            reason: err.to_string(),
        }
    }

    /// Create a missing-session error
    pub fn session_not_found<T: Into<String>>(device_id: T) -> Self {
        StorageError::SessionNotFound {
            device_id: device_id.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Chat Errors
// ----------------------------------------------------------------------------

/// Errors surfaced by the connection service and device directory
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Bluetooth permissions not granted")]
    PermissionDenied,

    #[error("Bluetooth adapter is disabled")]
    AdapterDisabled,

    #[error("Discovery timed out after {duration_ms}ms")]
    DiscoveryTimeout { duration_ms: u64 },

    #[error("Discovery failed: {reason}")]
    DiscoveryFailed { reason: String },

    #[error("Discovery cancelled")]
    DiscoveryCancelled,

    #[error("Failed to connect to {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("No device connected")]
    NotConnected,

    #[error("Write failed: {reason}")]
    WriteError { reason: String },

    #[error("Write timed out after {duration_ms}ms")]
    WriteTimeout { duration_ms: u64 },

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Message too long: {length} chars (max: {max})")]
    MessageTooLong { length: usize, max: usize },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Backend error: {reason}")]
    Backend { reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl ChatError {
    /// Create a discovery failure with a reason
    pub fn discovery_failed<T: Into<String>>(reason: T) -> Self {
        ChatError::DiscoveryFailed {
            reason: reason.into(),
        }
    }

    /// Create a connection failure for an address
    pub fn connection_failed<A: Into<String>, R: Into<String>>(address: A, reason: R) -> Self {
        ChatError::ConnectionFailed {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Create a write failure with a reason
    pub fn write_error<T: Into<String>>(reason: T) -> Self {
        ChatError::WriteError {
            reason: reason.into(),
        }
    }

    /// Create a platform backend failure with a reason
    pub fn backend<T: Into<String>>(reason: T) -> Self {
        ChatError::Backend {
            reason: reason.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = std::result::Result<T, ChatError>;
