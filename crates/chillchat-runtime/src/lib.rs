//! ChillChat Runtime
//!
//! The connection engine for ChillChat:
//! - `ChatService`: the single-connection state machine, message send path
//!   and listener fan-out
//! - `DeviceDirectory`: bonded-device listing and time-boxed discovery
//!
//! `chillchat-core` provides the types, wire format and session store this
//! engine drives; a platform crate supplies the `BluetoothBackend` and
//! `KeyValueStore` capabilities.

pub mod directory;
pub mod service;

pub use directory::{merge_unique, DeviceDirectory};
pub use service::{ChatService, ConnectionState, ConnectionUpdate, DisconnectCause};

// Re-export core types for convenience
pub use chillchat_core::{
    AppSettings, BluetoothBackend, BluetoothStatus, ChatConfig, ChatError, ChatMessage,
    ChatSession, Device, DeviceAddress, DeviceId, FallbackStore, KeyValueStore, LinkEvent,
    LinkHandle, ListenerId, MemoryStore, Profile, ProfilePatch, RawDevice, Result, Sender,
    SerialLink, SessionStore, SettingsPatch, StorageError, Theme,
};
