//! ChillChat Core
//!
//! Foundational types and persistence for the ChillChat Bluetooth Classic
//! chat system: device and message types, the JSON wire format, the session
//! store over an injected key-value backend, and the capability traits a
//! platform runtime implements (Bluetooth adapter access, storage).

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod backend;
pub mod config;
pub mod errors;
pub mod message;
pub mod registry;
pub mod session;
pub mod settings;
pub mod storage;
pub mod store;
pub mod types;
pub mod wire;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use backend::{BluetoothBackend, LinkEvent, LinkHandle, RawDevice, SerialLink};
pub use config::ChatConfig;
pub use errors::{ChatError, Result, StorageError};
pub use message::{generate_message_id, ChatMessage, Sender};
pub use registry::{ListenerId, ListenerSet};
pub use session::ChatSession;
pub use settings::{AppSettings, Profile, ProfilePatch, SettingsPatch, Theme};
pub use storage::{FallbackStore, KeyValueStore, MemoryStore};
pub use store::SessionStore;
pub use types::{BluetoothStatus, Device, DeviceAddress, DeviceId, UNKNOWN_DEVICE_NAME};
pub use wire::{WireCodec, WireMessage};
