//! Device identity types
//!
//! Newtypes for the two spellings of a device's identity: the MAC-style
//! `DeviceAddress` the radio speaks, and the `DeviceId` derived from it that
//! keys persisted sessions. Backend device records are normalized into the
//! single [`Device`] shape at the directory boundary so nothing downstream
//! sees platform-specific representations.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::backend::RawDevice;

/// Display name used when the backend reports a device without one
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown Device";

// ----------------------------------------------------------------------------
// Device Address
// ----------------------------------------------------------------------------

/// MAC-style Bluetooth Classic address, normalized to uppercase
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    /// Create an address, normalizing case
    pub fn new<T: Into<String>>(address: T) -> Self {
        Self(address.into().to_ascii_uppercase())
    }

    /// Get the address string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive the session key for this address
    pub fn device_id(&self) -> DeviceId {
        DeviceId(self.0.replace(':', "_"))
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceAddress {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

// ----------------------------------------------------------------------------
// Device Identifier
// ----------------------------------------------------------------------------

/// Stable session key derived from an address (`:` replaced with `_`, so the
/// id stays safe to embed in storage keys and file names)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create an id from an already-derived string
    pub fn new<T: Into<String>>(id: T) -> Self {
        Self(id.into())
    }

    /// Get the id string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&DeviceAddress> for DeviceId {
    fn from(address: &DeviceAddress) -> Self {
        address.device_id()
    }
}

// ----------------------------------------------------------------------------
// Device
// ----------------------------------------------------------------------------

/// A known or discovered peer device
///
/// Ephemeral: rebuilt on every bonded-list read or scan, never persisted
/// directly (sessions carry their own copy of the name and address).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub address: DeviceAddress,
    pub bonded: bool,
}

impl Device {
    /// Normalize a backend device record
    pub fn from_raw(raw: RawDevice, bonded: bool) -> Self {
        let address = DeviceAddress::new(raw.address);
        let name = match raw.name {
            Some(name) if !name.trim().is_empty() => name,
            _ => UNKNOWN_DEVICE_NAME.to_string(),
        };
        Self {
            id: address.device_id(),
            name,
            address,
            bonded,
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

// ----------------------------------------------------------------------------
// Bluetooth Status
// ----------------------------------------------------------------------------

/// Aggregate readiness snapshot for UI status panels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BluetoothStatus {
    pub permissions_granted: bool,
    pub enabled: bool,
    pub ready: bool,
}

impl BluetoothStatus {
    pub fn new(permissions_granted: bool, enabled: bool) -> Self {
        Self {
            permissions_granted,
            enabled,
            ready: permissions_granted && enabled,
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
