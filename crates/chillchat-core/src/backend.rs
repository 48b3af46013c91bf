//! Bluetooth platform capability
//!
//! Everything the core needs from the host radio, expressed as traits so the
//! directory and connection service run unchanged against real platform
//! bindings or a test double: permission and adapter queries, bonded-device
//! enumeration, one-shot discovery scans, and serial connections.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::Result;
use crate::types::DeviceAddress;

// ----------------------------------------------------------------------------
// Backend Records
// ----------------------------------------------------------------------------

/// Device record as reported by the platform, before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDevice {
    pub name: Option<String>,
    pub address: String,
}

/// Inbound events for one open link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Bytes arrived on the serial connection
    Data(Vec<u8>),
    /// The link dropped without a local disconnect call
    Closed { reason: String },
}

/// An open serial connection: the write half plus its inbound event stream
///
/// The receiver is consumed by exactly one pump task; the backend stops
/// sending after `Closed`. The channel is created by the backend with the
/// capacity the caller passed to [`BluetoothBackend::connect`].
pub struct LinkHandle {
    pub link: Box<dyn SerialLink>,
    pub events: mpsc::Receiver<LinkEvent>,
}

// ----------------------------------------------------------------------------
// Capability Traits
// ----------------------------------------------------------------------------

/// Write half of an open serial connection
#[async_trait]
pub trait SerialLink: Send + Sync {
    /// Write one frame to the peer
    async fn write(&self, bytes: &[u8]) -> Result<()>;

    /// Close the connection; the peer sees the link drop
    async fn close(&self) -> Result<()>;
}

/// Host Bluetooth surface
#[async_trait]
pub trait BluetoothBackend: Send + Sync {
    /// Request Bluetooth and location runtime permissions
    async fn request_permissions(&self) -> Result<bool>;

    /// Whether the adapter is powered on
    async fn is_enabled(&self) -> Result<bool>;

    /// Prompt the user to enable the adapter; true once enabled
    async fn request_enable(&self) -> Result<bool>;

    /// Devices with an existing OS pairing record
    async fn bonded_devices(&self) -> Result<Vec<RawDevice>>;

    /// Run one discovery scan to completion and return what was found
    async fn start_discovery(&self) -> Result<Vec<RawDevice>>;

    /// Abort an in-flight discovery scan
    async fn cancel_discovery(&self) -> Result<()>;

    /// Open a serial connection to `address`; the link's inbound event
    /// channel is created with room for `inbound_capacity` events
    async fn connect(&self, address: &DeviceAddress, inbound_capacity: usize)
        -> Result<LinkHandle>;
}
