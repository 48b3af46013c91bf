//! Device directory: bonded device listing and time-boxed discovery
//!
//! Produces the set of devices a user can connect to, from two sources: the
//! adapter's pairing records and a Bluetooth Classic scan. Raw backend
//! records are normalized into [`Device`] at this boundary, so nothing
//! downstream sees platform shapes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

use chillchat_core::{BluetoothBackend, ChatError, Device, Result};

// ----------------------------------------------------------------------------
// Device Directory
// ----------------------------------------------------------------------------

/// Lists bonded devices and runs one discovery scan at a time
pub struct DeviceDirectory {
    backend: Arc<dyn BluetoothBackend>,
    cancel: Notify,
    /// Held for the duration of a scan, so a restart waits for the
    /// cancelled scan to unwind before touching the adapter again
    scan_slot: Mutex<()>,
}

impl DeviceDirectory {
    pub fn new(backend: Arc<dyn BluetoothBackend>) -> Self {
        Self {
            backend,
            cancel: Notify::new(),
            scan_slot: Mutex::new(()),
        }
    }

    /// Previously paired devices, normalized with `bonded=true`.
    ///
    /// Fails soft: an adapter error is logged and reported as an empty
    /// list, since having no pairing records is a normal state.
    pub async fn list_bonded(&self) -> Vec<Device> {
        match self.backend.bonded_devices().await {
            Ok(raw) => raw
                .into_iter()
                .map(|device| Device::from_raw(device, true))
                .collect(),
            Err(err) => {
                warn!(%err, "Failed to list bonded devices");
                Vec::new()
            }
        }
    }

    /// Scan for nearby unbonded devices for at most `timeout`.
    ///
    /// Any in-flight scan is cancelled first, so calling this again is a
    /// restart. Ends in one of four ways: the scan resolves with devices,
    /// the window expires (`DiscoveryTimeout`), [`cancel_discovery`]
    /// interrupts it (`DiscoveryCancelled`), or the adapter reports an
    /// error (`DiscoveryFailed`).
    ///
    /// [`cancel_discovery`]: Self::cancel_discovery
    pub async fn discover(&self, timeout: Duration) -> Result<Vec<Device>> {
        self.cancel.notify_waiters();
        let _slot = self.scan_slot.lock().await;

        let cancelled = self.cancel.notified();
        tokio::pin!(cancelled);
        cancelled.as_mut().enable();

        info!(timeout_ms = timeout.as_millis() as u64, "Starting discovery");
        let scan = self.backend.start_discovery();
        tokio::pin!(scan);

        let raw = tokio::select! {
            result = &mut scan => match result {
                Ok(raw) => raw,
                Err(err) => {
                    warn!(%err, "Discovery failed");
                    return Err(ChatError::discovery_failed(err.to_string()));
                }
            },
            _ = tokio::time::sleep(timeout) => {
                self.stop_backend_scan().await;
                warn!(timeout_ms = timeout.as_millis() as u64, "Discovery timed out");
                return Err(ChatError::DiscoveryTimeout {
                    duration_ms: timeout.as_millis() as u64,
                });
            }
            _ = &mut cancelled => {
                self.stop_backend_scan().await;
                debug!("Discovery cancelled");
                return Err(ChatError::DiscoveryCancelled);
            }
        };

        let devices: Vec<Device> = raw
            .into_iter()
            .map(|device| Device::from_raw(device, false))
            .collect();
        info!(count = devices.len(), "Discovery finished");
        Ok(devices)
    }

    /// Interrupt an in-flight [`discover`] call, if any.
    ///
    /// Safe to call at any time; the directory can start a new scan
    /// immediately afterwards.
    ///
    /// [`discover`]: Self::discover
    pub async fn cancel_discovery(&self) {
        self.cancel.notify_waiters();
        self.stop_backend_scan().await;
    }

    /// Bonded and discovered devices as one list, bonded entries first
    pub async fn scan(&self, timeout: Duration) -> Result<Vec<Device>> {
        let bonded = self.list_bonded().await;
        let discovered = self.discover(timeout).await?;
        Ok(merge_unique(bonded, discovered))
    }

    async fn stop_backend_scan(&self) {
        if let Err(err) = self.backend.cancel_discovery().await {
            warn!(%err, "Failed to stop adapter discovery");
        }
    }
}

// ----------------------------------------------------------------------------
// Merging
// ----------------------------------------------------------------------------

/// Union of two device lists keyed by address; entries from `bonded` win
/// when both lists carry the same address
pub fn merge_unique(bonded: Vec<Device>, discovered: Vec<Device>) -> Vec<Device> {
    let mut merged = bonded;
    for device in discovered {
        if !merged.iter().any(|known| known.address == device.address) {
            merged.push(device);
        }
    }
    merged
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
