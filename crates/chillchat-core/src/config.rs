//! Configuration for the connection service and device directory

use std::time::Duration;

// ----------------------------------------------------------------------------
// Chat Configuration
// ----------------------------------------------------------------------------

/// Tunables for discovery, writes and inbound buffering
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// How long a discovery scan may run before failing with a timeout.
    /// Classic discovery needs north of 10s for peers to become visible.
    pub discovery_timeout: Duration,
    /// Bound on a single serial write
    pub write_timeout: Duration,
    /// Maximum characters in a locally composed message
    pub max_message_len: usize,
    /// Capacity of the inbound link-event channel
    pub inbound_buffer: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            discovery_timeout: Duration::from_secs(12),
            write_timeout: Duration::from_secs(5),
            max_message_len: 500,
            inbound_buffer: 32,
        }
    }
}

impl ChatConfig {
    /// Configuration for tests: short timeouts, small buffers
    pub fn testing() -> Self {
        Self {
            discovery_timeout: Duration::from_millis(100),
            write_timeout: Duration::from_millis(50),
            max_message_len: 500,
            inbound_buffer: 8,
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
