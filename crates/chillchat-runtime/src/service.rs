//! Connection service
//!
//! Owns the single Bluetooth Classic connection: precondition checks,
//! the `Disconnected -> Connecting -> Connected` lifecycle, the coupling
//! between a live link and its persisted session, and the fan-out of
//! message and connection events to registered listeners.
//!
//! Inbound bytes are consumed by one pump task per connection. Each
//! connect attempt carries a number; the pump compares it against the
//! current state before touching anything, so a stale pump from an
//! earlier link can never override the state of a newer one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use chillchat_core::{
    BluetoothBackend, BluetoothStatus, ChatConfig, ChatError, ChatMessage, ChatSession, Device,
    DeviceId, KeyValueStore, LinkEvent, LinkHandle, ListenerId, ListenerSet, Result, SerialLink,
    SessionStore, WireCodec,
};

use crate::directory::DeviceDirectory;

// ----------------------------------------------------------------------------
// Connection State
// ----------------------------------------------------------------------------

/// Externally visible connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Why a connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectCause {
    /// The local user asked for the disconnect
    Requested,
    /// A connect attempt did not produce a usable link
    Failed,
    /// The peer dropped an established link
    Lost,
}

/// Payload delivered to connection listeners on every state change
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionUpdate {
    Connected { device: Device },
    Disconnected { cause: DisconnectCause },
}

/// Internal state, including the live link halves
enum LinkState {
    Disconnected,
    Connecting { device: Device, attempt: u64 },
    Connected(ActiveLink),
}

struct ActiveLink {
    device: Device,
    link: Box<dyn SerialLink>,
    attempt: u64,
    pump: JoinHandle<()>,
}

// ----------------------------------------------------------------------------
// Chat Service
// ----------------------------------------------------------------------------

/// The connection state machine and its listener registries
pub struct ChatService<S> {
    backend: Arc<dyn BluetoothBackend>,
    directory: DeviceDirectory,
    store: Arc<SessionStore<S>>,
    config: ChatConfig,
    state: Arc<Mutex<LinkState>>,
    attempts: AtomicU64,
    /// Session shown by the UI while no connection exists
    attached: Mutex<Option<DeviceId>>,
    message_listeners: Arc<ListenerSet<ChatMessage>>,
    connection_listeners: Arc<ListenerSet<ConnectionUpdate>>,
}

impl<S: KeyValueStore + 'static> ChatService<S> {
    pub fn new(
        backend: Arc<dyn BluetoothBackend>,
        store: Arc<SessionStore<S>>,
        config: ChatConfig,
    ) -> Self {
        let directory = DeviceDirectory::new(Arc::clone(&backend));
        Self {
            backend,
            directory,
            store,
            config,
            state: Arc::new(Mutex::new(LinkState::Disconnected)),
            attempts: AtomicU64::new(0),
            attached: Mutex::new(None),
            message_listeners: Arc::new(ListenerSet::new("message")),
            connection_listeners: Arc::new(ListenerSet::new("connection")),
        }
    }

    // ------------------------------------------------------------------
    // Preconditions and discovery
    // ------------------------------------------------------------------

    /// Check permissions and adapter power, asking the platform to enable
    /// the adapter once if it is off. Fails with `PermissionDenied` or
    /// `AdapterDisabled` so callers can prompt the user accordingly.
    pub async fn ensure_ready(&self) -> Result<BluetoothStatus> {
        let permissions_granted = self.backend.request_permissions().await?;
        if !permissions_granted {
            warn!("Bluetooth permissions denied");
            return Err(ChatError::PermissionDenied);
        }

        let mut enabled = self.backend.is_enabled().await?;
        if !enabled {
            info!("Bluetooth adapter off, requesting enable");
            enabled = self.backend.request_enable().await?;
        }
        if !enabled {
            warn!("Bluetooth adapter disabled");
            return Err(ChatError::AdapterDisabled);
        }

        Ok(BluetoothStatus::new(permissions_granted, enabled))
    }

    pub fn directory(&self) -> &DeviceDirectory {
        &self.directory
    }

    /// Bonded plus discovered devices, using the configured scan window
    pub async fn scan_devices(&self) -> Result<Vec<Device>> {
        self.directory.scan(self.config.discovery_timeout).await
    }

    pub async fn cancel_discovery(&self) {
        self.directory.cancel_discovery().await;
    }

    // ------------------------------------------------------------------
    // Connection lifecycle
    // ------------------------------------------------------------------

    /// Connect to a device, implicitly disconnecting any current link.
    ///
    /// On success the device's session exists, is active, and is returned;
    /// listeners have been told `Connected`. On failure the state is back
    /// to `Disconnected` and listeners have been told so.
    pub async fn connect(&self, device: &Device) -> Result<ChatSession> {
        // At most one live connection
        self.disconnect().await;

        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = self.state.lock().await;
            *state = LinkState::Connecting {
                device: device.clone(),
                attempt,
            };
        }
        info!(device = %device, "Connecting");

        let handle = match self
            .backend
            .connect(&device.address, self.config.inbound_buffer)
            .await
        {
            Ok(handle) => handle,
            Err(err) => {
                let err = match err {
                    failed @ ChatError::ConnectionFailed { .. } => failed,
                    other => ChatError::connection_failed(device.address.as_str(), other.to_string()),
                };
                warn!(device = %device, %err, "Connection attempt failed");
                self.abandon_attempt(attempt).await;
                return Err(err);
            }
        };
        let LinkHandle { link, events } = handle;

        let mut state = self.state.lock().await;
        let still_ours =
            matches!(&*state, LinkState::Connecting { attempt: current, .. } if *current == attempt);
        if !still_ours {
            drop(state);
            debug!(device = %device, "Connect attempt superseded, dropping link");
            Self::close_quietly(link).await;
            return Err(ChatError::connection_failed(
                device.address.as_str(),
                "disconnected during connect",
            ));
        }

        // Bind the session while holding the state lock, so a disconnect
        // cannot interleave between the link opening and the session
        // becoming active
        let session = match self.store.create_or_update_session(device).await {
            Ok(session) => session,
            Err(err) => {
                *state = LinkState::Disconnected;
                drop(state);
                warn!(device = %device, %err, "Failed to bind session, dropping link");
                Self::close_quietly(link).await;
                self.connection_listeners.notify(&ConnectionUpdate::Disconnected {
                    cause: DisconnectCause::Failed,
                });
                return Err(err.into());
            }
        };

        let pump = self.spawn_pump(device.clone(), events, attempt);
        *state = LinkState::Connected(ActiveLink {
            device: device.clone(),
            link,
            attempt,
            pump,
        });
        drop(state);

        info!(device = %device, "Connected");
        self.connection_listeners.notify(&ConnectionUpdate::Connected {
            device: device.clone(),
        });
        Ok(session)
    }

    /// Tear down the current connection, if any. Idempotent.
    ///
    /// The session is marked inactive before listeners hear about the
    /// disconnect, and no inbound data can land after that write.
    pub async fn disconnect(&self) {
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, LinkState::Disconnected) {
            LinkState::Disconnected => {}
            LinkState::Connecting { device, .. } => {
                drop(state);
                info!(device = %device, "Disconnect requested during connect attempt");
                self.connection_listeners.notify(&ConnectionUpdate::Disconnected {
                    cause: DisconnectCause::Requested,
                });
            }
            LinkState::Connected(active) => {
                info!(device = %active.device, "Disconnecting");
                active.pump.abort();
                if let Err(err) = active.link.close().await {
                    warn!(%err, "Failed to close link");
                }
                if let Err(err) = self.store.set_active(&active.device.id, false).await {
                    warn!(device = %active.device, %err, "Failed to mark session inactive");
                }
                drop(state);
                self.connection_listeners.notify(&ConnectionUpdate::Disconnected {
                    cause: DisconnectCause::Requested,
                });
            }
        }
    }

    /// Send a text message over the live connection.
    ///
    /// Fails with `NotConnected` unless the state is `Connected`. On
    /// success the message has been written to the wire and appended to
    /// the bound session, and is returned.
    pub async fn send_message(&self, text: &str) -> Result<ChatMessage> {
        let mut state = self.state.lock().await;
        let active = match &mut *state {
            LinkState::Connected(active) => active,
            _ => return Err(ChatError::NotConnected),
        };

        let message = ChatMessage::outgoing(text, self.config.max_message_len)?;
        let frame = WireCodec::encode(&message)?;

        let write_timeout = self.config.write_timeout;
        match timeout(write_timeout, active.link.write(&frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                let err = match err {
                    write @ ChatError::WriteError { .. } => write,
                    other => ChatError::write_error(other.to_string()),
                };
                warn!(device = %active.device, %err, "Serial write failed");
                return Err(err);
            }
            Err(_) => {
                let duration_ms = write_timeout.as_millis() as u64;
                warn!(device = %active.device, duration_ms, "Serial write timed out");
                return Err(ChatError::WriteTimeout { duration_ms });
            }
        }

        self.store.append_message(&active.device.id, &message).await?;
        debug!(device = %active.device, "Message sent");
        Ok(message)
    }

    // ------------------------------------------------------------------
    // State queries and session attachment
    // ------------------------------------------------------------------

    pub async fn connection_state(&self) -> ConnectionState {
        match &*self.state.lock().await {
            LinkState::Disconnected => ConnectionState::Disconnected,
            LinkState::Connecting { .. } => ConnectionState::Connecting,
            LinkState::Connected(_) => ConnectionState::Connected,
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.connection_state().await == ConnectionState::Connected
    }

    pub async fn connected_device(&self) -> Option<Device> {
        match &*self.state.lock().await {
            LinkState::Connected(active) => Some(active.device.clone()),
            _ => None,
        }
    }

    /// Point the UI at a stored session without connecting. Sending still
    /// requires a live connection.
    pub async fn attach_session(&self, device_id: &DeviceId) {
        let mut attached = self.attached.lock().await;
        *attached = Some(device_id.clone());
    }

    pub async fn detach_session(&self) {
        let mut attached = self.attached.lock().await;
        *attached = None;
    }

    /// The session to display: the connected device's session when a link
    /// is live, otherwise whatever was attached
    pub async fn active_session(&self) -> Option<ChatSession> {
        if let Some(device) = self.connected_device().await {
            return self.store.get_session(&device.id).await;
        }
        let attached = self.attached.lock().await.clone();
        match attached {
            Some(device_id) => self.store.get_session(&device_id).await,
            None => None,
        }
    }

    pub fn store(&self) -> &SessionStore<S> {
        &self.store
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    pub fn add_message_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ChatMessage) + Send + Sync + 'static,
    {
        self.message_listeners.add(listener)
    }

    pub fn remove_message_listener(&self, id: ListenerId) -> bool {
        self.message_listeners.remove(id)
    }

    pub fn add_connection_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ConnectionUpdate) + Send + Sync + 'static,
    {
        self.connection_listeners.add(listener)
    }

    pub fn remove_connection_listener(&self, id: ListenerId) -> bool {
        self.connection_listeners.remove(id)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Reset a failed connect attempt, unless a newer attempt owns the state
    async fn abandon_attempt(&self, attempt: u64) {
        let mut state = self.state.lock().await;
        let ours =
            matches!(&*state, LinkState::Connecting { attempt: current, .. } if *current == attempt);
        if ours {
            *state = LinkState::Disconnected;
        }
        drop(state);
        if ours {
            self.connection_listeners.notify(&ConnectionUpdate::Disconnected {
                cause: DisconnectCause::Failed,
            });
        }
    }

    async fn close_quietly(link: Box<dyn SerialLink>) {
        if let Err(err) = link.close().await {
            debug!(%err, "Failed to close abandoned link");
        }
    }

    /// One pump per connection: decodes inbound frames, fans them out,
    /// persists them, and turns a link closure into a loss transition
    fn spawn_pump(
        &self,
        device: Device,
        mut events: mpsc::Receiver<LinkEvent>,
        attempt: u64,
    ) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let store = Arc::clone(&self.store);
        let message_listeners = Arc::clone(&self.message_listeners);
        let connection_listeners = Arc::clone(&self.connection_listeners);

        tokio::spawn(async move {
            let reason = loop {
                match events.recv().await {
                    Some(LinkEvent::Data(bytes)) => {
                        let message = WireCodec::decode(&bytes);
                        debug!(device = %device, "Message received");
                        // Listeners see the message before it is persisted
                        message_listeners.notify(&message);
                        if let Err(err) = store.append_message(&device.id, &message).await {
                            warn!(device = %device, %err, "Failed to persist inbound message");
                        }
                    }
                    Some(LinkEvent::Closed { reason }) => break reason,
                    // Sender dropped without a close event; same outcome
                    None => break String::from("event stream ended"),
                }
            };

            let mut guard = state.lock().await;
            let ours = matches!(
                &*guard,
                LinkState::Connected(active) if active.attempt == attempt
            );
            if !ours {
                debug!(device = %device, "Stale link closure ignored");
                return;
            }
            warn!(device = %device, %reason, "Connection lost");
            if let LinkState::Connected(active) =
                std::mem::replace(&mut *guard, LinkState::Disconnected)
            {
                if let Err(err) = active.link.close().await {
                    debug!(%err, "Link already closed");
                }
            }
            if let Err(err) = store.set_active(&device.id, false).await {
                warn!(device = %device, %err, "Failed to mark session inactive");
            }
            drop(guard);
            connection_listeners.notify(&ConnectionUpdate::Disconnected {
                cause: DisconnectCause::Lost,
            });
        })
    }
}
