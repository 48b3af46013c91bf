//! Persistent session store
//!
//! CRUD over the session list plus the settings and profile records, all
//! JSON-encoded under fixed keys in the injected key-value store. Every
//! mutation is a whole-collection read-modify-write; one lock serializes
//! them so a message append racing an active-status update cannot lose
//! either write.
//!
//! Failure policy: reads degrade (empty list, default records) so the UI
//! always has something to render; mutations propagate backend errors
//! instead of rewriting the collection from an assumed-empty state. An
//! unreadable stored blob is the one exception: it can never fix itself, so
//! mutations log it and start a fresh collection.

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::warn;

use crate::errors::StorageError;
use crate::message::ChatMessage;
use crate::session::ChatSession;
use crate::settings::{AppSettings, Profile, ProfilePatch, SettingsPatch};
use crate::storage::KeyValueStore;
use crate::types::{Device, DeviceId};

// Storage keys carried over from earlier builds so on-device data stays readable
const CHAT_SESSIONS_KEY: &str = "@chillchat_sessions";
const APP_SETTINGS_KEY: &str = "@chillchat_settings";
const PROFILE_KEY: &str = "@chillchat_profile";

// ----------------------------------------------------------------------------
// Session Store
// ----------------------------------------------------------------------------

/// Store for chat sessions, app settings and the user profile
pub struct SessionStore<S> {
    backend: S,
    write_lock: Mutex<()>,
}

impl<S: KeyValueStore> SessionStore<S> {
    pub fn new(backend: S) -> Self {
        Self {
            backend,
            write_lock: Mutex::new(()),
        }
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// Upsert a session by device id
    pub async fn save_session(&self, session: &ChatSession) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut sessions = self.sessions_for_update().await?;
        match sessions.iter_mut().find(|s| s.device_id == session.device_id) {
            Some(existing) => *existing = session.clone(),
            None => sessions.push(session.clone()),
        }
        self.write_sessions(&sessions).await
    }

    /// Bind a session to a freshly connected device: reactivate the existing
    /// session or create a new one, and return the bound record
    pub async fn create_or_update_session(
        &self,
        device: &Device,
    ) -> Result<ChatSession, StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut sessions = self.sessions_for_update().await?;
        let session = match sessions.iter_mut().find(|s| s.device_id == device.id) {
            Some(existing) => {
                existing.is_active = true;
                existing.last_connected = Utc::now();
                existing.clone()
            }
            None => {
                let session = ChatSession::new(device);
                sessions.push(session.clone());
                session
            }
        };
        self.write_sessions(&sessions).await?;
        Ok(session)
    }

    /// All sessions in stored order; empty on read errors
    pub async fn list_sessions(&self) -> Vec<ChatSession> {
        let _guard = self.write_lock.lock().await;
        self.read_sessions_or_empty().await
    }

    /// Sessions sorted by `last_connected`, newest first
    pub async fn sessions_by_recency(&self) -> Vec<ChatSession> {
        let mut sessions = self.list_sessions().await;
        sessions.sort_by(|a, b| b.last_connected.cmp(&a.last_connected));
        sessions
    }

    /// One session by device id; None when absent or unreadable
    pub async fn get_session(&self, device_id: &DeviceId) -> Option<ChatSession> {
        let _guard = self.write_lock.lock().await;
        self.read_sessions_or_empty()
            .await
            .into_iter()
            .find(|s| &s.device_id == device_id)
    }

    /// Remove a session; removing an absent id is not an error
    pub async fn delete_session(&self, device_id: &DeviceId) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut sessions = self.sessions_for_update().await?;
        sessions.retain(|s| &s.device_id != device_id);
        self.write_sessions(&sessions).await
    }

    /// Remove the whole session collection
    pub async fn clear_all_sessions(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        self.backend.remove(CHAT_SESSIONS_KEY).await
    }

    /// Flip a session's active flag; activating also refreshes
    /// `last_connected`. Unknown ids are skipped silently, matching how the
    /// disconnect path tolerates a session the user deleted mid-connection.
    pub async fn set_active(
        &self,
        device_id: &DeviceId,
        is_active: bool,
    ) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut sessions = self.sessions_for_update().await?;
        if let Some(session) = sessions.iter_mut().find(|s| &s.device_id == device_id) {
            session.is_active = is_active;
            if is_active {
                session.last_connected = Utc::now();
            }
            self.write_sessions(&sessions).await?;
        }
        Ok(())
    }

    /// Append a message to a session and refresh `last_connected`
    pub async fn append_message(
        &self,
        device_id: &DeviceId,
        message: &ChatMessage,
    ) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut sessions = self.sessions_for_update().await?;
        let session = sessions
            .iter_mut()
            .find(|s| &s.device_id == device_id)
            .ok_or_else(|| StorageError::session_not_found(device_id.as_str()))?;
        session.messages.push(message.clone());
        session.last_connected = Utc::now();
        self.write_sessions(&sessions).await
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    /// Stored settings merged over defaults; plain defaults on read errors
    pub async fn get_settings(&self) -> AppSettings {
        let _guard = self.write_lock.lock().await;
        self.read_settings_or_default().await
    }

    /// Merge a partial update into the current settings and persist
    pub async fn update_settings(
        &self,
        patch: SettingsPatch,
    ) -> Result<AppSettings, StorageError> {
        let _guard = self.write_lock.lock().await;
        let current = match self.read_record::<AppSettings>(APP_SETTINGS_KEY, "settings").await {
            Ok(stored) => stored.unwrap_or_default(),
            Err(err @ StorageError::Decode { .. }) => {
                warn!(%err, "Stored settings are unreadable, starting from defaults");
                AppSettings::default()
            }
            Err(err) => return Err(err),
        };
        let merged = patch.apply(current);
        self.write_record(APP_SETTINGS_KEY, "settings", &merged)
            .await?;
        Ok(merged)
    }

    // ------------------------------------------------------------------
    // Profile
    // ------------------------------------------------------------------

    /// Stored profile merged over defaults; plain defaults on read errors
    pub async fn get_profile(&self) -> Profile {
        let _guard = self.write_lock.lock().await;
        match self.read_record::<Profile>(PROFILE_KEY, "profile").await {
            Ok(stored) => stored.unwrap_or_default(),
            Err(err) => {
                warn!(%err, "Failed to read profile, using defaults");
                Profile::default()
            }
        }
    }

    /// Merge a partial update into the current profile and persist
    pub async fn update_profile(&self, patch: ProfilePatch) -> Result<Profile, StorageError> {
        let _guard = self.write_lock.lock().await;
        let current = match self.read_record::<Profile>(PROFILE_KEY, "profile").await {
            Ok(stored) => stored.unwrap_or_default(),
            Err(err @ StorageError::Decode { .. }) => {
                warn!(%err, "Stored profile is unreadable, starting from defaults");
                Profile::default()
            }
            Err(err) => return Err(err),
        };
        let merged = patch.apply(current);
        self.write_record(PROFILE_KEY, "profile", &merged).await?;
        Ok(merged)
    }

    /// Remove the profile record
    pub async fn clear_profile(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        self.backend.remove(PROFILE_KEY).await
    }

    // ------------------------------------------------------------------
    // Reset
    // ------------------------------------------------------------------

    /// Remove sessions, settings and profile in one call
    pub async fn clear_all_data(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        self.backend.remove(CHAT_SESSIONS_KEY).await?;
        self.backend.remove(APP_SETTINGS_KEY).await?;
        self.backend.remove(PROFILE_KEY).await
    }

    // ------------------------------------------------------------------
    // Record helpers (callers hold the lock)
    // ------------------------------------------------------------------

    async fn read_sessions(&self) -> Result<Vec<ChatSession>, StorageError> {
        match self.backend.get(CHAT_SESSIONS_KEY).await? {
            Some(data) => {
                serde_json::from_str(&data).map_err(|e| StorageError::decode("sessions", e))
            }
            None => Ok(Vec::new()),
        }
    }

    /// Session list for a mutation: backend errors propagate, an unreadable
    /// blob is replaced with a fresh list
    async fn sessions_for_update(&self) -> Result<Vec<ChatSession>, StorageError> {
        match self.read_sessions().await {
            Ok(sessions) => Ok(sessions),
            Err(err @ StorageError::Decode { .. }) => {
                warn!(%err, "Stored session list is unreadable, starting a fresh list");
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }

    async fn read_sessions_or_empty(&self) -> Vec<ChatSession> {
        match self.read_sessions().await {
            Ok(sessions) => sessions,
            Err(err) => {
                warn!(%err, "Failed to read sessions, returning none");
                Vec::new()
            }
        }
    }

    async fn write_sessions(&self, sessions: &[ChatSession]) -> Result<(), StorageError> {
        let data =
            serde_json::to_string(sessions).map_err(|e| StorageError::encode("sessions", e))?;
        self.backend.set(CHAT_SESSIONS_KEY, &data).await
    }

    async fn read_settings_or_default(&self) -> AppSettings {
        match self.read_record::<AppSettings>(APP_SETTINGS_KEY, "settings").await {
            Ok(stored) => stored.unwrap_or_default(),
            Err(err) => {
                warn!(%err, "Failed to read settings, using defaults");
                AppSettings::default()
            }
        }
    }

    async fn read_record<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
        record: &'static str,
    ) -> Result<Option<T>, StorageError> {
        match self.backend.get(key).await? {
            Some(data) => serde_json::from_str(&data)
                .map(Some)
                .map_err(|e| StorageError::decode(record, e)),
            None => Ok(None),
        }
    }

    async fn write_record<T: serde::Serialize>(
        &self,
        key: &str,
        record: &'static str,
        value: &T,
    ) -> Result<(), StorageError> {
        let data = serde_json::to_string(value).map_err(|e| StorageError::encode(record, e))?;
        self.backend.set(key, &data).await
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
