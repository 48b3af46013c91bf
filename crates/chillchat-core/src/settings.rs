//! App settings and user profile records
//!
//! Both records decode with per-field defaulting, so partially written or
//! older stored values merge over the defaults instead of failing to load.

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Theme
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

// ----------------------------------------------------------------------------
// App Settings
// ----------------------------------------------------------------------------

/// Singleton settings record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    /// Reconnect to the last device automatically. Persisted and settable,
    /// not acted on yet.
    pub auto_connect: bool,
    pub theme: Theme,
    pub sound_enabled: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            auto_connect: false,
            theme: Theme::Light,
            sound_enabled: true,
        }
    }
}

/// Partial settings update; unset fields keep their current value
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub auto_connect: Option<bool>,
    pub theme: Option<Theme>,
    pub sound_enabled: Option<bool>,
}

impl SettingsPatch {
    /// Merge this patch over current settings
    pub fn apply(&self, mut current: AppSettings) -> AppSettings {
        if let Some(auto_connect) = self.auto_connect {
            current.auto_connect = auto_connect;
        }
        if let Some(theme) = self.theme {
            current.theme = theme;
        }
        if let Some(sound_enabled) = self.sound_enabled {
            current.sound_enabled = sound_enabled;
        }
        current
    }
}

// ----------------------------------------------------------------------------
// Profile
// ----------------------------------------------------------------------------

/// Local user profile
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    pub nickname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub is_profile_setup: bool,
}

/// Partial profile update; unset fields keep their current value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub is_profile_setup: Option<bool>,
}

impl ProfilePatch {
    /// Merge this patch over the current profile
    pub fn apply(&self, mut current: Profile) -> Profile {
        if let Some(ref nickname) = self.nickname {
            current.nickname = nickname.clone();
        }
        if let Some(ref avatar) = self.avatar {
            current.avatar = Some(avatar.clone());
        }
        if let Some(is_profile_setup) = self.is_profile_setup {
            current.is_profile_setup = is_profile_setup;
        }
        current
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
