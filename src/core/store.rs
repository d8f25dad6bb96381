//! Durable key/value state that survives restarts.
//!
//! Only the counters and timestamps needed to resume a session, plus user
//! preferences, are stored. The file backend is a flat JSON object.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config;
use crate::constants;
use crate::error::{Error, Result};

/// Every key the store knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StoreKey {
    ConnectionStartTime,
    DataUploaded,
    DataDownloaded,
    LastNotificationTime,
    LastLongConnectionReminder,
    LastDataWarning,
    IconTheme,
    DisconnectSound,
    NotificationsEnabled,
    AutoStart,
    CustomConnectedIcon,
    CustomConnectingIcon,
    CustomDisconnectedIcon,
}

impl StoreKey {
    pub const ALL: [StoreKey; 13] = [
        Self::ConnectionStartTime,
        Self::DataUploaded,
        Self::DataDownloaded,
        Self::LastNotificationTime,
        Self::LastLongConnectionReminder,
        Self::LastDataWarning,
        Self::IconTheme,
        Self::DisconnectSound,
        Self::NotificationsEnabled,
        Self::AutoStart,
        Self::CustomConnectedIcon,
        Self::CustomConnectingIcon,
        Self::CustomDisconnectedIcon,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionStartTime => "connectionStartTime",
            Self::DataUploaded => "dataUploaded",
            Self::DataDownloaded => "dataDownloaded",
            Self::LastNotificationTime => "lastNotificationTime",
            Self::LastLongConnectionReminder => "lastLongConnectionReminder",
            Self::LastDataWarning => "lastDataWarning",
            Self::IconTheme => "iconTheme",
            Self::DisconnectSound => "disconnectSound",
            Self::NotificationsEnabled => "notificationsEnabled",
            Self::AutoStart => "autoStart",
            Self::CustomConnectedIcon => "customConnectedIcon",
            Self::CustomConnectingIcon => "customConnectingIcon",
            Self::CustomDisconnectedIcon => "customDisconnectedIcon",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl std::fmt::Display for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored value. Serialized untagged so the file stays readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoreValue {
    Bool(bool),
    Integer(u64),
    Timestamp(DateTime<Utc>),
    Text(String),
}

impl StoreValue {
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Key/value persistence.
pub trait PersistenceStore {
    fn get(&self, key: StoreKey) -> Option<StoreValue>;

    /// # Errors
    ///
    /// Fails if the value could not be made durable. The in-memory view is
    /// updated regardless and the write is retried by [`Self::flush`].
    fn set(&mut self, key: StoreKey, value: StoreValue) -> Result<()>;

    /// # Errors
    ///
    /// Same as [`Self::set`].
    fn remove(&mut self, key: StoreKey) -> Result<()>;

    /// Retries any write that failed earlier.
    ///
    /// # Errors
    ///
    /// Fails if pending changes still cannot be written.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// JSON object on disk, fully rewritten on every change.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, StoreValue>,
    dirty: bool,
}

impl JsonFileStore {
    /// Opens the store at `path`. An unreadable or corrupt file is logged and
    /// treated as empty; keys this version does not know are dropped.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut values: BTreeMap<String, StoreValue> = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                log::warn!("Ignoring corrupt state file {}: {e}", path.display());
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                log::warn!("Cannot read state file {}: {e}", path.display());
                BTreeMap::new()
            }
        };
        values.retain(|name, _| {
            let known = StoreKey::from_name(name).is_some();
            if !known {
                log::debug!("Dropping unknown state key {name}");
            }
            known
        });
        Self {
            path,
            values,
            dirty: false,
        }
    }

    /// Opens `<config dir>/vpnwatch/state.json`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoConfigDir`] if the platform has no config directory.
    pub fn open_default() -> Result<Self> {
        Ok(Self::open(default_state_path()?))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&mut self) -> Result<()> {
        self.dirty = true;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let text = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, text).map_err(|e| Error::io(&self.path, e))?;
        self.dirty = false;
        Ok(())
    }
}

impl PersistenceStore for JsonFileStore {
    fn get(&self, key: StoreKey) -> Option<StoreValue> {
        self.values.get(key.as_str()).cloned()
    }

    fn set(&mut self, key: StoreKey, value: StoreValue) -> Result<()> {
        self.values.insert(key.as_str().to_string(), value);
        self.write()
    }

    fn remove(&mut self, key: StoreKey) -> Result<()> {
        if self.values.remove(key.as_str()).is_some() || self.dirty {
            self.write()
        } else {
            Ok(())
        }
    }

    fn flush(&mut self) -> Result<()> {
        if self.dirty {
            self.write()
        } else {
            Ok(())
        }
    }
}

/// Location of the state file.
///
/// # Errors
///
/// Returns [`Error::NoConfigDir`] if the platform has no config directory.
pub fn default_state_path() -> Result<PathBuf> {
    Ok(config::app_config_dir()?.join(constants::STATE_FILE_NAME))
}

/// User-chosen icons that override the theme.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomIcons {
    pub connected: Option<String>,
    pub connecting: Option<String>,
    pub disconnected: Option<String>,
}

impl CustomIcons {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connected.is_none() && self.connecting.is_none() && self.disconnected.is_none()
    }
}

/// Presentation preferences. Read by the runtime, never by the decision logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    pub icon_theme: String,
    pub disconnect_sound: String,
    pub notifications_enabled: bool,
    pub auto_start: bool,
    pub custom_icons: CustomIcons,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            icon_theme: constants::DEFAULT_ICON_THEME.to_string(),
            disconnect_sound: constants::DEFAULT_DISCONNECT_SOUND.to_string(),
            notifications_enabled: true,
            auto_start: false,
            custom_icons: CustomIcons::default(),
        }
    }
}

impl Preferences {
    /// Reads preferences, using defaults for missing or mistyped entries.
    #[must_use]
    pub fn load(store: &dyn PersistenceStore) -> Self {
        let defaults = Self::default();
        let text = |key| {
            store
                .get(key)
                .and_then(|v| v.as_text().map(str::to_string))
                .filter(|s| !s.is_empty())
        };
        let flag = |key| store.get(key).and_then(|v| v.as_bool());

        Self {
            icon_theme: text(StoreKey::IconTheme).unwrap_or(defaults.icon_theme),
            disconnect_sound: text(StoreKey::DisconnectSound).unwrap_or(defaults.disconnect_sound),
            notifications_enabled: flag(StoreKey::NotificationsEnabled)
                .unwrap_or(defaults.notifications_enabled),
            auto_start: flag(StoreKey::AutoStart).unwrap_or(defaults.auto_start),
            custom_icons: CustomIcons {
                connected: text(StoreKey::CustomConnectedIcon),
                connecting: text(StoreKey::CustomConnectingIcon),
                disconnected: text(StoreKey::CustomDisconnectedIcon),
            },
        }
    }

    /// True unless the disconnect sound is switched off.
    #[must_use]
    pub fn sound_enabled(&self) -> bool {
        !self.disconnect_sound.eq_ignore_ascii_case(constants::SOUND_NONE)
    }
}
