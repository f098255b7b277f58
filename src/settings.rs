//! Settings kept under `hk:*` keys
//!
//! Saving a section or resetting data writes a broadcast record
//! `{ type, payload, ts }` to `hk:broadcast`, which doubles as the pulse of
//! the settings channel.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use crate::bus::ChangeBus;
use crate::error::{Error, Result};
use crate::keys::{self, Channel};
use crate::storage::KeyedStore;

pub const SETTINGS_CHANGED: &str = "hk:settings-changed";
pub const SYSTEM_RESET: &str = "hk:system-reset";

const TASK_PREFIXES: &[&str] = &["hk:tasks", "hk:task:", "hk:rooms", "hk:room:", "hk:history", "hk:events"];
const STAFF_PREFIXES: &[&str] = &["hk:staff", "hk:roster", "hk:team:"];
const ALL_PREFIXES: &[&str] = &["hk:"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Profile {
    pub hotel_name: String,
    pub admin_name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl<'de> Deserialize<'de> for Theme {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value.as_ref().and_then(Value::as_str) {
            Some("light") => Theme::Light,
            _ => Theme::Dark,
        })
    }
}

impl FromStr for Theme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            _ => Err(Error::InvalidArgument(format!(
                "invalid theme '{s}' (expected dark or light)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Prefs {
    pub theme: Theme,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkPrefs {
    pub auto_assign: bool,
    pub auto_remind: bool,
    pub staff_complete: bool,
}

impl Default for WorkPrefs {
    fn default() -> Self {
        Self {
            auto_assign: false,
            auto_remind: true,
            staff_complete: true,
        }
    }
}

/// What a reset clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetScope {
    /// Tasks, rooms and their history
    Tasks,
    Staff,
    All,
}

impl ResetScope {
    pub fn as_str(self) -> &'static str {
        match self {
            ResetScope::Tasks => "tasks",
            ResetScope::Staff => "staff",
            ResetScope::All => "all",
        }
    }

    fn prefixes(self) -> &'static [&'static str] {
        match self {
            ResetScope::Tasks => TASK_PREFIXES,
            ResetScope::Staff => STAFF_PREFIXES,
            ResetScope::All => ALL_PREFIXES,
        }
    }

    /// Channels whose data keys are dropped by this scope.
    fn channels(self) -> &'static [Channel] {
        match self {
            ResetScope::Tasks => &[Channel::Tasks, Channel::LegacyTasks, Channel::Rooms],
            ResetScope::Staff => &[Channel::Staff],
            ResetScope::All => &[
                Channel::Tasks,
                Channel::LegacyTasks,
                Channel::Staff,
                Channel::Rooms,
                Channel::Resources,
            ],
        }
    }
}

impl fmt::Display for ResetScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResetScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tasks" => Ok(ResetScope::Tasks),
            "staff" => Ok(ResetScope::Staff),
            "all" => Ok(ResetScope::All),
            _ => Err(Error::InvalidArgument(format!(
                "invalid reset scope '{s}' (expected tasks, staff or all)"
            ))),
        }
    }
}

/// Stored under `hk:broadcast`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Broadcast {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
    pub ts: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetReport {
    pub scope: ResetScope,
    pub removed: Vec<String>,
}

#[derive(Clone)]
pub struct Settings {
    store: KeyedStore,
    bus: ChangeBus,
}

impl Settings {
    pub fn new(store: KeyedStore, bus: ChangeBus) -> Self {
        Self { store, bus }
    }

    pub fn profile(&self) -> Profile {
        self.store.get(keys::SETTINGS_PROFILE, Profile::default())
    }

    pub fn save_profile(&self, profile: &Profile) -> bool {
        self.save_section(keys::SETTINGS_PROFILE, "profile", profile)
    }

    pub fn prefs(&self) -> Prefs {
        self.store.get(keys::SETTINGS_PREFS, Prefs::default())
    }

    pub fn save_prefs(&self, prefs: &Prefs) -> bool {
        self.save_section(keys::SETTINGS_PREFS, "prefs", prefs)
    }

    pub fn work_prefs(&self) -> WorkPrefs {
        self.store.get(keys::SETTINGS_WORK, WorkPrefs::default())
    }

    pub fn save_work_prefs(&self, prefs: &WorkPrefs) -> bool {
        self.save_section(keys::SETTINGS_WORK, "work", prefs)
    }

    fn save_section<T: Serialize>(&self, key: &str, section: &str, data: &T) -> bool {
        let persisted = self.store.set(key, data);
        self.broadcast(
            SETTINGS_CHANGED,
            json!({ "section": section, "data": data }),
        );
        persisted
    }

    /// Write a broadcast record and notify same-context subscribers.
    pub fn broadcast(&self, kind: &str, payload: Value) -> i64 {
        self.bus.pulse_with(Channel::Settings, |ts| {
            json!({ "type": kind, "payload": payload, "ts": ts }).to_string()
        })
    }

    pub fn last_broadcast(&self) -> Option<Broadcast> {
        self.store.get(keys::SETTINGS_BROADCAST, None)
    }

    /// Remove every key in scope, then announce the reset and pulse the
    /// affected collections so open views re-read.
    pub fn reset(&self, scope: ResetScope) -> ResetReport {
        let channels = scope.channels();
        let mut removed: Vec<String> = self
            .store
            .keys()
            .into_iter()
            .filter(|key| {
                scope.prefixes().iter().any(|prefix| key.starts_with(prefix))
                    || channels.iter().any(|channel| channel.watches(key))
            })
            .filter(|key| self.store.remove(key))
            .collect();
        removed.sort();

        self.broadcast(SYSTEM_RESET, json!({ "scope": scope.as_str() }));
        for channel in channels {
            self.bus.pulse(*channel);
        }
        tracing::debug!(scope = %scope, removed = removed.len(), "store reset");

        ResetReport { scope, removed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryArea;

    fn settings() -> (KeyedStore, Settings) {
        let store = KeyedStore::new(MemoryArea::new().context());
        let bus = ChangeBus::new(store.clone());
        (store.clone(), Settings::new(store, bus))
    }

    #[test]
    fn defaults_apply_to_missing_and_partial_records() {
        let (store, settings) = settings();
        assert_eq!(settings.work_prefs(), WorkPrefs::default());
        assert_eq!(settings.prefs().theme, Theme::Dark);

        store.set(keys::SETTINGS_WORK, &json!({"autoAssign": true}));
        let work = settings.work_prefs();
        assert!(work.auto_assign);
        assert!(work.auto_remind);

        store.set(keys::SETTINGS_PREFS, &json!({"theme": "neon"}));
        assert_eq!(settings.prefs().theme, Theme::Dark);
    }

    #[test]
    fn saving_broadcasts_section() {
        let (_, settings) = settings();
        let profile = Profile {
            hotel_name: "Sea View".into(),
            admin_name: "Dana".into(),
        };
        assert!(settings.save_profile(&profile));
        assert_eq!(settings.profile(), profile);

        let broadcast = settings.last_broadcast().unwrap();
        assert_eq!(broadcast.kind, SETTINGS_CHANGED);
        assert_eq!(broadcast.payload["section"], json!("profile"));
        assert_eq!(broadcast.payload["data"]["hotelName"], json!("Sea View"));
    }

    #[test]
    fn staff_reset_keeps_tasks() {
        let (store, settings) = settings();
        store.set(keys::STAFF, &json!(["Ann"]));
        store.set("hk:staff:notes", &json!({}));
        store.set(keys::TASKS, &json!({"tasks": []}));

        let report = settings.reset(ResetScope::Staff);
        assert!(report.removed.contains(&keys::STAFF.to_string()));
        assert!(report.removed.contains(&"hk:staff:notes".to_string()));
        assert_eq!(store.get_text(keys::STAFF), None);
        assert!(store.get_text(keys::TASKS).is_some());

        let broadcast = settings.last_broadcast().unwrap();
        assert_eq!(broadcast.kind, SYSTEM_RESET);
        assert_eq!(broadcast.payload, json!({"scope": "staff"}));
    }

    #[test]
    fn full_reset_clears_settings_too() {
        let (store, settings) = settings();
        settings.save_prefs(&Prefs { theme: Theme::Light });
        store.set(keys::RESOURCES, &json!({"resources": []}));
        store.set("unrelated", &json!(1));

        settings.reset(ResetScope::All);
        assert_eq!(settings.prefs().theme, Theme::Dark);
        assert_eq!(store.get_text(keys::RESOURCES), None);
        assert!(store.get_text("unrelated").is_some());
    }
}
