//! Well-known key layout of the shared store.
//!
//! Every collection lives under one top-level key holding a JSON document.
//! Each [`Channel`] groups the data keys of one collection with the pulse key
//! whose value is rewritten (epoch millis) on every mutation.
//!
//! ```text
//! hk_tasks_v1              { tasks: [...] }        canonical task store
//! hk_tasks_pulse_v1        "1718000000000"
//! hms_tasks_local_v1       { tasks: [...] }        legacy mirror
//! tasks-updated            "1718000000000"
//! hk_staff                 [ {...} | "name" ]
//! hk_staff_pulse_v1        "1718000000000"
//! hms_staff_local_v1       [ {...} ]                manager-side roster
//! hms_rooms_local_v1       { rooms: [...] }
//! hms_rooms_occupancy_v1   { occupied, vacant, needs }
//! rooms-updated            "1718000000000"
//! hms_resources_local_v1   { resources: [...] }
//! resources-updated        "1718000000000"
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const TASKS: &str = "hk_tasks_v1";
pub const TASKS_PULSE: &str = "hk_tasks_pulse_v1";
pub const LEGACY_TASKS: &str = "hms_tasks_local_v1";
pub const LEGACY_TASKS_PULSE: &str = "tasks-updated";

pub const STAFF: &str = "hk_staff";
pub const STAFF_PULSE: &str = "hk_staff_pulse_v1";
pub const STAFF_BARS_HIDDEN: &str = "hk_staff_bars_hidden";
pub const LEGACY_STAFF: &str = "hms_staff_local_v1";

pub const ROOMS: &str = "hms_rooms_local_v1";
pub const ROOMS_AGGREGATE: &str = "hms_rooms_occupancy_v1";
pub const ROOMS_PULSE: &str = "rooms-updated";

pub const RESOURCES: &str = "hms_resources_local_v1";
pub const RESOURCES_PULSE: &str = "resources-updated";

pub const SETTINGS_PROFILE: &str = "hk:profile";
pub const SETTINGS_PREFS: &str = "hk:prefs";
pub const SETTINGS_WORK: &str = "hk:workPrefs";
pub const SETTINGS_BROADCAST: &str = "hk:broadcast";

/// A notification channel: one collection's data keys plus its pulse key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Tasks,
    LegacyTasks,
    Staff,
    Rooms,
    Resources,
    Settings,
}

impl Channel {
    pub const ALL: [Channel; 6] = [
        Channel::Tasks,
        Channel::LegacyTasks,
        Channel::Staff,
        Channel::Rooms,
        Channel::Resources,
        Channel::Settings,
    ];

    /// Key rewritten with a fresh timestamp on every change. Also the name of
    /// the in-context event fired for this channel.
    pub fn pulse_key(self) -> &'static str {
        match self {
            Channel::Tasks => TASKS_PULSE,
            Channel::LegacyTasks => LEGACY_TASKS_PULSE,
            Channel::Staff => STAFF_PULSE,
            Channel::Rooms => ROOMS_PULSE,
            Channel::Resources => RESOURCES_PULSE,
            Channel::Settings => SETTINGS_BROADCAST,
        }
    }

    /// Keys holding the channel's data.
    pub fn data_keys(self) -> &'static [&'static str] {
        match self {
            Channel::Tasks => &[TASKS],
            Channel::LegacyTasks => &[LEGACY_TASKS],
            Channel::Staff => &[STAFF, STAFF_BARS_HIDDEN, LEGACY_STAFF],
            Channel::Rooms => &[ROOMS, ROOMS_AGGREGATE],
            Channel::Resources => &[RESOURCES],
            Channel::Settings => &[SETTINGS_PROFILE, SETTINGS_PREFS, SETTINGS_WORK],
        }
    }

    /// Whether a storage change on `key` concerns this channel.
    pub fn watches(self, key: &str) -> bool {
        self.pulse_key() == key || self.data_keys().contains(&key)
    }

    /// Channels concerned by a change to `key`.
    pub fn for_key(key: &str) -> Vec<Channel> {
        Channel::ALL
            .into_iter()
            .filter(|channel| channel.watches(key))
            .collect()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Tasks => "tasks",
            Channel::LegacyTasks => "legacy_tasks",
            Channel::Staff => "staff",
            Channel::Rooms => "rooms",
            Channel::Resources => "resources",
            Channel::Settings => "settings",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Channel::ALL
            .into_iter()
            .find(|channel| channel.as_str() == normalized)
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "unknown channel '{s}' (expected tasks|legacy_tasks|staff|rooms|resources|settings)"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulse_and_data_keys_map_back_to_channel() {
        assert_eq!(Channel::for_key(TASKS_PULSE), vec![Channel::Tasks]);
        assert_eq!(Channel::for_key(LEGACY_TASKS), vec![Channel::LegacyTasks]);
        assert_eq!(Channel::for_key(ROOMS_AGGREGATE), vec![Channel::Rooms]);
        assert_eq!(Channel::for_key(LEGACY_STAFF), vec![Channel::Staff]);
        assert!(Channel::for_key("unrelated").is_empty());
    }

    #[test]
    fn channel_names_parse() {
        assert_eq!("legacy-tasks".parse::<Channel>().unwrap(), Channel::LegacyTasks);
        assert_eq!(" Rooms ".parse::<Channel>().unwrap(), Channel::Rooms);
        assert!("nope".parse::<Channel>().is_err());
    }
}
