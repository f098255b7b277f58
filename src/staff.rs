//! Staff roster
//!
//! The roster is stored under `hk_staff` as a bare array. Older writers stored
//! bare names (`["Bob Smith"]`) or wrapped the array as `{ staff: [...] }`;
//! [`RawStaffEntry`] absorbs both at the deserialization boundary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::bus::ChangeBus;
use crate::error::{Error, Result};
use crate::keys::{self, Channel};
use crate::normalize::{self, lenient_count, lenient_text};
use crate::storage::KeyedStore;
use crate::task::Task;

pub const DEFAULT_ROLE: &str = "Housekeeper";
pub const DEFAULT_DEPT: &str = "Room Cleaning";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum StaffStatus {
    #[default]
    Active,
    Inactive,
}

impl StaffStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StaffStatus::Active => "Active",
            StaffStatus::Inactive => "Inactive",
        }
    }
}

impl fmt::Display for StaffStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StaffStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(StaffStatus::Active),
            "inactive" => Ok(StaffStatus::Inactive),
            _ => Err(Error::InvalidArgument(format!(
                "invalid staff status '{s}' (expected Active or Inactive)"
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for StaffStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value
            .as_ref()
            .and_then(Value::as_str)
            .and_then(|text| text.parse().ok())
            .unwrap_or_default())
    }
}

/// A roster member in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Staff {
    pub id: String,
    pub name: String,
    pub role: String,
    #[serde(rename = "type")]
    pub dept: String,
    pub status: StaffStatus,
    pub assigned: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A roster entry as found in storage: a bare name or a (partial) record.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawStaffEntry {
    Name(String),
    Record(StaffRecord),
}

#[derive(Debug, Clone, Deserialize)]
pub struct StaffRecord {
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub role: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient_text")]
    pub dept: Option<String>,
    #[serde(default)]
    pub status: StaffStatus,
    #[serde(default, deserialize_with = "lenient_count")]
    pub assigned: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawStaffEntry {
    /// Canonical record, or `None` for entries without a name.
    pub fn into_staff(self) -> Option<Staff> {
        match self {
            RawStaffEntry::Name(name) => {
                let name = name.trim();
                (!name.is_empty()).then(|| Staff {
                    id: derived_staff_id(name),
                    name: name.to_string(),
                    role: DEFAULT_ROLE.to_string(),
                    dept: DEFAULT_DEPT.to_string(),
                    status: StaffStatus::Active,
                    assigned: 0,
                    extra: Map::new(),
                })
            }
            RawStaffEntry::Record(record) => {
                let name = record.name?;
                Some(Staff {
                    id: record.id.unwrap_or_else(|| derived_staff_id(&name)),
                    role: record.role.unwrap_or_else(|| DEFAULT_ROLE.to_string()),
                    dept: record.dept.unwrap_or_else(|| DEFAULT_DEPT.to_string()),
                    status: record.status,
                    assigned: record.assigned,
                    extra: record.extra,
                    name,
                })
            }
        }
    }
}

/// Stable id for entries stored without one, so repeated reads agree.
fn derived_staff_id(name: &str) -> String {
    let uuid = Uuid::new_v5(&Uuid::NAMESPACE_OID, name.to_lowercase().as_bytes());
    format!("s_{uuid}")
}

fn fresh_staff_id() -> String {
    format!("s_{}", Uuid::new_v4())
}

/// Stored base count plus open tasks addressed to this person.
pub fn live_assigned(staff: &Staff, tasks: &[Task]) -> u32 {
    let open = tasks
        .iter()
        .filter(|task| task.status.is_open() && task.is_assigned_to(&staff.name))
        .count();
    staff
        .assigned
        .saturating_add(u32::try_from(open).unwrap_or(u32::MAX))
}

/// A roster member with the computed live-assigned count.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffWorkload {
    #[serde(flatten)]
    pub staff: Staff,
    pub live_assigned: u32,
}

/// Input for [`StaffRoster::add`].
#[derive(Debug, Clone, Default)]
pub struct StaffDraft {
    pub name: String,
    pub role: Option<String>,
    pub dept: Option<String>,
    pub status: Option<StaffStatus>,
    pub assigned: u32,
}

#[derive(Clone)]
pub struct StaffRoster {
    store: KeyedStore,
    bus: ChangeBus,
}

impl StaffRoster {
    pub fn new(store: KeyedStore, bus: ChangeBus) -> Self {
        Self { store, bus }
    }

    pub fn read_all(&self) -> Vec<Staff> {
        self.store
            .get_value(keys::STAFF)
            .map(normalize::staff_from_value)
            .unwrap_or_default()
    }

    pub fn write_all(&self, staff: &[Staff]) -> bool {
        let persisted = self.store.set(keys::STAFF, staff);
        self.bus.pulse(Channel::Staff);
        persisted
    }

    /// Look up by id, or by name ignoring case.
    pub fn find(&self, id_or_name: &str) -> Option<Staff> {
        let needle = id_or_name.trim();
        let staff = self.read_all();
        staff
            .iter()
            .find(|member| member.id == needle)
            .or_else(|| {
                staff
                    .iter()
                    .find(|member| normalize::same_name(&member.name, needle))
            })
            .cloned()
    }

    pub fn add(&self, draft: StaffDraft) -> Result<Staff> {
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(Error::Validation("Staff name is required".to_string()));
        }

        let mut staff = self.read_all();
        if staff.iter().any(|member| normalize::same_name(&member.name, name)) {
            return Err(Error::Validation(format!(
                "Staff member '{name}' already exists"
            )));
        }

        let member = Staff {
            id: fresh_staff_id(),
            name: name.to_string(),
            role: draft
                .role
                .map(|role| role.trim().to_string())
                .filter(|role| !role.is_empty())
                .unwrap_or_else(|| DEFAULT_ROLE.to_string()),
            dept: draft
                .dept
                .map(|dept| normalize::normalize_dept(&dept))
                .filter(|dept| !dept.is_empty())
                .unwrap_or_else(|| DEFAULT_DEPT.to_string()),
            status: draft.status.unwrap_or_default(),
            assigned: draft.assigned,
            extra: Map::new(),
        };
        staff.push(member.clone());
        self.write_all(&staff);
        Ok(member)
    }

    /// Remove by id or name. Unknown members are a no-op.
    pub fn remove(&self, id_or_name: &str) -> bool {
        let Some(target) = self.find(id_or_name) else {
            return false;
        };
        let mut staff = self.read_all();
        staff.retain(|member| member.id != target.id);
        self.write_all(&staff);
        true
    }

    pub fn set_status(&self, id_or_name: &str, status: StaffStatus) -> bool {
        let Some(target) = self.find(id_or_name) else {
            return false;
        };
        if target.status == status {
            return true;
        }
        let mut staff = self.read_all();
        for member in staff.iter_mut().filter(|member| member.id == target.id) {
            member.status = status;
        }
        self.write_all(&staff);
        true
    }

    /// Every roster member with the live-assigned count against `tasks`.
    pub fn with_live_counts(&self, tasks: &[Task]) -> Vec<StaffWorkload> {
        self.read_all()
            .into_iter()
            .map(|staff| {
                let live_assigned = live_assigned(&staff, tasks);
                StaffWorkload {
                    staff,
                    live_assigned,
                }
            })
            .collect()
    }
}
