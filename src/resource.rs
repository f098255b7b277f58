//! Supply requests (`hms_resources_local_v1`)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

use crate::bus::ChangeBus;
use crate::error::{Error, Result};
use crate::keys::{self, Channel};
use crate::normalize::{self, lenient_count, lenient_text};
use crate::storage::KeyedStore;
use crate::task::{now_timestamp, TaskId};

pub type ResourceId = TaskId;

pub const DEFAULT_DEPT: &str = "Floor Cleaning";
pub const DEFAULT_UNIT: &str = "pcs";

/// Request lifecycle: `Requested -> Approved -> Issued`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum ResourceStatus {
    #[default]
    Requested,
    Approved,
    Issued,
}

impl ResourceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceStatus::Requested => "Requested",
            ResourceStatus::Approved => "Approved",
            ResourceStatus::Issued => "Issued",
        }
    }

    /// Next state; `Issued` stays `Issued`.
    pub fn next(self) -> Self {
        match self {
            ResourceStatus::Requested => ResourceStatus::Approved,
            ResourceStatus::Approved | ResourceStatus::Issued => ResourceStatus::Issued,
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "requested" => Ok(ResourceStatus::Requested),
            "approved" => Ok(ResourceStatus::Approved),
            "issued" => Ok(ResourceStatus::Issued),
            _ => Err(Error::InvalidArgument(format!(
                "invalid resource status '{s}' (expected Requested, Approved or Issued)"
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for ResourceStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let label = lenient_text(deserializer)?;
        Ok(label
            .and_then(|label| label.parse().ok())
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: ResourceId,
    #[serde(default, deserialize_with = "lenient_string")]
    pub item: String,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub dept: Option<String>,
    #[serde(default = "default_quantity", deserialize_with = "lenient_quantity")]
    pub quantity: u32,
    #[serde(default = "default_unit", deserialize_with = "lenient_unit")]
    pub unit: String,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub needed_on: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: ResourceStatus,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub created_on: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_quantity() -> u32 {
    1
}

fn default_unit() -> String {
    DEFAULT_UNIT.to_string()
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(lenient_text(deserializer)?.unwrap_or_default())
}

fn lenient_unit<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(lenient_text(deserializer)?.unwrap_or_else(default_unit))
}

fn lenient_quantity<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u32, D::Error> {
    let quantity = lenient_count(deserializer)?;
    Ok(if quantity == 0 { default_quantity() } else { quantity })
}

impl Resource {
    /// Canonical department (`dept`, then `type`, then `category`),
    /// defaulting to Floor Cleaning.
    pub fn department(&self) -> String {
        let label = |field: &str| self.extra.get(field).and_then(Value::as_str);
        let dept = normalize::dept_of(self.dept.as_deref(), label("type"), label("category"));
        if dept.is_empty() {
            DEFAULT_DEPT.to_string()
        } else {
            dept
        }
    }
}

/// Input for [`ResourceStore::add`].
#[derive(Debug, Clone, Default)]
pub struct ResourceDraft {
    pub item: String,
    pub assignee: Option<String>,
    pub dept: Option<String>,
    pub quantity: Option<u32>,
    pub unit: Option<String>,
    pub needed_on: Option<String>,
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct ResourceStore {
    store: KeyedStore,
    bus: ChangeBus,
}

impl ResourceStore {
    pub fn new(store: KeyedStore, bus: ChangeBus) -> Self {
        Self { store, bus }
    }

    pub fn read_all(&self) -> Vec<Resource> {
        self.store
            .get_value(keys::RESOURCES)
            .map(|value| normalize::collection_from_value(value, "resources"))
            .unwrap_or_default()
    }

    pub fn write_all(&self, resources: &[Resource]) -> bool {
        let persisted = self
            .store
            .set(keys::RESOURCES, &json!({ "resources": resources }));
        self.bus.pulse(Channel::Resources);
        persisted
    }

    pub fn add(&self, draft: ResourceDraft) -> Result<Resource> {
        let item = draft.item.trim();
        if item.is_empty() {
            return Err(Error::Validation("Item name is required".to_string()));
        }

        let clean = |value: Option<String>| {
            value
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
        };

        let mut resources = self.read_all();
        let id = resources
            .iter()
            .filter_map(|resource| resource.id.as_number())
            .max()
            .unwrap_or(0)
            .checked_add(1)
            .map(TaskId::Num)
            .unwrap_or_else(TaskId::opaque);

        let resource = Resource {
            id,
            item: item.to_string(),
            assignee: clean(draft.assignee),
            dept: Some(
                clean(draft.dept)
                    .map(|dept| normalize::normalize_dept(&dept))
                    .unwrap_or_else(|| DEFAULT_DEPT.to_string()),
            ),
            quantity: draft.quantity.filter(|q| *q > 0).unwrap_or_else(default_quantity),
            unit: clean(draft.unit).unwrap_or_else(default_unit),
            needed_on: clean(draft.needed_on),
            notes: clean(draft.notes),
            status: ResourceStatus::Requested,
            created_on: Some(now_timestamp()),
            extra: Map::new(),
        };

        resources.push(resource.clone());
        self.write_all(&resources);
        Ok(resource)
    }

    /// Move a request one step forward. `None` when the id is unknown;
    /// advancing an issued request returns `Issued` without writing.
    pub fn advance(&self, id: &ResourceId) -> Option<ResourceStatus> {
        let mut resources = self.read_all();
        let resource = resources.iter_mut().find(|resource| &resource.id == id)?;
        if resource.status == ResourceStatus::Issued {
            return Some(ResourceStatus::Issued);
        }
        resource.status = resource.status.next();
        let status = resource.status;
        self.write_all(&resources);
        Some(status)
    }

    pub fn remove(&self, id: &ResourceId) -> bool {
        let mut resources = self.read_all();
        let before = resources.len();
        resources.retain(|resource| &resource.id != id);
        if resources.len() == before {
            return false;
        }
        self.write_all(&resources);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryArea;

    fn resources() -> (KeyedStore, ResourceStore) {
        let store = KeyedStore::new(MemoryArea::new().context());
        let bus = ChangeBus::new(store.clone());
        (store.clone(), ResourceStore::new(store, bus))
    }

    #[test]
    fn add_applies_defaults() {
        let (_, resources) = resources();
        let first = resources
            .add(ResourceDraft {
                item: "Mop heads".into(),
                ..ResourceDraft::default()
            })
            .unwrap();
        assert_eq!(first.id, TaskId::Num(1));
        assert_eq!(first.dept.as_deref(), Some(DEFAULT_DEPT));
        assert_eq!(first.quantity, 1);
        assert_eq!(first.unit, "pcs");
        assert_eq!(first.status, ResourceStatus::Requested);

        let second = resources
            .add(ResourceDraft {
                item: "Detergent".into(),
                dept: Some("LAUNDRY".into()),
                quantity: Some(4),
                unit: Some("kg".into()),
                ..ResourceDraft::default()
            })
            .unwrap();
        assert_eq!(second.id, TaskId::Num(2));
        assert_eq!(second.department(), "Laundry");

        assert!(resources.add(ResourceDraft::default()).is_err());
    }

    #[test]
    fn add_after_largest_numeric_id_gets_opaque_id() {
        let (store, resources) = resources();
        store.set(keys::RESOURCES, &json!({"resources": [{"id": u64::MAX, "item": "Bulbs"}]}));
        let added = resources
            .add(ResourceDraft {
                item: "Fuses".into(),
                ..ResourceDraft::default()
            })
            .unwrap();
        assert_eq!(added.id.as_number(), None);
        assert_eq!(resources.read_all().len(), 2);
    }

    #[test]
    fn advance_is_forward_only() {
        let (store, resources) = resources();
        let added = resources
            .add(ResourceDraft {
                item: "Gloves".into(),
                ..ResourceDraft::default()
            })
            .unwrap();

        assert_eq!(resources.advance(&added.id), Some(ResourceStatus::Approved));
        assert_eq!(resources.advance(&added.id), Some(ResourceStatus::Issued));

        let pulse = store.get_text(keys::RESOURCES_PULSE);
        assert_eq!(resources.advance(&added.id), Some(ResourceStatus::Issued));
        assert_eq!(store.get_text(keys::RESOURCES_PULSE), pulse);

        assert_eq!(resources.advance(&TaskId::Num(42)), None);
    }

    #[test]
    fn stored_records_are_read_leniently() {
        let (store, resources) = resources();
        store.set(
            keys::RESOURCES,
            &json!({"resources": [{"id": "3", "item": "Bulbs", "quantity": "6", "status": "approved", "vendor": "Acme"}]}),
        );
        let list = resources.read_all();
        assert_eq!(list[0].quantity, 6);
        assert_eq!(list[0].status, ResourceStatus::Approved);
        assert_eq!(list[0].department(), DEFAULT_DEPT);
        assert_eq!(list[0].extra["vendor"], json!("Acme"));

        assert!(resources.remove(&TaskId::Num(3)));
        assert!(resources.read_all().is_empty());
    }

    #[test]
    fn department_falls_back_to_type_then_category() {
        let (store, resources) = resources();
        store.set(
            keys::RESOURCES,
            &json!([
                {"id": 1, "item": "Hangers", "type": "laundry"},
                {"id": 2, "item": "Shears", "category": "gardener"},
                {"id": 3, "item": "Wax", "dept": "public area", "type": "laundry"}
            ]),
        );
        let depts: Vec<String> = resources.read_all().iter().map(Resource::department).collect();
        assert_eq!(depts, ["Laundry", "Gardener", "Public Area"]);
    }
}
