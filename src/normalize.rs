//! Shape-tolerant readers for stored collections
//!
//! Writers evolved independently, so the same collection shows up in several
//! forms:
//!
//! - a bare array: `[ {...}, {...} ]`
//! - a wrapped object: `{ "tasks": [ {...} ] }`
//! - absent or malformed data, read as an empty collection
//!
//! Staff rosters may also hold bare name strings instead of records. Every
//! reader here turns those shapes into the canonical types straight away.

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use crate::staff::{RawStaffEntry, Staff};
use crate::task::Task;

/// Fixed department lookup table (lower-case key, display label).
const DEPARTMENTS: &[(&str, &str)] = &[
    ("room cleaning", "Room Cleaning"),
    ("floor cleaning", "Floor Cleaning"),
    ("public area", "Public Area"),
    ("laundry", "Laundry"),
    ("food service", "Food Service"),
    ("maintenance", "Maintenance"),
    ("gardener", "Gardener"),
    ("storekeeping", "Storekeeping"),
    ("night shift", "Night Shift"),
    ("night shift attendant", "Night Shift Attendant"),
];

/// Canonical display labels of every known department.
pub fn departments() -> impl Iterator<Item = &'static str> {
    DEPARTMENTS.iter().map(|(_, label)| *label)
}

/// Map a free-text department label to its display form.
///
/// Matching ignores case, surrounding whitespace, repeated inner whitespace
/// and hyphens (`floor-cleaning`). Unknown labels are returned trimmed.
pub fn normalize_dept(label: &str) -> String {
    let key = label
        .to_lowercase()
        .replace('-', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    DEPARTMENTS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, display)| (*display).to_string())
        .unwrap_or_else(|| label.trim().to_string())
}

/// Resolve a record's department: `dept`, then `type`, then `category`.
pub fn dept_of(dept: Option<&str>, kind: Option<&str>, category: Option<&str>) -> String {
    [dept, kind, category]
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
        .map(normalize_dept)
        .unwrap_or_default()
}

/// Person names match ignoring surrounding whitespace and case (full Unicode).
pub fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Decode a collection stored either as a bare array or wrapped under `field`.
///
/// Entries that fail to decode are skipped.
pub fn collection_from_value<T: DeserializeOwned>(value: Value, field: &str) -> Vec<T> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove(field) {
            Some(Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::debug!(field, error = %err, "skipping malformed record");
                None
            }
        })
        .collect()
}

/// Tasks from any stored task blob shape.
pub fn tasks_from_value(value: Value) -> Vec<Task> {
    collection_from_value(value, "tasks")
}

/// Staff from a roster of records, bare names, or `{ staff: [...] }`.
pub fn staff_from_value(value: Value) -> Vec<Staff> {
    collection_from_value::<RawStaffEntry>(value, "staff")
        .into_iter()
        .filter_map(RawStaffEntry::into_staff)
        .collect()
}

/// Accept a string, number or boolean as text; blank strings and null are `None`.
pub(crate) fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Some(Value::Number(number)) => Some(number.to_string()),
        Some(Value::Bool(flag)) => Some(flag.to_string()),
        _ => None,
    })
}

/// Accept a count stored as a number or numeric string; anything else is 0.
pub(crate) fn lenient_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(number)) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
            .unwrap_or(0),
        Some(Value::String(text)) => text.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn department_labels_canonicalize() {
        for label in ["floor cleaning", "Floor Cleaning ", "FLOOR CLEANING", "floor-cleaning", "floor   cleaning"] {
            assert_eq!(normalize_dept(label), "Floor Cleaning", "label {label:?}");
        }
        assert_eq!(normalize_dept("night shift attendant"), "Night Shift Attendant");
    }

    #[test]
    fn unknown_department_passes_through() {
        assert_eq!(normalize_dept("  Spa Services "), "Spa Services");
        assert_eq!(normalize_dept(""), "");
    }

    #[test]
    fn dept_resolution_order() {
        assert_eq!(dept_of(Some("laundry"), Some("gardener"), None), "Laundry");
        assert_eq!(dept_of(None, Some("gardener"), Some("laundry")), "Gardener");
        assert_eq!(dept_of(Some(" "), None, Some("public area")), "Public Area");
        assert_eq!(dept_of(None, None, None), "");
    }

    #[test]
    fn names_match_across_unicode_case() {
        assert!(same_name("José Ñúñez", " JOSÉ ÑÚÑEZ"));
        assert!(same_name("Ana", "ana"));
        assert!(!same_name("José", "Jose"));
    }

    #[test]
    fn task_shapes_are_equivalent() {
        let records = json!([
            {"id": 1, "title": "Mop lobby", "dept": "Floor Cleaning", "status": "Pending"},
            {"id": "2", "title": "Fold towels", "type": "laundry", "status": "Completed", "doneOn": "2024-06-01"}
        ]);

        let bare = tasks_from_value(records.clone());
        let wrapped = tasks_from_value(json!({ "tasks": records }));

        assert_eq!(bare.len(), 2);
        assert_eq!(bare, wrapped);
        assert!(tasks_from_value(json!("garbage")).is_empty());
        assert!(tasks_from_value(json!({"tasks": "nope"})).is_empty());
        assert!(tasks_from_value(Value::Null).is_empty());
    }

    #[test]
    fn malformed_records_are_skipped() {
        let tasks = tasks_from_value(json!({"tasks": [42, {"title": "no id"}, {"id": 3, "title": "ok"}]}));
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "ok");
    }

    #[test]
    fn staff_strings_get_defaults() {
        let staff = staff_from_value(json!(["Bob Smith", {"name": "Alice", "assigned": 5, "type": "Laundry"}]));
        assert_eq!(staff.len(), 2);
        assert_eq!(staff[0].name, "Bob Smith");
        assert_eq!(staff[0].role, "Housekeeper");
        assert_eq!(staff[0].dept, "Room Cleaning");
        assert_eq!(staff[0].assigned, 0);
        assert_eq!(staff[1].assigned, 5);
        assert_eq!(staff[1].dept, "Laundry");
    }

    #[test]
    fn staff_normalization_is_idempotent() {
        let once = staff_from_value(json!({"staff": ["Bob Smith", {"name": "Eve", "status": "Inactive"}]}));
        let again = staff_from_value(serde_json::to_value(&once).unwrap());
        assert_eq!(once, again);
    }
}
