//! Rooms and the cached occupancy aggregate
//!
//! Every room write persists three keys in order: the collection
//! (`hms_rooms_local_v1`), the recomputed aggregate (`hms_rooms_occupancy_v1`),
//! then the `rooms-updated` pulse. Dashboards read the aggregate directly and
//! never recompute it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};
use ulid::Ulid;

use crate::bus::ChangeBus;
use crate::error::{Error, Result};
use crate::keys::{self, Channel};
use crate::normalize::{self, lenient_text};
use crate::storage::KeyedStore;

/// Room state. Values outside the known three are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoomStatus {
    Vacant,
    Occupied,
    Needs,
    Other(String),
}

/// Aggregate bucket a status counts towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupancy {
    Occupied,
    Vacant,
    Needs,
}

impl RoomStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RoomStatus::Vacant => "Vacant",
            RoomStatus::Occupied => "Occupied",
            RoomStatus::Needs => "Needs",
            RoomStatus::Other(label) => label,
        }
    }

    /// Case-insensitive classification; anything unrecognized needs attention.
    pub fn occupancy(&self) -> Occupancy {
        match self.as_str().trim().to_lowercase().as_str() {
            "occupied" => Occupancy::Occupied,
            "vacant" => Occupancy::Vacant,
            _ => Occupancy::Needs,
        }
    }

    fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().replace('-', " ").as_str() {
            "vacant" => RoomStatus::Vacant,
            "occupied" => RoomStatus::Occupied,
            "needs" | "needs cleaning" => RoomStatus::Needs,
            _ => RoomStatus::Other(label.to_string()),
        }
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoomStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Err(Error::InvalidArgument("room status cannot be empty".to_string()));
        }
        Ok(RoomStatus::from_label(s.trim()))
    }
}

impl Serialize for RoomStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RoomStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let label = lenient_text(deserializer)?.unwrap_or_default();
        Ok(RoomStatus::from_label(&label))
    }
}

impl Default for RoomStatus {
    fn default() -> Self {
        RoomStatus::Other(String::new())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default)]
    pub status: RoomStatus,
    #[serde(default, deserialize_with = "lenient_text")]
    pub occupant: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn lenient_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_text(deserializer)?.unwrap_or_default())
}

impl Room {
    /// Room number, or the id for records stored without one.
    pub fn number(&self) -> &str {
        self.number.as_deref().unwrap_or(&self.id)
    }

    fn matches(&self, id_or_number: &str) -> bool {
        let needle = id_or_number.trim();
        (!self.id.is_empty() && self.id == needle) || self.number() == needle
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomAggregate {
    #[serde(default)]
    pub occupied: u32,
    #[serde(default)]
    pub vacant: u32,
    #[serde(default)]
    pub needs: u32,
}

impl RoomAggregate {
    pub fn total(&self) -> u32 {
        self.occupied + self.vacant + self.needs
    }
}

/// Count rooms per occupancy bucket.
pub fn recompute(rooms: &[Room]) -> RoomAggregate {
    let mut aggregate = RoomAggregate::default();
    for room in rooms {
        match room.status.occupancy() {
            Occupancy::Occupied => aggregate.occupied += 1,
            Occupancy::Vacant => aggregate.vacant += 1,
            Occupancy::Needs => aggregate.needs += 1,
        }
    }
    aggregate
}

/// Input for [`RoomStore::upsert`].
#[derive(Debug, Clone)]
pub struct RoomDraft {
    pub number: String,
    pub status: RoomStatus,
    pub occupant: Option<String>,
}

#[derive(Clone)]
pub struct RoomStore {
    store: KeyedStore,
    bus: ChangeBus,
}

impl RoomStore {
    pub fn new(store: KeyedStore, bus: ChangeBus) -> Self {
        Self { store, bus }
    }

    pub fn read_all(&self) -> Vec<Room> {
        self.store
            .get_value(keys::ROOMS)
            .map(|value| normalize::collection_from_value(value, "rooms"))
            .unwrap_or_default()
    }

    /// Persist the collection, then its aggregate, then pulse.
    pub fn write_all(&self, rooms: &[Room]) -> bool {
        let persisted = self.store.set(keys::ROOMS, &json!({ "rooms": rooms }));
        self.store.set(keys::ROOMS_AGGREGATE, &recompute(rooms));
        self.bus.pulse(Channel::Rooms);
        persisted
    }

    /// Cached aggregate as last published.
    pub fn read_aggregate(&self) -> RoomAggregate {
        self.store.get(keys::ROOMS_AGGREGATE, RoomAggregate::default())
    }

    /// Recompute and republish the aggregate from the stored collection.
    pub fn refresh_aggregate(&self) -> RoomAggregate {
        let aggregate = recompute(&self.read_all());
        self.store.set(keys::ROOMS_AGGREGATE, &aggregate);
        self.bus.pulse(Channel::Rooms);
        aggregate
    }

    /// Update the room with this number, or add it.
    ///
    /// `Occupied` needs an occupant; any other status clears it.
    pub fn upsert(&self, draft: RoomDraft) -> Result<Room> {
        let number = draft.number.trim();
        if number.is_empty() {
            return Err(Error::Validation("Enter a room number".to_string()));
        }
        let occupant = draft
            .occupant
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        let occupant = match (&draft.status, occupant) {
            (RoomStatus::Occupied, None) => {
                return Err(Error::Validation("Occupant name required".to_string()));
            }
            (RoomStatus::Occupied, Some(name)) => Some(name),
            _ => None,
        };

        let mut rooms = self.read_all();
        let room = match rooms.iter_mut().find(|room| room.number() == number) {
            Some(existing) => {
                existing.status = draft.status;
                existing.occupant = occupant;
                existing.clone()
            }
            None => {
                let room = Room {
                    id: format!("r_{}", Ulid::new().to_string().to_lowercase()),
                    number: Some(number.to_string()),
                    status: draft.status,
                    occupant,
                    extra: Map::new(),
                };
                rooms.push(room.clone());
                room
            }
        };

        self.write_all(&rooms);
        Ok(room)
    }

    /// Delete by id or number; unknown rooms are a no-op.
    pub fn remove(&self, id_or_number: &str) -> bool {
        let mut rooms = self.read_all();
        let before = rooms.len();
        rooms.retain(|room| !room.matches(id_or_number));
        if rooms.len() == before {
            return false;
        }
        self.write_all(&rooms);
        true
    }

    /// Delete every room. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let removed = self.read_all().len();
        self.write_all(&[]);
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryArea;

    fn room(status: &str) -> Room {
        serde_json::from_value(json!({"id": "r", "number": "1", "status": status})).unwrap()
    }

    fn rooms() -> (KeyedStore, RoomStore) {
        let store = KeyedStore::new(MemoryArea::new().context());
        let bus = ChangeBus::new(store.clone());
        (store.clone(), RoomStore::new(store, bus))
    }

    #[test]
    fn aggregate_counts_unknown_as_needs() {
        let list = vec![room("Vacant"), room("Occupied"), room("occupied"), room("Weird")];
        assert_eq!(
            recompute(&list),
            RoomAggregate {
                occupied: 2,
                vacant: 1,
                needs: 1
            }
        );
    }

    #[test]
    fn unknown_status_round_trips_verbatim() {
        let weird = room("Out of Order");
        assert_eq!(weird.status, RoomStatus::Other("Out of Order".into()));
        assert_eq!(serde_json::to_value(&weird).unwrap()["status"], json!("Out of Order"));
    }

    #[test]
    fn occupied_requires_occupant() {
        let (store, rooms) = rooms();
        let err = rooms
            .upsert(RoomDraft {
                number: "101".into(),
                status: RoomStatus::Occupied,
                occupant: Some("  ".into()),
            })
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(store.get_text(keys::ROOMS), None);
    }

    #[test]
    fn upsert_updates_by_number_and_clears_occupant() {
        let (store, rooms) = rooms();
        let added = rooms
            .upsert(RoomDraft {
                number: "101".into(),
                status: RoomStatus::Occupied,
                occupant: Some("Mr. Lee".into()),
            })
            .unwrap();
        assert!(added.id.starts_with("r_"));

        let updated = rooms
            .upsert(RoomDraft {
                number: " 101 ".into(),
                status: RoomStatus::Vacant,
                occupant: Some("ignored".into()),
            })
            .unwrap();
        assert_eq!(updated.id, added.id);
        assert_eq!(updated.occupant, None);
        assert_eq!(rooms.read_all().len(), 1);

        let stored = store.get_value(keys::ROOMS).unwrap();
        assert_eq!(stored["rooms"][0]["occupant"], Value::Null);
        assert_eq!(rooms.read_aggregate().vacant, 1);
    }

    #[test]
    fn remove_and_clear_republish_aggregate() {
        let (_, rooms) = rooms();
        for number in ["101", "102", "103"] {
            rooms
                .upsert(RoomDraft {
                    number: number.into(),
                    status: RoomStatus::Needs,
                    occupant: None,
                })
                .unwrap();
        }
        assert!(rooms.remove("102"));
        assert!(!rooms.remove("999"));
        assert_eq!(rooms.read_aggregate().needs, 2);

        assert_eq!(rooms.clear(), 2);
        assert_eq!(rooms.read_aggregate(), RoomAggregate::default());
    }
}
