//! External state sources
//!
//! A [`DataSource`] supplies a whole dashboard state (`{staff, rooms, tasks,
//! activity}`). Nothing in the sync layer depends on one being reachable:
//! [`load_state`] falls back to the built-in sample data on any failure.

use std::fs;
use std::path::PathBuf;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::context::SyncContext;
use crate::error::Result;
use crate::normalize::{self, normalize_dept};
use crate::resource::{Resource, ResourceDraft};
use crate::room::Room;
use crate::staff::Staff;
use crate::task::{Task, TaskDraft};

/// State as delivered by a source, before normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteState {
    #[serde(default)]
    pub staff: Value,
    #[serde(default)]
    pub rooms: Value,
    #[serde(default)]
    pub tasks: Value,
    #[serde(default)]
    pub activity: Vec<Value>,
}

/// Normalized state ready to be written to the stores.
#[derive(Debug, Clone, Serialize)]
pub struct LoadedState {
    pub source: String,
    pub staff: Vec<Staff>,
    pub rooms: Vec<Room>,
    pub tasks: Vec<Task>,
    pub activity: Vec<Value>,
}

impl RemoteState {
    pub fn normalize(self, source: impl Into<String>) -> LoadedState {
        LoadedState {
            source: source.into(),
            staff: normalize::staff_from_value(self.staff),
            rooms: normalize::collection_from_value(self.rooms, "rooms"),
            tasks: normalize::tasks_from_value(self.tasks),
            activity: self.activity,
        }
    }
}

pub trait DataSource {
    fn name(&self) -> &str;
    fn fetch(&self) -> Result<RemoteState>;
}

/// Reads a state document from a JSON file.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    name: String,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        Self { path, name }
    }
}

impl DataSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> Result<RemoteState> {
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Built-in demo data.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleSource;

impl DataSource for SampleSource {
    fn name(&self) -> &str {
        "sample"
    }

    fn fetch(&self) -> Result<RemoteState> {
        let days_ago = |days: i64| {
            (Utc::now().date_naive() - Duration::days(days))
                .format("%Y-%m-%d")
                .to_string()
        };

        Ok(RemoteState {
            staff: json!([
                {"name": "Alice Johnson", "role": "Housekeeper", "type": "Room Cleaning", "status": "Active", "assigned": 5},
                "Bob Smith",
                {"name": "Charlie Brown", "role": "Housekeeper", "type": "Public Area", "status": "Active", "assigned": 3},
                {"name": "Diana Miller", "role": "Maintenance", "type": "Maintenance", "status": "Active", "assigned": 1},
                {"name": "Eve Davis", "role": "Housekeeper", "type": "Laundry", "status": "Inactive", "assigned": 0},
                {"name": "Grace Taylor", "role": "Supervisor", "type": "Food Service", "status": "Active", "assigned": 4}
            ]),
            rooms: json!([
                {"id": 101, "status": "Vacant"}, {"id": 102, "status": "Occupied", "occupant": "Guest"},
                {"id": 103, "status": "Needs"}, {"id": 104, "status": "Vacant"},
                {"id": 105, "status": "Needs"}, {"id": 201, "status": "Occupied", "occupant": "Guest"},
                {"id": 202, "status": "Vacant"}, {"id": 203, "status": "Occupied", "occupant": "Guest"}
            ]),
            tasks: json!([
                {"id": 1, "title": "Room 101 - Standard Clean", "assignee": "Alice Johnson", "room": 101, "type": "Room Cleaning", "status": "Pending"},
                {"id": 2, "title": "Lobby - Floor Polish", "assignee": "Bob Smith", "type": "Floor Cleaning", "status": "In Progress"},
                {"id": 3, "title": "Room 201 - Deep Clean", "assignee": "Charlie Brown", "room": 201, "type": "Room Cleaning", "status": "Completed", "doneOn": days_ago(1)},
                {"id": 4, "title": "Laundry - Batch 3", "assignee": "Eve Davis", "type": "Laundry", "status": "Completed", "doneOn": days_ago(3)},
                {"id": 5, "title": "Restaurant - Setup", "assignee": "Grace Taylor", "type": "Food Service", "status": "Completed", "doneOn": days_ago(2)}
            ]),
            activity: Vec::new(),
        })
    }
}

/// Fetch from `primary`, falling back to [`SampleSource`] on failure.
pub fn load_state(primary: &dyn DataSource) -> Result<LoadedState> {
    match primary.fetch() {
        Ok(state) => Ok(state.normalize(primary.name())),
        Err(err) => {
            tracing::warn!(source = primary.name(), error = %err, "data source unavailable, using sample data");
            let sample = SampleSource;
            Ok(sample.fetch()?.normalize(sample.name()))
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SeedReport {
    pub source: String,
    pub staff: usize,
    pub rooms: usize,
    pub tasks: usize,
}

/// Replace the staff, room and task collections with `state`.
pub fn seed(ctx: &SyncContext, state: &LoadedState) -> SeedReport {
    ctx.staff().write_all(&state.staff);
    ctx.rooms().write_all(&state.rooms);
    ctx.tasks().write_all(&state.tasks);
    SeedReport {
        source: state.source.clone(),
        staff: state.staff.len(),
        rooms: state.rooms.len(),
        tasks: state.tasks.len(),
    }
}

/// Add one demo task and one demo resource request for a department.
pub fn seed_department(ctx: &SyncContext, dept: &str) -> Result<(Task, Resource)> {
    let dept = normalize_dept(dept);
    let task = ctx.tasks().add_task(TaskDraft {
        title: format!("{dept} - Demo Task"),
        assignee: Some("Alice Johnson".to_string()),
        dept: Some(dept.clone()),
        category: Some("Routine".to_string()),
        room: Some("Lobby".to_string()),
        ..TaskDraft::default()
    })?;
    let resource = ctx.resources().add(ResourceDraft {
        item: "Floor Mop".to_string(),
        assignee: Some("Alice Johnson".to_string()),
        dept: Some(dept),
        quantity: Some(2),
        unit: Some("pcs".to_string()),
        needed_on: Some(Utc::now().format("%Y-%m-%d").to_string()),
        notes: None,
    })?;
    Ok((task, resource))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::storage::MemoryArea;

    struct Unreachable;

    impl DataSource for Unreachable {
        fn name(&self) -> &str {
            "api"
        }

        fn fetch(&self) -> Result<RemoteState> {
            Err(Error::OperationFailed("connection refused".to_string()))
        }
    }

    #[test]
    fn unreachable_source_falls_back_to_sample() {
        let state = load_state(&Unreachable).unwrap();
        assert_eq!(state.source, "sample");
        assert_eq!(state.staff.len(), 6);
        assert_eq!(state.staff[1].name, "Bob Smith");
        assert_eq!(state.staff[1].role, "Housekeeper");
        assert_eq!(state.rooms.len(), 8);
        assert_eq!(state.rooms[0].number(), "101");
        assert_eq!(state.tasks.len(), 5);
    }

    #[test]
    fn seed_publishes_aggregate() {
        let ctx = SyncContext::new(MemoryArea::new().context());
        let state = SampleSource.fetch().unwrap().normalize("sample");
        let report = seed(&ctx, &state);
        assert_eq!(report.rooms, 8);

        let aggregate = ctx.rooms().read_aggregate();
        assert_eq!((aggregate.occupied, aggregate.vacant, aggregate.needs), (3, 3, 2));
        assert_eq!(ctx.tasks().read_all().len(), 5);
    }

    #[test]
    fn department_seed_lands_in_department_view() {
        let ctx = SyncContext::new(MemoryArea::new().context());
        let (task, resource) = seed_department(&ctx, "gardener").unwrap();
        assert_eq!(task.department(), "Gardener");
        assert_eq!(resource.quantity, 2);
        assert_eq!(ctx.departments().resources_for_department("Gardener").len(), 1);
    }
}
