//! Admin dashboard numbers
//!
//! Everything here is derived on read. Room totals come from the cached
//! occupancy aggregate, not from the room collection.

use std::collections::HashMap;

use serde::Serialize;

use crate::keys;
use crate::room::{RoomAggregate, RoomStore};
use crate::staff::StaffRoster;
use crate::storage::KeyedStore;
use crate::task::TaskStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub staff: usize,
    pub rooms: u32,
    pub completed: usize,
    pub pending: usize,
    pub occupancy: RoomAggregate,
}

/// One bar of the staff workload chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkloadBar {
    pub name: String,
    pub tasks: u32,
}

#[derive(Clone)]
pub struct Dashboard {
    store: KeyedStore,
    tasks: TaskStore,
    roster: StaffRoster,
    rooms: RoomStore,
}

impl Dashboard {
    pub fn new(store: KeyedStore, tasks: TaskStore, roster: StaffRoster, rooms: RoomStore) -> Self {
        Self {
            store,
            tasks,
            roster,
            rooms,
        }
    }

    pub fn summary(&self) -> Summary {
        let tasks = self.tasks.read_all();
        let completed = tasks.iter().filter(|task| !task.status.is_open()).count();
        let occupancy = self.rooms.read_aggregate();
        Summary {
            staff: self.roster.read_all().len(),
            rooms: occupancy.total(),
            completed,
            pending: tasks.len() - completed,
            occupancy,
        }
    }

    /// Tasks per assignee across every status. When nobody has a task the
    /// stored `assigned` counts are shown instead. Hidden names are left out.
    pub fn staff_workload(&self) -> Vec<WorkloadBar> {
        let staff = self.roster.read_all();
        let tasks = self.tasks.read_all();
        let hidden = self.hidden_bars();

        let mut names: Vec<String> = staff.iter().map(|member| member.name.clone()).collect();
        let mut counts: HashMap<String, u32> = HashMap::new();
        for assignee in tasks.iter().filter_map(|task| task.assignee.as_deref()) {
            *counts.entry(assignee.to_string()).or_default() += 1;
            if !names.iter().any(|name| name == assignee) {
                names.push(assignee.to_string());
            }
        }

        if counts.values().all(|count| *count == 0) {
            for member in &staff {
                counts.insert(member.name.clone(), member.assigned);
            }
        }

        names
            .into_iter()
            .filter(|name| !name.is_empty() && !hidden.contains(name))
            .map(|name| WorkloadBar {
                tasks: counts.get(&name).copied().unwrap_or(0),
                name,
            })
            .collect()
    }

    pub fn hidden_bars(&self) -> Vec<String> {
        self.store.get(keys::STAFF_BARS_HIDDEN, Vec::new())
    }

    /// Hide a name from the workload chart. False if it was already hidden.
    pub fn hide_staff_bar(&self, name: &str) -> bool {
        let mut hidden = self.hidden_bars();
        if hidden.iter().any(|entry| entry == name) {
            return false;
        }
        hidden.push(name.to_string());
        self.store.set(keys::STAFF_BARS_HIDDEN, &hidden);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::ChangeBus;
    use crate::task::MirrorPolicy;
    use crate::storage::MemoryArea;
    use serde_json::json;

    fn dashboard(store: &KeyedStore) -> Dashboard {
        let bus = ChangeBus::new(store.clone());
        Dashboard::new(
            store.clone(),
            TaskStore::new(store.clone(), bus.clone(), MirrorPolicy::default()),
            StaffRoster::new(store.clone(), bus.clone()),
            RoomStore::new(store.clone(), bus),
        )
    }

    #[test]
    fn summary_uses_cached_aggregate() {
        let store = KeyedStore::new(MemoryArea::new().context());
        store.set(keys::STAFF, &json!(["Ann", "Bob"]));
        store.set(keys::ROOMS_AGGREGATE, &json!({"occupied": 3, "vacant": 1, "needs": 2}));
        store.set(
            keys::TASKS,
            &json!({"tasks": [
                {"id": 1, "title": "a", "status": "Completed"},
                {"id": 2, "title": "b"},
                {"id": 3, "title": "c", "status": "In Progress"}
            ]}),
        );

        let summary = dashboard(&store).summary();
        assert_eq!(summary.staff, 2);
        assert_eq!(summary.rooms, 6);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.pending, 2);
    }

    #[test]
    fn workload_falls_back_to_stored_counts() {
        let store = KeyedStore::new(MemoryArea::new().context());
        store.set(
            keys::STAFF,
            &json!([{"name": "Ann", "assigned": 4}, {"name": "Bob", "assigned": 1}]),
        );
        let dash = dashboard(&store);

        let bars = dash.staff_workload();
        assert_eq!(bars[0], WorkloadBar { name: "Ann".into(), tasks: 4 });

        assert!(dash.hide_staff_bar("Ann"));
        assert!(!dash.hide_staff_bar("Ann"));
        let bars = dash.staff_workload();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].name, "Bob");
    }

    #[test]
    fn workload_counts_all_statuses_and_unknown_assignees() {
        let store = KeyedStore::new(MemoryArea::new().context());
        store.set(keys::STAFF, &json!([{"name": "Ann", "assigned": 9}]));
        store.set(
            keys::TASKS,
            &json!({"tasks": [
                {"id": 1, "title": "a", "assignee": "Ann", "status": "Completed"},
                {"id": 2, "title": "b", "assignee": "Zed"}
            ]}),
        );
        let bars = dashboard(&store).staff_workload();
        assert_eq!(
            bars,
            vec![
                WorkloadBar { name: "Ann".into(), tasks: 1 },
                WorkloadBar { name: "Zed".into(), tasks: 1 },
            ]
        );
    }
}
