//! Per-department views over independently written stores
//!
//! Admin pages write the canonical task key and roster, manager pages
//! historically wrote the legacy ones. A department view reads both and
//! concatenates them without deduplication: a task written through
//! [`crate::task::TaskStore`] lands in both keys and therefore appears twice
//! here.

use serde::Serialize;

use crate::keys;
use crate::normalize::{self, normalize_dept};
use crate::resource::{Resource, ResourceStore};
use crate::staff::{Staff, StaffRoster};
use crate::storage::KeyedStore;
use crate::task::{Task, TaskStatus};

/// Narrowing applied to a department task list.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    /// Exact assignee match
    pub assignee: Option<String>,
    /// Exact match against the task's category/type label
    pub type_label: Option<String>,
    /// Case-insensitive substring over title, assignee, room and type label
    pub search: Option<String>,
}

impl TaskFilter {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.assignee.is_none()
            && self.type_label.is_none()
            && self.search.as_deref().map_or(true, |q| q.trim().is_empty())
    }

    pub fn matches(&self, task: &Task) -> bool {
        if self.status.is_some_and(|status| task.status != status) {
            return false;
        }
        if let Some(assignee) = &self.assignee {
            if task.assignee.as_deref().unwrap_or("") != assignee {
                return false;
            }
        }
        if let Some(label) = &self.type_label {
            if task.type_label() != label {
                return false;
            }
        }
        if let Some(query) = &self.search {
            let query = query.trim().to_lowercase();
            if !query.is_empty() {
                let haystack = format!(
                    "{} {} {} {}",
                    task.title,
                    task.assignee.as_deref().unwrap_or(""),
                    task.room.as_deref().unwrap_or(""),
                    task.type_label()
                )
                .to_lowercase();
                if !haystack.contains(&query) {
                    return false;
                }
            }
        }
        true
    }

    pub fn apply(&self, tasks: Vec<Task>) -> Vec<Task> {
        tasks.into_iter().filter(|task| self.matches(task)).collect()
    }
}

/// Everything a department page shows.
#[derive(Debug, Clone, Serialize)]
pub struct DepartmentSnapshot {
    pub department: String,
    pub tasks: Vec<Task>,
    pub staff: Vec<Staff>,
    pub resources: Vec<Resource>,
}

#[derive(Clone)]
pub struct DepartmentMergeView {
    store: KeyedStore,
    roster: StaffRoster,
    resources: ResourceStore,
}

impl DepartmentMergeView {
    pub fn new(store: KeyedStore, roster: StaffRoster, resources: ResourceStore) -> Self {
        Self {
            store,
            roster,
            resources,
        }
    }

    /// Canonical tasks followed by legacy tasks, each store read on its own.
    pub fn merged_tasks(&self) -> Vec<Task> {
        [keys::TASKS, keys::LEGACY_TASKS]
            .into_iter()
            .filter_map(|key| self.store.get_value(key))
            .flat_map(normalize::tasks_from_value)
            .collect()
    }

    pub fn tasks_for_department(&self, dept: &str) -> Vec<Task> {
        let wanted = normalize_dept(dept);
        self.merged_tasks()
            .into_iter()
            .filter(|task| task.department() == wanted)
            .collect()
    }

    /// Admin roster followed by the manager-side roster.
    pub fn merged_staff(&self) -> Vec<Staff> {
        let mut staff = self.roster.read_all();
        if let Some(value) = self.store.get_value(keys::LEGACY_STAFF) {
            staff.extend(normalize::staff_from_value(value));
        }
        staff
    }

    pub fn staff_for_department(&self, dept: &str) -> Vec<Staff> {
        let wanted = normalize_dept(dept);
        self.merged_staff()
            .into_iter()
            .filter(|member| normalize_dept(&member.dept) == wanted)
            .collect()
    }

    pub fn resources_for_department(&self, dept: &str) -> Vec<Resource> {
        let wanted = normalize_dept(dept);
        self.resources
            .read_all()
            .into_iter()
            .filter(|resource| resource.department() == wanted)
            .collect()
    }

    pub fn snapshot(&self, dept: &str, filter: &TaskFilter) -> DepartmentSnapshot {
        DepartmentSnapshot {
            department: normalize_dept(dept),
            tasks: filter.apply(self.tasks_for_department(dept)),
            staff: self.staff_for_department(dept),
            resources: self.resources_for_department(dept),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::ChangeBus;
    use crate::storage::MemoryArea;
    use serde_json::json;

    fn view(store: &KeyedStore) -> DepartmentMergeView {
        let bus = ChangeBus::new(store.clone());
        DepartmentMergeView::new(
            store.clone(),
            StaffRoster::new(store.clone(), bus.clone()),
            ResourceStore::new(store.clone(), bus),
        )
    }

    #[test]
    fn merges_both_stores_without_dedup() {
        let store = KeyedStore::new(MemoryArea::new().context());
        store.set(keys::TASKS, &json!({"tasks": [{"id": 1, "title": "A", "dept": "laundry"}]}));
        store.set(
            keys::LEGACY_TASKS,
            &json!([{"id": 1, "title": "A", "type": "Laundry"}, {"id": 2, "title": "B", "category": "gardener"}]),
        );

        let view = view(&store);
        let laundry = view.tasks_for_department("LAUNDRY");
        assert_eq!(laundry.len(), 2);
        assert_eq!(view.tasks_for_department("Gardener").len(), 1);
    }

    #[test]
    fn staff_merges_admin_and_manager_rosters() {
        let store = KeyedStore::new(MemoryArea::new().context());
        store.set(keys::STAFF, &json!([{"name": "Pat", "type": "laundry"}, {"name": "Lee", "type": "Gardener"}]));
        store.set(keys::LEGACY_STAFF, &json!([{"id": "m1", "name": "Pat", "type": "Laundry"}]));

        let view = view(&store);
        let laundry = view.staff_for_department("Laundry");
        assert_eq!(laundry.len(), 2);
        assert_eq!(laundry[1].id, "m1");
        assert_eq!(view.staff_for_department("gardener").len(), 1);

        store.remove(keys::STAFF);
        assert_eq!(view.staff_for_department("Laundry").len(), 1);
    }

    #[test]
    fn filter_narrows_by_status_and_search() {
        let tasks: Vec<Task> = serde_json::from_value(json!([
            {"id": 1, "title": "Mop lobby", "assignee": "Ann", "status": "Pending", "category": "Deep"},
            {"id": 2, "title": "Wax floor", "assignee": "Bob", "room": "101", "status": "Completed"}
        ]))
        .unwrap();

        let pending = TaskFilter {
            status: Some(TaskStatus::Pending),
            ..TaskFilter::default()
        };
        assert_eq!(pending.apply(tasks.clone()).len(), 1);

        let by_room = TaskFilter {
            search: Some("101".into()),
            ..TaskFilter::default()
        };
        assert_eq!(by_room.apply(tasks.clone())[0].title, "Wax floor");

        let by_label = TaskFilter {
            type_label: Some("-".into()),
            ..TaskFilter::default()
        };
        assert_eq!(by_label.apply(tasks.clone()).len(), 1);
        assert!(TaskFilter::default().is_empty());
        assert_eq!(TaskFilter::default().apply(tasks).len(), 2);
    }
}
