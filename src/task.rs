//! Task collection for hkstate.
//!
//! Tasks live as one `{ "tasks": [...] }` document under `hk_tasks_v1`. Every
//! write is replicated to the legacy `hms_tasks_local_v1` key so readers that
//! only know the old key keep working. Each key gets its own pulse.

use std::fmt;
use std::str::FromStr;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use ulid::Ulid;

use crate::bus::ChangeBus;
use crate::error::{Error, Result};
use crate::keys::{self, Channel};
use crate::normalize::{self, lenient_text};
use crate::storage::KeyedStore;

const OPAQUE_ID_PREFIX: &str = "t_";

/// Task identifier: numeric for most writers, an opaque string for others.
///
/// Ids compare by their text form, so `7` and `"7"` are the same task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskId {
    Num(u64),
    Text(String),
}

impl TaskId {
    /// Numeric value, counting numeric strings.
    pub fn as_number(&self) -> Option<u64> {
        match self {
            TaskId::Num(n) => Some(*n),
            TaskId::Text(text) => text.trim().parse().ok(),
        }
    }

    pub(crate) fn opaque() -> Self {
        TaskId::Text(format!("{OPAQUE_ID_PREFIX}{}", Ulid::new().to_string().to_lowercase()))
    }
}

impl PartialEq for TaskId {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl Eq for TaskId {}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Num(n) => write!(f, "{n}"),
            TaskId::Text(text) => f.write_str(text.trim()),
        }
    }
}

impl From<u64> for TaskId {
    fn from(n: u64) -> Self {
        TaskId::Num(n)
    }
}

impl FromStr for TaskId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidArgument("task id cannot be empty".to_string()));
        }
        Ok(s.parse::<u64>()
            .map(TaskId::Num)
            .unwrap_or_else(|_| TaskId::Text(s.to_string())))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum TaskStatus {
    #[default]
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Completed => "Completed",
        }
    }

    pub fn is_open(self) -> bool {
        self != TaskStatus::Completed
    }

    /// Lenient parse used for stored data and CLI input.
    pub fn parse_lenient(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace(['-', '_'], " ").as_str() {
            "pending" => Some(TaskStatus::Pending),
            "in progress" | "inprogress" => Some(TaskStatus::InProgress),
            "completed" | "done" => Some(TaskStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TaskStatus::parse_lenient(s).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "invalid task status '{s}' (expected Pending, In Progress or Completed)"
            ))
        })
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value
            .as_ref()
            .and_then(Value::as_str)
            .and_then(TaskStatus::parse_lenient)
            .unwrap_or_default())
    }
}

/// A stored task. Fields this crate does not know are kept in `extra` and
/// written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    #[serde(default, deserialize_with = "lenient_title")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub dept: Option<String>,
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub created_on: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub done_on: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn lenient_title<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_text(deserializer)?.unwrap_or_default())
}

impl Task {
    /// Canonical department (`dept`, then `type`, then `category`).
    pub fn department(&self) -> String {
        normalize::dept_of(
            self.dept.as_deref(),
            self.kind.as_deref(),
            self.category.as_deref(),
        )
    }

    /// Classification shown in department listings.
    pub fn type_label(&self) -> &str {
        self.category
            .as_deref()
            .or(self.kind.as_deref())
            .unwrap_or("-")
    }

    pub fn is_assigned_to(&self, name: &str) -> bool {
        self.assignee
            .as_deref()
            .is_some_and(|assignee| normalize::same_name(assignee, name))
    }
}

/// Input for [`TaskStore::add_task`].
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub title: String,
    pub assignee: Option<String>,
    pub dept: Option<String>,
    pub kind: Option<String>,
    pub category: Option<String>,
    pub room: Option<String>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Next id: max numeric id + 1, `1` for an empty collection, an opaque
/// string when ids exist but none are numeric or the max cannot be bumped.
pub fn next_task_id(tasks: &[Task]) -> TaskId {
    if tasks.is_empty() {
        return TaskId::Num(1);
    }
    tasks
        .iter()
        .filter_map(|task| task.id.as_number())
        .max()
        .and_then(|max| max.checked_add(1))
        .map(TaskId::Num)
        .unwrap_or_else(TaskId::opaque)
}

pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

/// Outcome of a replicated write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    pub primary: bool,
    /// `None` when no mirror is configured
    pub mirror: Option<bool>,
}

/// Writes one document to a primary channel and optionally to a mirror.
///
/// Each target is written then pulsed, primary first. A failed primary does
/// not stop the mirror attempt and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorPolicy {
    primary: Channel,
    mirror: Option<Channel>,
}

impl MirrorPolicy {
    pub fn new(primary: Channel, mirror: Option<Channel>) -> Self {
        Self { primary, mirror }
    }

    /// Canonical task key, mirrored to the legacy key when `mirror_legacy`.
    pub fn tasks(mirror_legacy: bool) -> Self {
        Self::new(Channel::Tasks, mirror_legacy.then_some(Channel::LegacyTasks))
    }

    pub fn primary(&self) -> Channel {
        self.primary
    }

    pub fn mirror(&self) -> Option<Channel> {
        self.mirror
    }

    pub fn write(&self, store: &KeyedStore, bus: &ChangeBus, document: &Value) -> WriteReport {
        let primary = write_target(store, bus, self.primary, document);
        let mirror = self
            .mirror
            .map(|channel| write_target(store, bus, channel, document));
        WriteReport { primary, mirror }
    }
}

impl Default for MirrorPolicy {
    fn default() -> Self {
        Self::tasks(true)
    }
}

fn write_target(store: &KeyedStore, bus: &ChangeBus, channel: Channel, document: &Value) -> bool {
    let persisted = channel
        .data_keys()
        .first()
        .map(|key| store.set(key, document))
        .unwrap_or(false);
    bus.pulse(channel);
    persisted
}

/// Canonical task collection for one context.
#[derive(Clone)]
pub struct TaskStore {
    store: KeyedStore,
    bus: ChangeBus,
    policy: MirrorPolicy,
}

impl TaskStore {
    pub fn new(store: KeyedStore, bus: ChangeBus, policy: MirrorPolicy) -> Self {
        Self { store, bus, policy }
    }

    pub fn policy(&self) -> MirrorPolicy {
        self.policy
    }

    /// All tasks from the canonical key. Falls back to the legacy key only
    /// when the canonical key has never been written.
    pub fn read_all(&self) -> Vec<Task> {
        match self.store.get_value(keys::TASKS) {
            Some(value) if !value.is_null() => normalize::tasks_from_value(value),
            _ => self
                .store
                .get_value(keys::LEGACY_TASKS)
                .map(normalize::tasks_from_value)
                .unwrap_or_default(),
        }
    }

    /// Replace the whole collection (last write wins).
    pub fn write_all(&self, tasks: &[Task]) -> WriteReport {
        let document = json!({ "tasks": tasks });
        let report = self.policy.write(&self.store, &self.bus, &document);
        if !report.primary {
            tracing::warn!(count = tasks.len(), "task collection not persisted");
        }
        report
    }

    pub fn get(&self, id: &TaskId) -> Option<Task> {
        self.read_all().into_iter().find(|task| &task.id == id)
    }

    pub fn add_task(&self, draft: TaskDraft) -> Result<Task> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(Error::Validation("Task title is required".to_string()));
        }

        let mut tasks = self.read_all();
        let clean = |value: Option<String>| {
            value
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
        };
        let category = clean(draft.category);
        let kind = clean(draft.kind).or_else(|| category.clone());
        let dept = clean(draft.dept).map(|dept| normalize::normalize_dept(&dept));

        let task = Task {
            id: next_task_id(&tasks),
            title: title.to_string(),
            assignee: clean(draft.assignee),
            dept,
            kind,
            category,
            room: clean(draft.room),
            status: TaskStatus::Pending,
            created_on: Some(now_timestamp()),
            done_on: None,
            extra: Map::new(),
        };

        tasks.push(task.clone());
        self.write_all(&tasks);
        tracing::debug!(id = %task.id, title = %task.title, "task added");
        Ok(task)
    }

    /// Complete a task. False when it does not exist or is already completed.
    pub fn mark_completed(&self, id: &TaskId) -> bool {
        self.transition(id, TaskStatus::Completed, |status| status.is_open())
    }

    /// Move a pending task to In Progress. False for any other state.
    pub fn start_task(&self, id: &TaskId) -> bool {
        self.transition(id, TaskStatus::InProgress, |status| {
            status == TaskStatus::Pending
        })
    }

    fn transition(&self, id: &TaskId, to: TaskStatus, allowed: impl Fn(TaskStatus) -> bool) -> bool {
        let mut tasks = self.read_all();
        let Some(task) = tasks.iter_mut().find(|task| &task.id == id) else {
            return false;
        };
        if !allowed(task.status) {
            return false;
        }

        task.status = to;
        if to == TaskStatus::Completed {
            task.done_on = Some(today());
        }
        self.write_all(&tasks);
        true
    }

    /// Remove a task; unknown ids are a no-op.
    pub fn remove_task(&self, id: &TaskId) -> bool {
        let mut tasks = self.read_all();
        let before = tasks.len();
        tasks.retain(|task| &task.id != id);
        if tasks.len() == before {
            return false;
        }
        self.write_all(&tasks);
        true
    }

    /// Rewrite the canonical key as `{ tasks: [...] }` if it is missing, a
    /// bare array, or an object without a task array. No pulse is sent.
    pub fn ensure_canonical(&self) -> bool {
        let replacement = match self.store.get_value(keys::TASKS) {
            None | Some(Value::Null) => json!({ "tasks": [] }),
            Some(Value::Array(items)) => json!({ "tasks": items }),
            Some(Value::Object(map)) if map.get("tasks").is_some_and(Value::is_array) => {
                return false;
            }
            Some(_) => json!({ "tasks": [] }),
        };
        self.store.set(keys::TASKS, &replacement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryArea;

    fn task(id: TaskId) -> Task {
        serde_json::from_value(json!({ "id": id, "title": "t" })).unwrap()
    }

    fn fixture() -> (KeyedStore, TaskStore) {
        let store = KeyedStore::new(MemoryArea::new().context());
        let bus = ChangeBus::new(store.clone());
        let tasks = TaskStore::new(store.clone(), bus, MirrorPolicy::default());
        (store, tasks)
    }

    #[test]
    fn next_id_follows_max_numeric() {
        let tasks = vec![task(1.into()), task(TaskId::Text("3".into())), task(7.into())];
        assert_eq!(next_task_id(&tasks), TaskId::Num(8));
        assert_eq!(next_task_id(&[]), TaskId::Num(1));

        let opaque = next_task_id(&[task(TaskId::Text("m_abc".into()))]);
        assert!(opaque.to_string().starts_with(OPAQUE_ID_PREFIX));
        assert_eq!(opaque.as_number(), None);
    }

    #[test]
    fn next_id_at_numeric_limit_goes_opaque() {
        let (store, tasks) = fixture();
        store.set(keys::TASKS, &json!({"tasks": [{"id": u64::MAX.to_string(), "title": "big"}]}));
        let added = tasks.add_task(TaskDraft::new("next")).unwrap();
        assert!(added.id.to_string().starts_with(OPAQUE_ID_PREFIX));
        assert_eq!(tasks.read_all().len(), 2);
    }

    #[test]
    fn ids_compare_by_text() {
        assert_eq!(TaskId::Num(7), TaskId::Text("7".into()));
        assert_ne!(TaskId::Num(7), TaskId::Text("07".into()));
        assert_eq!("12".parse::<TaskId>().unwrap(), TaskId::Num(12));
        assert!("  ".parse::<TaskId>().is_err());
    }

    #[test]
    fn status_parsing_is_lenient() {
        let parsed: Task = serde_json::from_value(json!({"id": 1, "title": "x", "status": "in progress"})).unwrap();
        assert_eq!(parsed.status, TaskStatus::InProgress);
        let unknown: Task = serde_json::from_value(json!({"id": 1, "title": "x", "status": 5})).unwrap();
        assert_eq!(unknown.status, TaskStatus::Pending);
        assert_eq!(serde_json::to_value(TaskStatus::InProgress).unwrap(), json!("In Progress"));
    }

    #[test]
    fn unknown_fields_survive_rewrite() {
        let raw = json!({"id": 4, "title": "Polish", "room": 204, "priority": "high"});
        let parsed: Task = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.room.as_deref(), Some("204"));
        let written = serde_json::to_value(&parsed).unwrap();
        assert_eq!(written["priority"], json!("high"));
        assert_eq!(written["room"], json!("204"));
    }

    #[test]
    fn add_task_rejects_blank_title() {
        let (store, tasks) = fixture();
        let err = tasks.add_task(TaskDraft::new("   ")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(store.get_text(keys::TASKS), None);
    }

    #[test]
    fn add_task_fills_defaults_and_mirrors() {
        let (store, tasks) = fixture();
        let draft = TaskDraft {
            title: " Vacuum hall ".into(),
            dept: Some("floor-cleaning".into()),
            category: Some("Deep clean".into()),
            ..TaskDraft::default()
        };
        let task = tasks.add_task(draft).unwrap();

        assert_eq!(task.id, TaskId::Num(1));
        assert_eq!(task.title, "Vacuum hall");
        assert_eq!(task.dept.as_deref(), Some("Floor Cleaning"));
        assert_eq!(task.kind.as_deref(), Some("Deep clean"));
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.created_on.as_deref().is_some_and(|ts| ts.ends_with('Z')));

        assert_eq!(store.get_value(keys::TASKS), store.get_value(keys::LEGACY_TASKS));
        assert!(store.get_text(keys::TASKS_PULSE).is_some());
        assert!(store.get_text(keys::LEGACY_TASKS_PULSE).is_some());
    }

    #[test]
    fn start_only_from_pending() {
        let (_, tasks) = fixture();
        let task = tasks.add_task(TaskDraft::new("Fold sheets")).unwrap();
        assert!(tasks.start_task(&task.id));
        assert!(!tasks.start_task(&task.id));
        assert!(tasks.mark_completed(&task.id));
        assert!(!tasks.start_task(&task.id));
        assert_eq!(tasks.get(&task.id).unwrap().status, TaskStatus::Completed);
    }

    #[test]
    fn remove_unknown_is_noop() {
        let (store, tasks) = fixture();
        tasks.add_task(TaskDraft::new("Keep me")).unwrap();
        let pulse = store.get_text(keys::TASKS_PULSE);
        assert!(!tasks.remove_task(&TaskId::Num(99)));
        assert_eq!(store.get_text(keys::TASKS_PULSE), pulse);
        assert_eq!(tasks.read_all().len(), 1);
    }

    #[test]
    fn read_falls_back_to_legacy_when_canonical_missing() {
        let (store, tasks) = fixture();
        store.set(keys::LEGACY_TASKS, &json!({"tasks": [{"id": 5, "title": "old"}]}));
        assert_eq!(tasks.read_all().len(), 1);

        store.set(keys::TASKS, &json!({"tasks": []}));
        assert!(tasks.read_all().is_empty());
    }

    #[test]
    fn ensure_canonical_wraps_bare_arrays() {
        let (store, tasks) = fixture();
        store.set(keys::TASKS, &json!([{"id": 1, "title": "a"}]));
        assert!(tasks.ensure_canonical());
        assert_eq!(store.get_value(keys::TASKS).unwrap()["tasks"][0]["title"], json!("a"));
        assert!(!tasks.ensure_canonical());

        store.set(keys::TASKS, &json!({"tasks": "broken"}));
        assert!(tasks.ensure_canonical());
        assert_eq!(store.get_value(keys::TASKS), Some(json!({"tasks": []})));
    }
}
