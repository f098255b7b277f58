//! hk task command implementations.

use serde::Serialize;

use crate::cli::{load_context, GlobalOptions};
use crate::dept::TaskFilter;
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::task::{Task, TaskDraft, TaskId, TaskStatus, WriteReport};

pub struct AddOptions {
    pub title: String,
    pub assignee: Option<String>,
    pub dept: Option<String>,
    pub category: Option<String>,
    pub room: Option<String>,
    pub global: GlobalOptions,
}

pub struct ListOptions {
    pub status: Option<String>,
    pub assignee: Option<String>,
    pub search: Option<String>,
    pub global: GlobalOptions,
}

pub struct IdOptions {
    pub id: String,
    pub global: GlobalOptions,
}

#[derive(Serialize)]
struct TaskListOutput {
    total: usize,
    tasks: Vec<Task>,
}

#[derive(Serialize)]
struct TaskChangeOutput {
    id: String,
    changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    task: Option<Task>,
}

#[derive(Serialize)]
struct NormalizeOutput {
    rewritten: bool,
    total: usize,
}

/// One-line rendering used by task and department listings.
pub(crate) fn task_line(task: &Task) -> String {
    let mut line = format!("[{}] {} {}", task.status, task.id, task.title);
    let dept = task.department();
    if !dept.is_empty() {
        line.push_str(&format!(" ({dept})"));
    }
    if let Some(assignee) = task.assignee.as_deref() {
        line.push_str(&format!(" @{assignee}"));
    }
    if let Some(room) = task.room.as_deref() {
        line.push_str(&format!(" #{room}"));
    }
    if let Some(done_on) = task.done_on.as_deref() {
        line.push_str(&format!(" done {done_on}"));
    }
    line
}

fn push_write_warnings(human: &mut HumanOutput, report: WriteReport) {
    if !report.primary {
        human.push_warning("canonical task key not persisted");
    }
    if report.mirror == Some(false) {
        human.push_warning("legacy mirror not persisted");
    }
}

pub fn run_add(options: AddOptions) -> Result<()> {
    let ctx = load_context(&options.global)?;
    let tasks = ctx.tasks();
    let task = tasks.add_task(TaskDraft {
        title: options.title,
        assignee: options.assignee,
        dept: options.dept,
        kind: None,
        category: options.category,
        room: options.room,
    })?;

    let mut human = HumanOutput::new("Task added");
    human.push_summary("ID", task.id.to_string());
    human.push_summary("Title", task.title.clone());
    human.push_summary("Status", task.status.to_string());
    let dept = task.department();
    if !dept.is_empty() {
        human.push_summary("Department", dept);
    }
    if tasks.policy().mirror().is_some() {
        human.push_detail("mirrored to legacy task key");
    }
    human.push_next_step(format!("hk task complete {}", task.id));

    emit_success(options.global.output(), "task add", &task, Some(&human))
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let ctx = load_context(&options.global)?;
    let filter = TaskFilter {
        status: options
            .status
            .as_deref()
            .map(str::parse::<TaskStatus>)
            .transpose()?,
        assignee: options.assignee,
        type_label: None,
        search: options.search,
    };
    let tasks = filter.apply(ctx.tasks().read_all());

    let mut human = HumanOutput::new("Tasks");
    human.push_summary("Total", tasks.len().to_string());
    if let Some(status) = filter.status {
        human.push_summary("Status", status.to_string());
    }
    for task in &tasks {
        human.push_detail(task_line(task));
    }

    let output = TaskListOutput {
        total: tasks.len(),
        tasks,
    };
    emit_success(options.global.output(), "task list", &output, Some(&human))
}

pub fn run_start(options: IdOptions) -> Result<()> {
    let ctx = load_context(&options.global)?;
    let id: TaskId = options.id.parse()?;
    let tasks = ctx.tasks();
    let Some(before) = tasks.get(&id) else {
        return Err(Error::not_found("task", id.to_string()));
    };

    let changed = tasks.start_task(&id);
    let mut human = HumanOutput::new(if changed {
        "Task started"
    } else {
        "Task unchanged"
    });
    human.push_summary("ID", id.to_string());
    if !changed {
        human.push_warning(format!(
            "only Pending tasks can be started (status: {})",
            before.status
        ));
    }

    let output = TaskChangeOutput {
        id: id.to_string(),
        changed,
        task: tasks.get(&id),
    };
    emit_success(options.global.output(), "task start", &output, Some(&human))
}

pub fn run_complete(options: IdOptions) -> Result<()> {
    let ctx = load_context(&options.global)?;
    let id: TaskId = options.id.parse()?;
    let tasks = ctx.tasks();
    if tasks.get(&id).is_none() {
        return Err(Error::not_found("task", id.to_string()));
    }

    let changed = tasks.mark_completed(&id);
    let task = tasks.get(&id);
    let mut human = HumanOutput::new(if changed {
        "Task completed"
    } else {
        "Task already completed"
    });
    human.push_summary("ID", id.to_string());
    if let Some(done_on) = task.as_ref().and_then(|task| task.done_on.clone()) {
        human.push_summary("Done on", done_on);
    }

    let output = TaskChangeOutput {
        id: id.to_string(),
        changed,
        task,
    };
    emit_success(options.global.output(), "task complete", &output, Some(&human))
}

pub fn run_rm(options: IdOptions) -> Result<()> {
    let ctx = load_context(&options.global)?;
    let id: TaskId = options.id.parse()?;
    let removed = ctx.tasks().remove_task(&id);

    let mut human = HumanOutput::new(if removed {
        "Task removed"
    } else {
        "Nothing to remove"
    });
    human.push_summary("ID", id.to_string());

    let output = TaskChangeOutput {
        id: id.to_string(),
        changed: removed,
        task: None,
    };
    emit_success(options.global.output(), "task rm", &output, Some(&human))
}

pub fn run_normalize(global: GlobalOptions) -> Result<()> {
    let ctx = load_context(&global)?;
    let tasks = ctx.tasks();
    let rewritten = tasks.ensure_canonical();
    let total = tasks.read_all().len();

    let mut human = HumanOutput::new(if rewritten {
        "Task store rewritten"
    } else {
        "Task store already canonical"
    });
    human.push_summary("Tasks", total.to_string());

    // Republish so open dashboards pick up the new shape.
    if rewritten {
        let report = tasks.write_all(&tasks.read_all());
        push_write_warnings(&mut human, report);
    }

    let output = NormalizeOutput { rewritten, total };
    emit_success(global.output(), "task normalize", &output, Some(&human))
}
