//! hk dept: the merged per-department page.

use crate::cli::resource::resource_line;
use crate::cli::task::task_line;
use crate::cli::{load_context, GlobalOptions};
use crate::dept::TaskFilter;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::task::TaskStatus;

pub struct DeptOptions {
    pub name: String,
    pub status: Option<String>,
    pub assignee: Option<String>,
    pub type_label: Option<String>,
    pub search: Option<String>,
    pub global: GlobalOptions,
}

pub fn run(options: DeptOptions) -> Result<()> {
    let ctx = load_context(&options.global)?;
    let filter = TaskFilter {
        status: options
            .status
            .as_deref()
            .map(str::parse::<TaskStatus>)
            .transpose()?,
        assignee: options.assignee,
        type_label: options.type_label,
        search: options.search,
    };
    let snapshot = ctx.departments().snapshot(&options.name, &filter);

    let mut human = HumanOutput::new(snapshot.department.clone());
    human.push_summary("Tasks", snapshot.tasks.len().to_string());
    human.push_summary("Staff", snapshot.staff.len().to_string());
    human.push_summary("Resources", snapshot.resources.len().to_string());
    for task in &snapshot.tasks {
        human.push_detail(task_line(task));
    }
    for member in &snapshot.staff {
        human.push_detail(format!("staff: {} ({})", member.name, member.role));
    }
    for resource in &snapshot.resources {
        human.push_detail(format!("resource: {}", resource_line(resource)));
    }
    if snapshot.tasks.is_empty() && snapshot.staff.is_empty() && filter.is_empty() {
        human.push_next_step(format!("hk seed --dept \"{}\"", snapshot.department));
    }

    emit_success(options.global.output(), "dept", &snapshot, Some(&human))
}
