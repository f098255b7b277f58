//! hk staff command implementations.

use serde::Serialize;

use crate::cli::{load_context, GlobalOptions};
use crate::error::{Error, Result};
use crate::normalize::normalize_dept;
use crate::output::{emit_success, HumanOutput};
use crate::staff::{StaffDraft, StaffStatus, StaffWorkload};

pub struct AddOptions {
    pub name: String,
    pub role: Option<String>,
    pub dept: Option<String>,
    pub assigned: u32,
    pub global: GlobalOptions,
}

pub struct ListOptions {
    pub dept: Option<String>,
    pub global: GlobalOptions,
}

pub struct RmOptions {
    pub target: String,
    pub global: GlobalOptions,
}

pub struct StatusOptions {
    pub target: String,
    pub status: String,
    pub global: GlobalOptions,
}

#[derive(Serialize)]
struct StaffListOutput {
    total: usize,
    staff: Vec<StaffWorkload>,
}

#[derive(Serialize)]
struct StaffChangeOutput {
    id: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<StaffStatus>,
}

pub fn run_add(options: AddOptions) -> Result<()> {
    let ctx = load_context(&options.global)?;
    let member = ctx.staff().add(StaffDraft {
        name: options.name,
        role: options.role,
        dept: options.dept,
        status: None,
        assigned: options.assigned,
    })?;

    let mut human = HumanOutput::new("Staff member added");
    human.push_summary("ID", member.id.clone());
    human.push_summary("Name", member.name.clone());
    human.push_summary("Role", member.role.clone());
    human.push_summary("Department", member.dept.clone());

    emit_success(options.global.output(), "staff add", &member, Some(&human))
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let ctx = load_context(&options.global)?;
    let tasks = ctx.tasks().read_all();
    let wanted = options.dept.as_deref().map(normalize_dept);
    let staff: Vec<StaffWorkload> = ctx
        .staff()
        .with_live_counts(&tasks)
        .into_iter()
        .filter(|entry| {
            wanted
                .as_deref()
                .map_or(true, |dept| normalize_dept(&entry.staff.dept) == dept)
        })
        .collect();

    let mut human = HumanOutput::new("Staff");
    human.push_summary("Total", staff.len().to_string());
    if let Some(dept) = &wanted {
        human.push_summary("Department", dept.clone());
    }
    for entry in &staff {
        human.push_detail(format!(
            "{} [{}] {} / {} assigned {}",
            entry.staff.name,
            entry.staff.status,
            entry.staff.role,
            entry.staff.dept,
            entry.live_assigned
        ));
    }

    let output = StaffListOutput {
        total: staff.len(),
        staff,
    };
    emit_success(options.global.output(), "staff list", &output, Some(&human))
}

pub fn run_rm(options: RmOptions) -> Result<()> {
    let ctx = load_context(&options.global)?;
    let roster = ctx.staff();
    let member = roster
        .find(&options.target)
        .ok_or_else(|| Error::not_found("staff", options.target.clone()))?;
    roster.remove(&member.id);

    let mut human = HumanOutput::new("Staff member removed");
    human.push_summary("Name", member.name.clone());

    let output = StaffChangeOutput {
        id: member.id,
        name: member.name,
        status: None,
    };
    emit_success(options.global.output(), "staff rm", &output, Some(&human))
}

pub fn run_status(options: StatusOptions) -> Result<()> {
    let ctx = load_context(&options.global)?;
    let status: StaffStatus = options.status.parse()?;
    let roster = ctx.staff();
    let member = roster
        .find(&options.target)
        .ok_or_else(|| Error::not_found("staff", options.target.clone()))?;
    roster.set_status(&member.id, status);

    let mut human = HumanOutput::new("Staff status updated");
    human.push_summary("Name", member.name.clone());
    human.push_summary("Status", status.to_string());

    let output = StaffChangeOutput {
        id: member.id,
        name: member.name,
        status: Some(status),
    };
    emit_success(options.global.output(), "staff status", &output, Some(&human))
}
