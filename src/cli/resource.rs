//! hk resource command implementations.

use serde::Serialize;

use crate::cli::{load_context, GlobalOptions};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::resource::{Resource, ResourceDraft, ResourceId, ResourceStatus};

pub struct AddOptions {
    pub item: String,
    pub assignee: Option<String>,
    pub dept: Option<String>,
    pub quantity: Option<u32>,
    pub unit: Option<String>,
    pub needed_on: Option<String>,
    pub notes: Option<String>,
    pub global: GlobalOptions,
}

pub struct ListOptions {
    pub dept: Option<String>,
    pub global: GlobalOptions,
}

pub struct IdOptions {
    pub id: String,
    pub global: GlobalOptions,
}

#[derive(Serialize)]
struct ResourceListOutput {
    total: usize,
    resources: Vec<Resource>,
}

#[derive(Serialize)]
struct AdvanceOutput {
    id: String,
    status: ResourceStatus,
    changed: bool,
}

#[derive(Serialize)]
struct RemoveOutput {
    id: String,
}

pub(crate) fn resource_line(resource: &Resource) -> String {
    format!(
        "[{}] {} {} x{} {} ({})",
        resource.status,
        resource.id,
        resource.item,
        resource.quantity,
        resource.unit,
        resource.department()
    )
}

pub fn run_add(options: AddOptions) -> Result<()> {
    let ctx = load_context(&options.global)?;
    let resource = ctx.resources().add(ResourceDraft {
        item: options.item,
        assignee: options.assignee,
        dept: options.dept,
        quantity: options.quantity,
        unit: options.unit,
        needed_on: options.needed_on,
        notes: options.notes,
    })?;

    let mut human = HumanOutput::new("Resource requested");
    human.push_summary("ID", resource.id.to_string());
    human.push_summary("Item", resource.item.clone());
    human.push_summary("Quantity", format!("{} {}", resource.quantity, resource.unit));
    human.push_summary("Department", resource.department());
    human.push_next_step(format!("hk resource advance {}", resource.id));

    emit_success(options.global.output(), "resource add", &resource, Some(&human))
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let ctx = load_context(&options.global)?;
    let resources = match options.dept.as_deref() {
        Some(dept) => ctx.departments().resources_for_department(dept),
        None => ctx.resources().read_all(),
    };

    let mut human = HumanOutput::new("Resources");
    human.push_summary("Total", resources.len().to_string());
    for resource in &resources {
        human.push_detail(resource_line(resource));
    }

    let output = ResourceListOutput {
        total: resources.len(),
        resources,
    };
    emit_success(options.global.output(), "resource list", &output, Some(&human))
}

pub fn run_advance(options: IdOptions) -> Result<()> {
    let ctx = load_context(&options.global)?;
    let id: ResourceId = options.id.parse()?;
    let store = ctx.resources();
    let before = store
        .read_all()
        .into_iter()
        .find(|resource| resource.id == id)
        .map(|resource| resource.status);
    let status = store
        .advance(&id)
        .ok_or_else(|| Error::not_found("resource", id.to_string()))?;
    let changed = before != Some(status);

    let mut human = HumanOutput::new(if changed {
        "Resource advanced"
    } else {
        "Resource already issued"
    });
    human.push_summary("ID", id.to_string());
    human.push_summary("Status", status.to_string());

    let output = AdvanceOutput {
        id: id.to_string(),
        status,
        changed,
    };
    emit_success(options.global.output(), "resource advance", &output, Some(&human))
}

pub fn run_rm(options: IdOptions) -> Result<()> {
    let ctx = load_context(&options.global)?;
    let id: ResourceId = options.id.parse()?;
    if !ctx.resources().remove(&id) {
        return Err(Error::not_found("resource", id.to_string()));
    }

    let mut human = HumanOutput::new("Resource removed");
    human.push_summary("ID", id.to_string());

    let output = RemoveOutput { id: id.to_string() };
    emit_success(options.global.output(), "resource rm", &output, Some(&human))
}
