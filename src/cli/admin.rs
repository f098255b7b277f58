//! hk seed, reset and keys.

use std::path::PathBuf;

use serde::Serialize;

use crate::cli::{load_context, GlobalOptions};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::resource::Resource;
use crate::settings::ResetScope;
use crate::source::{load_state, seed, seed_department, DataSource, FileSource, SampleSource};
use crate::task::Task;

pub struct SeedOptions {
    pub dept: Option<String>,
    pub from: Option<PathBuf>,
    pub global: GlobalOptions,
}

pub struct ResetOptions {
    pub scope: String,
    pub global: GlobalOptions,
}

pub struct KeysOptions {
    pub pattern: Option<String>,
    pub global: GlobalOptions,
}

#[derive(Serialize)]
struct DemoOutput {
    task: Task,
    resource: Resource,
}

#[derive(Serialize)]
struct KeysOutput {
    total: usize,
    keys: Vec<String>,
}

pub fn run_seed(options: SeedOptions) -> Result<()> {
    let ctx = load_context(&options.global)?;

    if let Some(dept) = options.dept.as_deref() {
        let (task, resource) = seed_department(&ctx, dept)?;
        let mut human = HumanOutput::new("Demo data added");
        human.push_summary("Task", format!("{} {}", task.id, task.title));
        human.push_summary("Resource", format!("{} {}", resource.id, resource.item));
        human.push_next_step(format!("hk dept \"{}\"", task.department()));

        let output = DemoOutput { task, resource };
        return emit_success(options.global.output(), "seed", &output, Some(&human));
    }

    let from_file = options.from.is_some();
    let state = match options.from {
        Some(path) => load_state(&FileSource::new(path))?,
        None => load_state(&SampleSource)?,
    };
    let report = seed(&ctx, &state);

    let mut human = HumanOutput::new("Store seeded");
    human.push_summary("Source", report.source.clone());
    human.push_summary("Staff", report.staff.to_string());
    human.push_summary("Rooms", report.rooms.to_string());
    human.push_summary("Tasks", report.tasks.to_string());
    if from_file && report.source == SampleSource.name() {
        human.push_warning("source unreadable, loaded sample data instead");
    }
    human.push_next_step("hk summary");

    emit_success(options.global.output(), "seed", &report, Some(&human))
}

pub fn run_reset(options: ResetOptions) -> Result<()> {
    let scope: ResetScope = options.scope.parse()?;
    let ctx = load_context(&options.global)?;
    let report = ctx.settings().reset(scope);

    let mut human = HumanOutput::new(format!("Reset {scope}"));
    human.push_summary("Removed", report.removed.len().to_string());
    for key in &report.removed {
        human.push_detail(key.clone());
    }

    emit_success(options.global.output(), "reset", &report, Some(&human))
}

pub fn run_keys(options: KeysOptions) -> Result<()> {
    let pattern = options
        .pattern
        .as_deref()
        .map(glob::Pattern::new)
        .transpose()
        .map_err(|err| Error::InvalidArgument(format!("invalid key pattern: {err}")))?;
    let ctx = load_context(&options.global)?;

    let mut keys: Vec<String> = ctx
        .store()
        .keys()
        .into_iter()
        .filter(|key| pattern.as_ref().map_or(true, |pattern| pattern.matches(key)))
        .collect();
    keys.sort();

    let mut human = HumanOutput::new("Keys");
    human.push_summary("Total", keys.len().to_string());
    for key in &keys {
        human.push_detail(key.clone());
    }

    let output = KeysOutput {
        total: keys.len(),
        keys,
    };
    emit_success(options.global.output(), "keys", &output, Some(&human))
}
