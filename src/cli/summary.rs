//! hk summary: dashboard counters and the staff workload chart.

use serde::Serialize;

use crate::cli::{load_context, GlobalOptions};
use crate::dashboard::{Summary, WorkloadBar};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};

pub struct SummaryOptions {
    pub hide: Option<String>,
    pub global: GlobalOptions,
}

#[derive(Serialize)]
struct SummaryOutput {
    summary: Summary,
    workload: Vec<WorkloadBar>,
    hidden: Vec<String>,
}

pub fn run(options: SummaryOptions) -> Result<()> {
    let ctx = load_context(&options.global)?;
    let dashboard = ctx.dashboard();

    let mut human = HumanOutput::new("Housekeeping summary");
    if let Some(name) = options.hide.as_deref() {
        if !dashboard.hide_staff_bar(name) {
            human.push_warning(format!("{name} is already hidden"));
        }
    }

    let summary = dashboard.summary();
    let workload = dashboard.staff_workload();
    let hidden = dashboard.hidden_bars();

    human.push_summary("Staff", summary.staff.to_string());
    human.push_summary("Rooms", summary.rooms.to_string());
    human.push_summary("Completed", summary.completed.to_string());
    human.push_summary("Pending", summary.pending.to_string());
    human.push_summary(
        "Occupancy",
        format!(
            "{} occupied, {} vacant, {} needs attention",
            summary.occupancy.occupied, summary.occupancy.vacant, summary.occupancy.needs
        ),
    );
    for bar in &workload {
        human.push_detail(format!("{:<20} {}", bar.name, "#".repeat(bar.tasks as usize)));
    }
    if !hidden.is_empty() {
        human.push_summary("Hidden", hidden.join(", "));
    }

    let output = SummaryOutput {
        summary,
        workload,
        hidden,
    };
    emit_success(options.global.output(), "summary", &output, Some(&human))
}
