//! hk room command implementations.

use serde::Serialize;

use crate::cli::{load_context, GlobalOptions};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::room::{Room, RoomAggregate, RoomDraft, RoomStatus};

pub struct SetOptions {
    pub number: String,
    pub status: String,
    pub occupant: Option<String>,
    pub global: GlobalOptions,
}

pub struct RmOptions {
    pub target: String,
    pub global: GlobalOptions,
}

#[derive(Serialize)]
struct RoomListOutput {
    total: usize,
    aggregate: RoomAggregate,
    rooms: Vec<Room>,
}

#[derive(Serialize)]
struct RoomChangeOutput {
    removed: usize,
    aggregate: RoomAggregate,
}

fn push_aggregate(human: &mut HumanOutput, aggregate: RoomAggregate) {
    human.push_summary(
        "Occupancy",
        format!(
            "{} occupied, {} vacant, {} needs attention",
            aggregate.occupied, aggregate.vacant, aggregate.needs
        ),
    );
}

pub fn run_set(options: SetOptions) -> Result<()> {
    let ctx = load_context(&options.global)?;
    let status: RoomStatus = options.status.parse()?;
    let rooms = ctx.rooms();
    let room = rooms.upsert(RoomDraft {
        number: options.number,
        status,
        occupant: options.occupant,
    })?;

    let mut human = HumanOutput::new("Room saved");
    human.push_summary("Number", room.number().to_string());
    human.push_summary("Status", room.status.to_string());
    if let Some(occupant) = room.occupant.as_deref() {
        human.push_summary("Occupant", occupant);
    }
    push_aggregate(&mut human, rooms.read_aggregate());

    emit_success(options.global.output(), "room set", &room, Some(&human))
}

pub fn run_list(global: GlobalOptions) -> Result<()> {
    let ctx = load_context(&global)?;
    let store = ctx.rooms();
    let mut rooms = store.read_all();
    rooms.sort_by(|a, b| a.number().cmp(b.number()));
    let aggregate = store.read_aggregate();

    let mut human = HumanOutput::new("Rooms");
    human.push_summary("Total", rooms.len().to_string());
    push_aggregate(&mut human, aggregate);
    for room in &rooms {
        let occupant = room.occupant.as_deref().unwrap_or("-");
        human.push_detail(format!("{} [{}] {}", room.number(), room.status, occupant));
    }

    let output = RoomListOutput {
        total: rooms.len(),
        aggregate,
        rooms,
    };
    emit_success(global.output(), "room list", &output, Some(&human))
}

pub fn run_rm(options: RmOptions) -> Result<()> {
    let ctx = load_context(&options.global)?;
    let rooms = ctx.rooms();
    if !rooms.remove(&options.target) {
        return Err(Error::not_found("room", options.target));
    }

    let aggregate = rooms.read_aggregate();
    let mut human = HumanOutput::new("Room removed");
    human.push_summary("Room", options.target);
    push_aggregate(&mut human, aggregate);

    let output = RoomChangeOutput {
        removed: 1,
        aggregate,
    };
    emit_success(options.global.output(), "room rm", &output, Some(&human))
}

pub fn run_clear(global: GlobalOptions) -> Result<()> {
    let ctx = load_context(&global)?;
    let rooms = ctx.rooms();
    let removed = rooms.clear();

    let mut human = HumanOutput::new("Rooms cleared");
    human.push_summary("Removed", removed.to_string());

    let output = RoomChangeOutput {
        removed,
        aggregate: rooms.read_aggregate(),
    };
    emit_success(global.output(), "room clear", &output, Some(&human))
}
