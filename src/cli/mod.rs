//! Command-line interface for hk
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command family is implemented in its own submodule.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::context::SyncContext;
use crate::error::Result;
use crate::output::OutputOptions;

mod admin;
mod dept;
mod resource;
mod room;
mod staff;
mod summary;
mod task;
mod watch;

/// hk - housekeeping shared state
///
/// Inspect and edit the shared store behind the housekeeping dashboards:
/// tasks, staff, rooms and supply requests. Every change is pulsed so other
/// open dashboards re-read it.
#[derive(Parser, Debug)]
#[command(name = "hk")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Store directory (defaults to .hk.toml store.dir, then the user data dir)
    #[arg(long, global = true, env = "HK_STORE")]
    pub store: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Task collection (canonical key, mirrored to the legacy key)
    #[command(subcommand)]
    Task(TaskCommands),

    /// Staff roster
    #[command(subcommand)]
    Staff(StaffCommands),

    /// Rooms and the occupancy aggregate
    #[command(subcommand)]
    Room(RoomCommands),

    /// Supply requests
    #[command(subcommand)]
    Resource(ResourceCommands),

    /// Merged department view (canonical + legacy tasks, staff, resources)
    Dept {
        /// Department label (any case, e.g. "floor cleaning")
        name: String,

        /// Only tasks with this status
        #[arg(long)]
        status: Option<String>,

        /// Only tasks assigned to this person (exact match)
        #[arg(long)]
        assignee: Option<String>,

        /// Only tasks with this category/type label
        #[arg(long = "type")]
        type_label: Option<String>,

        /// Substring search over title, assignee, room and type
        #[arg(long)]
        search: Option<String>,
    },

    /// Dashboard counts and staff workload
    Summary {
        /// Hide a name from the workload chart
        #[arg(long)]
        hide: Option<String>,
    },

    /// Print change notices from other contexts as they arrive
    Watch {
        /// Channels to watch (tasks, legacy_tasks, staff, rooms, resources, settings)
        #[arg(long = "channel")]
        channels: Vec<String>,

        /// Exit after this many notices
        #[arg(long)]
        count: Option<usize>,

        /// Exit after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Load sample or external state, or add demo data for one department
    Seed {
        /// Add one demo task and one demo resource for this department
        #[arg(long, conflicts_with = "from")]
        dept: Option<String>,

        /// Read `{staff, rooms, tasks, activity}` from a JSON file
        #[arg(long)]
        from: Option<PathBuf>,
    },

    /// Clear stored data: tasks, staff or all
    Reset {
        /// Scope to clear
        scope: String,
    },

    /// List stored keys
    Keys {
        /// Glob pattern to filter keys (e.g. "hk_*")
        pattern: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Add a task
    Add {
        /// Task title
        title: String,

        /// Assignee name
        #[arg(long)]
        assignee: Option<String>,

        /// Department
        #[arg(long)]
        dept: Option<String>,

        /// Category (also written as the type label)
        #[arg(long)]
        category: Option<String>,

        /// Room number or location
        #[arg(long)]
        room: Option<String>,
    },

    /// List tasks from the canonical key
    List {
        /// Only tasks with this status
        #[arg(long)]
        status: Option<String>,

        /// Only tasks assigned to this person (exact match)
        #[arg(long)]
        assignee: Option<String>,

        /// Substring search over title, assignee, room and type
        #[arg(long)]
        search: Option<String>,
    },

    /// Move a pending task to In Progress
    Start {
        /// Task id
        id: String,
    },

    /// Mark a task completed
    Complete {
        /// Task id
        id: String,
    },

    /// Remove a task
    Rm {
        /// Task id
        id: String,
    },

    /// Rewrite the canonical task key as `{ tasks: [...] }`
    Normalize,
}

#[derive(Subcommand, Debug)]
pub enum StaffCommands {
    /// Add a roster member
    Add {
        /// Name (unique, case-insensitive)
        name: String,

        /// Role
        #[arg(long)]
        role: Option<String>,

        /// Department
        #[arg(long)]
        dept: Option<String>,

        /// Stored base assignment count
        #[arg(long, default_value_t = 0)]
        assigned: u32,
    },

    /// List the roster with live assignment counts
    List {
        /// Only members of this department
        #[arg(long)]
        dept: Option<String>,
    },

    /// Remove a member by id or name
    Rm {
        /// Staff id or name
        target: String,
    },

    /// Set a member Active or Inactive
    Status {
        /// Staff id or name
        target: String,

        /// Active or Inactive
        status: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum RoomCommands {
    /// Add or update a room by number
    Set {
        /// Room number
        number: String,

        /// Vacant, Occupied, Needs (other labels are stored as given)
        #[arg(long)]
        status: String,

        /// Occupant name (required for Occupied)
        #[arg(long)]
        occupant: Option<String>,
    },

    /// List rooms and the cached aggregate
    List,

    /// Remove a room by id or number
    Rm {
        /// Room id or number
        target: String,
    },

    /// Remove every room
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum ResourceCommands {
    /// Request a supply item
    Add {
        /// Item name
        item: String,

        /// Requested by / for
        #[arg(long)]
        assignee: Option<String>,

        /// Department
        #[arg(long)]
        dept: Option<String>,

        /// Quantity
        #[arg(long)]
        quantity: Option<u32>,

        /// Unit (defaults to pcs)
        #[arg(long)]
        unit: Option<String>,

        /// Date needed (YYYY-MM-DD)
        #[arg(long)]
        needed_on: Option<String>,

        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// List supply requests
    List {
        /// Only requests for this department
        #[arg(long)]
        dept: Option<String>,
    },

    /// Advance a request: Requested -> Approved -> Issued
    Advance {
        /// Resource id
        id: String,
    },

    /// Remove a request
    Rm {
        /// Resource id
        id: String,
    },
}

/// Flags shared by every command.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub store: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

impl GlobalOptions {
    pub fn output(&self) -> OutputOptions {
        OutputOptions {
            json: self.json,
            quiet: self.quiet,
        }
    }
}

/// Open the store selected by `--store`, `HK_STORE` or `.hk.toml`.
pub(crate) fn load_context(global: &GlobalOptions) -> Result<SyncContext> {
    let cwd = std::env::current_dir()?;
    let config = Config::load_from_dir(&cwd)?;
    let dir = config.store_dir(global.store.as_deref())?;
    tracing::debug!(store = %dir.display(), "opening store");
    SyncContext::open_dir(&dir, &config)
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let global = GlobalOptions {
            store: self.store,
            json: self.json,
            quiet: self.quiet,
        };

        match self.command {
            Commands::Task(cmd) => match cmd {
                TaskCommands::Add {
                    title,
                    assignee,
                    dept,
                    category,
                    room,
                } => task::run_add(task::AddOptions {
                    title,
                    assignee,
                    dept,
                    category,
                    room,
                    global,
                }),
                TaskCommands::List {
                    status,
                    assignee,
                    search,
                } => task::run_list(task::ListOptions {
                    status,
                    assignee,
                    search,
                    global,
                }),
                TaskCommands::Start { id } => task::run_start(task::IdOptions { id, global }),
                TaskCommands::Complete { id } => {
                    task::run_complete(task::IdOptions { id, global })
                }
                TaskCommands::Rm { id } => task::run_rm(task::IdOptions { id, global }),
                TaskCommands::Normalize => task::run_normalize(global),
            },
            Commands::Staff(cmd) => match cmd {
                StaffCommands::Add {
                    name,
                    role,
                    dept,
                    assigned,
                } => staff::run_add(staff::AddOptions {
                    name,
                    role,
                    dept,
                    assigned,
                    global,
                }),
                StaffCommands::List { dept } => staff::run_list(staff::ListOptions { dept, global }),
                StaffCommands::Rm { target } => staff::run_rm(staff::RmOptions { target, global }),
                StaffCommands::Status { target, status } => {
                    staff::run_status(staff::StatusOptions {
                        target,
                        status,
                        global,
                    })
                }
            },
            Commands::Room(cmd) => match cmd {
                RoomCommands::Set {
                    number,
                    status,
                    occupant,
                } => room::run_set(room::SetOptions {
                    number,
                    status,
                    occupant,
                    global,
                }),
                RoomCommands::List => room::run_list(global),
                RoomCommands::Rm { target } => room::run_rm(room::RmOptions { target, global }),
                RoomCommands::Clear => room::run_clear(global),
            },
            Commands::Resource(cmd) => match cmd {
                ResourceCommands::Add {
                    item,
                    assignee,
                    dept,
                    quantity,
                    unit,
                    needed_on,
                    notes,
                } => resource::run_add(resource::AddOptions {
                    item,
                    assignee,
                    dept,
                    quantity,
                    unit,
                    needed_on,
                    notes,
                    global,
                }),
                ResourceCommands::List { dept } => {
                    resource::run_list(resource::ListOptions { dept, global })
                }
                ResourceCommands::Advance { id } => {
                    resource::run_advance(resource::IdOptions { id, global })
                }
                ResourceCommands::Rm { id } => resource::run_rm(resource::IdOptions { id, global }),
            },
            Commands::Dept {
                name,
                status,
                assignee,
                type_label,
                search,
            } => dept::run(dept::DeptOptions {
                name,
                status,
                assignee,
                type_label,
                search,
                global,
            }),
            Commands::Summary { hide } => summary::run(summary::SummaryOptions { hide, global }),
            Commands::Watch {
                channels,
                count,
                timeout_ms,
            } => watch::run(watch::WatchOptions {
                channels,
                count,
                timeout_ms,
                global,
            }),
            Commands::Seed { dept, from } => admin::run_seed(admin::SeedOptions { dept, from, global }),
            Commands::Reset { scope } => admin::run_reset(admin::ResetOptions { scope, global }),
            Commands::Keys { pattern } => admin::run_keys(admin::KeysOptions { pattern, global }),
        }
    }
}
