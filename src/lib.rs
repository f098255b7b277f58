//! hkstate - shared state for the housekeeping dashboards
//!
//! This library keeps several independently opened dashboard contexts
//! consistent over one persistent key-value store.
//!
//! # Core Concepts
//!
//! - **Keyed store**: JSON values under string keys; reads fall back to
//!   defaults and writes never raise
//! - **Change bus**: per-channel pulse keys, local dispatch and cross-context
//!   notification through the backend's change feed
//! - **Tasks**: canonical task collection mirrored to a legacy key
//! - **Department view**: canonical and legacy tasks merged and filtered by
//!   normalized department
//!
//! # Module Organization
//!
//! - `storage`: backends (in-memory areas, one-file-per-key directories) and `KeyedStore`
//! - `keys`: storage keys and change channels
//! - `bus`: pulses, subscriptions and remote delivery
//! - `normalize`: department labels and lenient collection parsing
//! - `task`, `staff`, `room`, `resource`: the shared collections
//! - `dept`: merged per-department view and task filters
//! - `dashboard`: summary counters and the workload chart
//! - `settings`: profile, preferences, broadcasts and reset
//! - `source`: sample and file data sources, seeding
//! - `context`: one participant wired to a store
//! - `config`: configuration loading from `.hk.toml`
//! - `cli`: command-line interface using clap

pub mod bus;
pub mod cli;
pub mod config;
pub mod context;
pub mod dashboard;
pub mod dept;
pub mod error;
pub mod keys;
pub mod normalize;
pub mod output;
pub mod resource;
pub mod room;
pub mod settings;
pub mod source;
pub mod staff;
pub mod storage;
pub mod task;

pub use context::SyncContext;
pub use error::{Error, Result};
