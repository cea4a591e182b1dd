//! tl - append-only task graph library
//!
//! Issues and the dependencies between them are stored as an append-only
//! JSONL event log. Current state is always recomputed by replaying the
//! log, so concurrent writers only ever need to agree on append order.
//!
//! # Core Concepts
//!
//! - **Events**: immutable records (`create`, `update`, `close`, ...) in `.tl/events.jsonl`
//! - **Replay**: a pure fold of events into a [`graph::Graph`]
//! - **Mutations**: lock, replay, validate, append, unlock
//! - **Ready queue**: open issues with nothing blocking them
//!
//! # Module Organization
//!
//! - `model`: issue, status and dependency types, status transitions
//! - `event`: event records and payloads
//! - `log`: append-only JSONL event log
//! - `graph`: in-memory issue graph with adjacency indexes
//! - `replay`: event fold
//! - `store`: `.tl/` layout, discovery and locked mutation
//! - `ops`: validated mutation planners
//! - `deps`: cycle checks, blocked set, ready queue
//! - `hash`: content hashing for import dedup
//! - `import`: line-delimited issue import/export
//! - `stats`, `id`, `actor`, `config`, `lock`, `output`, `cli`

pub mod actor;
pub mod cli;
pub mod config;
pub mod deps;
pub mod error;
pub mod event;
pub mod graph;
pub mod hash;
pub mod id;
pub mod import;
pub mod lock;
pub mod log;
pub mod model;
pub mod ops;
pub mod output;
pub mod replay;
pub mod stats;
pub mod store;

pub use error::{Error, Result};
