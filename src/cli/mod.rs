//! Command-line interface for tl
//!
//! This module defines the CLI structure using clap derive macros.
//! Command implementations live in the submodules.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::actor::resolve_actor;
use crate::error::Result;
use crate::event::EventStamp;
use crate::output::OutputOptions;
use crate::store::Store;

mod graph;
mod init;
mod issue;
mod transfer;

/// tl - append-only task graph
///
/// Tracks issues and their dependencies as an event log under `.tl/`, safe
/// for many agents writing at once.
#[derive(Parser, Debug)]
#[command(name = "tl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Store location: a `.tl` directory or any directory below the project root
    #[arg(long, global = true, env = "TL_DIR")]
    pub dir: Option<PathBuf>,

    /// Actor identity recorded on events
    #[arg(long, global = true, env = "TL_ACTOR")]
    pub actor: Option<String>,

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
    /// Create a .tl store in the current (or --dir) directory
    Init,

    /// Create an issue
    Create {
        /// Issue title
        title: String,

        #[arg(short, long)]
        description: Option<String>,

        /// Priority (0 = critical .. 4 = backlog)
        #[arg(short, long, default_value_t = crate::model::DEFAULT_PRIORITY)]
        priority: i32,

        /// Issue type: task, bug, feature, epic, chore, decision, or custom
        #[arg(short = 't', long = "type", default_value = "task")]
        issue_type: String,

        /// Labels (repeatable)
        #[arg(short, long = "label")]
        labels: Vec<String>,

        #[arg(long)]
        assignee: Option<String>,

        #[arg(long)]
        design: Option<String>,

        #[arg(long)]
        acceptance: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        /// Hide from `ready` until this RFC 3339 time
        #[arg(long)]
        defer_until: Option<String>,
    },

    /// List issues
    List {
        #[arg(long)]
        status: Option<String>,

        #[arg(short = 't', long = "type")]
        issue_type: Option<String>,

        #[arg(long)]
        assignee: Option<String>,

        #[arg(short, long)]
        priority: Option<i32>,

        #[arg(long)]
        label: Option<String>,

        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Show one issue with its dependencies and dependents
    Show {
        /// Issue id (full id, suffix, or unique suffix prefix)
        id: String,
    },

    /// Change issue fields
    Update {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        status: Option<String>,

        #[arg(short, long)]
        priority: Option<i32>,

        #[arg(long)]
        assignee: Option<String>,

        #[arg(short = 't', long = "type")]
        issue_type: Option<String>,

        /// Replace labels (repeatable)
        #[arg(short, long = "label")]
        labels: Vec<String>,

        /// Extra field as key=value; the value is parsed as JSON when possible
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },

    /// Close an issue
    Close {
        id: String,

        #[arg(long)]
        reason: Option<String>,
    },

    /// Reopen a closed or deferred issue
    Reopen { id: String },

    /// Claim an open issue (sets in_progress and assignee)
    Claim {
        id: String,

        /// Agent name (defaults to the resolved actor)
        #[arg(long)]
        agent: Option<String>,
    },

    /// Open issues with nothing blocking them, most urgent first
    Ready {
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Blocked issues and what blocks them
    Blocked,

    /// Issue counts by status
    Stats,

    /// Dependency management
    #[command(subcommand)]
    Dep(DepCommands),

    /// Merge issues from a line-delimited JSON file
    Import {
        #[arg(long, default_value = ".beads/issues.jsonl")]
        from: PathBuf,
    },

    /// Write all issues as line-delimited JSON
    Export {
        #[arg(long, default_value = ".beads/issues.jsonl")]
        to: PathBuf,
    },

    /// Export issues and stage the file in git
    Sync {
        #[arg(long, default_value = ".beads/issues.jsonl")]
        to: PathBuf,
    },
}

/// Dependency subcommands
#[derive(Subcommand, Debug)]
pub enum DepCommands {
    /// Record that ISSUE depends on DEPENDS_ON
    Add {
        issue: String,
        depends_on: String,

        /// blocks, parent-child, conditional-blocks, waits-for, related, discovered-from
        #[arg(short = 't', long = "type", default_value = "blocks")]
        dep_type: String,
    },

    /// Remove a dependency edge
    Remove { issue: String, depends_on: String },
}

/// Global flags shared by every command
#[derive(Debug, Clone)]
pub(crate) struct Globals {
    pub dir: Option<PathBuf>,
    pub actor: Option<String>,
    pub output: OutputOptions,
}

impl Globals {
    pub fn store(&self) -> Result<Store> {
        let start = match &self.dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        Store::resolve(&start)
    }

    pub fn actor(&self, store: &Store) -> String {
        resolve_actor(self.actor.as_deref(), store.config())
    }

    pub fn stamp(&self, store: &Store) -> EventStamp {
        EventStamp::now(self.actor(store))
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let globals = Globals {
            dir: self.dir,
            actor: self.actor,
            output: OutputOptions {
                json: self.json,
                quiet: self.quiet,
            },
        };

        match self.command {
            Commands::Init => init::run(&globals),
            Commands::Create {
                title,
                description,
                priority,
                issue_type,
                labels,
                assignee,
                design,
                acceptance,
                notes,
                defer_until,
            } => issue::run_create(
                &globals,
                issue::CreateOptions {
                    title,
                    description,
                    priority,
                    issue_type,
                    labels,
                    assignee,
                    design,
                    acceptance,
                    notes,
                    defer_until,
                },
            ),
            Commands::List {
                status,
                issue_type,
                assignee,
                priority,
                label,
                limit,
            } => issue::run_list(
                &globals,
                issue::ListOptions {
                    status,
                    issue_type,
                    assignee,
                    priority,
                    label,
                    limit,
                },
            ),
            Commands::Show { id } => issue::run_show(&globals, &id),
            Commands::Update {
                id,
                title,
                description,
                status,
                priority,
                assignee,
                issue_type,
                labels,
                set,
            } => issue::run_update(
                &globals,
                issue::UpdateOptions {
                    id,
                    title,
                    description,
                    status,
                    priority,
                    assignee,
                    issue_type,
                    labels,
                    set,
                },
            ),
            Commands::Close { id, reason } => issue::run_close(&globals, &id, reason.as_deref()),
            Commands::Reopen { id } => issue::run_reopen(&globals, &id),
            Commands::Claim { id, agent } => issue::run_claim(&globals, &id, agent.as_deref()),
            Commands::Ready { limit } => graph::run_ready(&globals, limit),
            Commands::Blocked => graph::run_blocked(&globals),
            Commands::Stats => graph::run_stats(&globals),
            Commands::Dep(cmd) => match cmd {
                DepCommands::Add {
                    issue,
                    depends_on,
                    dep_type,
                } => graph::run_dep_add(&globals, &issue, &depends_on, &dep_type),
                DepCommands::Remove { issue, depends_on } => {
                    graph::run_dep_remove(&globals, &issue, &depends_on)
                }
            },
            Commands::Import { from } => transfer::run_import(&globals, &from),
            Commands::Export { to } => transfer::run_export(&globals, &to),
            Commands::Sync { to } => transfer::run_sync(&globals, &to),
        }
    }
}
