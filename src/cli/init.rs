//! tl init command implementation
//!
//! Creates `.tl/` with an empty event log, the lock sentinel, and a default
//! config file.

use std::path::PathBuf;

use serde::Serialize;

use crate::cli::Globals;
use crate::config::Config;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::store::Store;

#[derive(Serialize)]
struct InitReport {
    dir: PathBuf,
    events: PathBuf,
    config: PathBuf,
}

pub fn run(globals: &Globals) -> Result<()> {
    let root = match &globals.dir {
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };

    let store = Store::init(&root)?;
    Config::default().save(&store.config_path())?;

    let report = InitReport {
        dir: store.dir().to_path_buf(),
        events: store.events_path(),
        config: store.config_path(),
    };

    let mut human = HumanOutput::new(format!("tl init: {}", store.dir().display()));
    human.push_summary("events", report.events.display().to_string());
    human.push_summary("config", report.config.display().to_string());
    human.push_next_step("tl create \"<title>\"");

    emit_success(globals.output, "init", &report, Some(&human))
}
