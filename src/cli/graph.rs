//! tl ready / blocked / stats / dep command implementations.

use chrono::Utc;
use serde::Serialize;

use crate::cli::Globals;
use crate::deps::{collect_blocked, collect_ready, compute_blocked_set};
use crate::error::Result;
use crate::id::resolve_id;
use crate::model::DependencyType;
use crate::ops;
use crate::output::{emit_success, HumanOutput};
use crate::stats::compute_stats;

#[derive(Serialize)]
struct DepOutput {
    issue: String,
    depends_on: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    dep_type: Option<String>,
}

pub fn run_ready(globals: &Globals, limit: Option<usize>) -> Result<()> {
    let store = globals.store()?;
    let graph = store.load()?;
    let blocked = compute_blocked_set(&graph);
    let mut ready = collect_ready(&graph, &blocked, Utc::now());
    if let Some(limit) = limit {
        ready.truncate(limit);
    }

    let mut human = HumanOutput::new(format!("tl ready: {} issue(s)", ready.len()));
    for issue in &ready {
        human.push_detail(format!("{} [P{}] {}", issue.id, issue.priority, issue.title));
    }
    if let Some(first) = ready.first() {
        human.push_next_step(format!("tl claim {}", first.id));
    }
    emit_success(globals.output, "ready", &ready, Some(&human))
}

pub fn run_blocked(globals: &Globals) -> Result<()> {
    let store = globals.store()?;
    let graph = store.load()?;
    let blocked = compute_blocked_set(&graph);
    let listed = collect_blocked(&graph, &blocked);

    let mut human = HumanOutput::new(format!("tl blocked: {} issue(s)", listed.len()));
    for item in &listed {
        human.push_detail(format!(
            "{} [P{}] {} <- {}",
            item.id,
            item.priority,
            item.title,
            item.blocked_by.join(", ")
        ));
    }
    emit_success(globals.output, "blocked", &listed, Some(&human))
}

pub fn run_stats(globals: &Globals) -> Result<()> {
    let store = globals.store()?;
    let graph = store.load()?;
    let stats = compute_stats(&graph);

    let mut human = HumanOutput::new(format!("tl stats: {} issue(s)", stats.total));
    human.push_summary("open", stats.open.to_string());
    human.push_summary("in_progress", stats.in_progress.to_string());
    human.push_summary("blocked", stats.blocked.to_string());
    human.push_summary("deferred", stats.deferred.to_string());
    human.push_summary("closed", stats.closed.to_string());
    if stats.other > 0 {
        human.push_summary("other", stats.other.to_string());
    }
    emit_success(globals.output, "stats", &stats, Some(&human))
}

pub fn run_dep_add(globals: &Globals, issue: &str, depends_on: &str, dep_type: &str) -> Result<()> {
    let store = globals.store()?;
    let stamp = globals.stamp(&store);
    let dep_type = DependencyType::parse(dep_type.trim());
    let output = store.mutate_with(|graph| {
        let issue = resolve_id(graph, issue)?;
        let depends_on = resolve_id(graph, depends_on)?;
        let event = ops::add_dependency(graph, &stamp, &issue, &depends_on, dep_type.clone())?;
        let output = DepOutput {
            issue,
            depends_on,
            dep_type: Some(dep_type.to_string()),
        };
        Ok((vec![event], output))
    })?;

    let mut human = HumanOutput::new(format!(
        "tl dep add: {} -> {}",
        output.issue, output.depends_on
    ));
    human.push_summary("type", dep_type.to_string());
    emit_success(globals.output, "dep add", &output, Some(&human))
}

pub fn run_dep_remove(globals: &Globals, issue: &str, depends_on: &str) -> Result<()> {
    let store = globals.store()?;
    let stamp = globals.stamp(&store);
    let output = store.mutate_with(|graph| {
        let issue = resolve_id(graph, issue)?;
        let depends_on = resolve_id(graph, depends_on).unwrap_or_else(|_| depends_on.to_string());
        let event = ops::remove_dependency(graph, &stamp, &issue, &depends_on)?;
        Ok((
            vec![event],
            DepOutput {
                issue,
                depends_on,
                dep_type: None,
            },
        ))
    })?;

    let human = HumanOutput::new(format!(
        "tl dep remove: {} -> {}",
        output.issue, output.depends_on
    ));
    emit_success(globals.output, "dep remove", &output, Some(&human))
}
