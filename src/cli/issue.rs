//! tl issue command implementations.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::cli::Globals;
use crate::deps::{blockers_for, compute_blocked_set};
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::id::{generate_id, resolve_id};
use crate::model::{Issue, IssueType, Status};
use crate::ops::{self, NewIssue};
use crate::output::{emit_success, HumanOutput};

pub struct CreateOptions {
    pub title: String,
    pub description: Option<String>,
    pub priority: i32,
    pub issue_type: String,
    pub labels: Vec<String>,
    pub assignee: Option<String>,
    pub design: Option<String>,
    pub acceptance: Option<String>,
    pub notes: Option<String>,
    pub defer_until: Option<String>,
}

pub struct ListOptions {
    pub status: Option<String>,
    pub issue_type: Option<String>,
    pub assignee: Option<String>,
    pub priority: Option<i32>,
    pub label: Option<String>,
    pub limit: Option<usize>,
}

pub struct UpdateOptions {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<i32>,
    pub assignee: Option<String>,
    pub issue_type: Option<String>,
    pub labels: Vec<String>,
    pub set: Vec<String>,
}

#[derive(Serialize)]
struct ShowOutput<'a> {
    #[serde(flatten)]
    issue: &'a Issue,
    blocked: bool,
    blocked_by: Vec<String>,
    dependents: Vec<String>,
}

fn parse_time(flag: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| Error::InvalidArgument(format!("{flag}: expected RFC 3339 time: {err}")))
}

fn snapshot(graph: &Graph, id: &str) -> Result<Issue> {
    graph
        .issue(id)
        .cloned()
        .ok_or_else(|| Error::NotFound(id.to_string()))
}

pub(crate) fn issue_human(header: &str, issue: &Issue) -> HumanOutput {
    let mut human = HumanOutput::new(format!("{header}: {} {}", issue.id, issue.title));
    human.push_summary("status", issue.status.to_string());
    human.push_summary("priority", format!("P{}", issue.priority));
    human.push_summary("type", issue.issue_type.to_string());
    if let Some(assignee) = &issue.assignee {
        human.push_summary("assignee", assignee.clone());
    }
    if !issue.labels.is_empty() {
        human.push_summary("labels", issue.labels.join(", "));
    }
    if let Some(reason) = &issue.close_reason {
        human.push_summary("close reason", reason.clone());
    }
    human
}

pub fn run_create(globals: &Globals, options: CreateOptions) -> Result<()> {
    let store = globals.store()?;
    let stamp = globals.stamp(&store);

    let mut new = NewIssue::new(options.title);
    new.description = options.description;
    new.priority = options.priority;
    new.issue_type = IssueType::parse(options.issue_type.trim());
    new.labels = options.labels;
    new.assignee = options.assignee;
    new.design = options.design;
    new.acceptance_criteria = options.acceptance;
    new.notes = options.notes;
    new.defer_until = options
        .defer_until
        .as_deref()
        .map(|raw| parse_time("--defer-until", raw))
        .transpose()?;

    let ids = store.config().ids.clone();
    let issue = store.mutate_with(|graph| {
        let id = generate_id(graph, &ids);
        let event = ops::create(graph, &stamp, &id, new)?;
        Ok((vec![event], snapshot(graph, &id)?))
    })?;

    let mut human = issue_human("tl create", &issue);
    human.push_next_step(format!("tl claim {}", issue.id));
    emit_success(globals.output, "create", &issue, Some(&human))
}

pub fn run_list(globals: &Globals, options: ListOptions) -> Result<()> {
    let store = globals.store()?;
    let graph = store.load()?;

    let status = options.status.as_deref().map(Status::parse);
    let issue_type = options.issue_type.as_deref().map(IssueType::parse);
    let mut issues: Vec<&Issue> = graph
        .issues()
        .filter(|issue| status.as_ref().map_or(true, |status| &issue.status == status))
        .filter(|issue| {
            issue_type
                .as_ref()
                .map_or(true, |issue_type| &issue.issue_type == issue_type)
        })
        .filter(|issue| {
            options
                .assignee
                .as_deref()
                .map_or(true, |assignee| issue.assignee.as_deref() == Some(assignee))
        })
        .filter(|issue| options.priority.map_or(true, |priority| issue.priority == priority))
        .filter(|issue| {
            options
                .label
                .as_ref()
                .map_or(true, |label| issue.labels.contains(label))
        })
        .collect();
    issues.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
    if let Some(limit) = options.limit {
        issues.truncate(limit);
    }

    let mut human = HumanOutput::new(format!("tl list: {} issue(s)", issues.len()));
    for issue in &issues {
        human.push_detail(format!(
            "{} [P{}] [{}] {}",
            issue.id, issue.priority, issue.status, issue.title
        ));
    }
    emit_success(globals.output, "list", &issues, Some(&human))
}

pub fn run_show(globals: &Globals, id: &str) -> Result<()> {
    let store = globals.store()?;
    let graph = store.load()?;
    let id = resolve_id(&graph, id)?;
    let issue = graph.issue(&id).ok_or_else(|| Error::NotFound(id.clone()))?;

    let blocked = compute_blocked_set(&graph);
    let output = ShowOutput {
        issue,
        blocked: blocked.contains(&id),
        blocked_by: blockers_for(&graph, issue, &blocked),
        dependents: graph.dependents(&id).to_vec(),
    };

    let mut human = issue_human("tl show", issue);
    if let Some(description) = &issue.description {
        human.push_detail(description.clone());
    }
    for dep in &issue.dependencies {
        human.push_detail(format!("depends on {} ({})", dep.depends_on_id, dep.dep_type));
    }
    for dependent in &output.dependents {
        human.push_detail(format!("required by {dependent}"));
    }
    if !output.blocked_by.is_empty() {
        human.push_warning(format!("blocked by {}", output.blocked_by.join(", ")));
    }
    emit_success(globals.output, "show", &output, Some(&human))
}

fn parse_set(raw: &str) -> Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| Error::InvalidArgument(format!("--set expects KEY=VALUE, got '{raw}'")))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(Error::InvalidArgument("--set key cannot be empty".to_string()));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

pub fn run_update(globals: &Globals, options: UpdateOptions) -> Result<()> {
    let mut fields: BTreeMap<String, Value> = BTreeMap::new();
    for raw in &options.set {
        let (key, value) = parse_set(raw)?;
        fields.insert(key, value);
    }
    if let Some(title) = options.title {
        fields.insert("title".to_string(), Value::String(title));
    }
    if let Some(description) = options.description {
        fields.insert("description".to_string(), Value::String(description));
    }
    if let Some(status) = options.status {
        fields.insert("status".to_string(), Value::String(status));
    }
    if let Some(priority) = options.priority {
        fields.insert("priority".to_string(), Value::from(priority));
    }
    if let Some(assignee) = options.assignee {
        fields.insert("assignee".to_string(), Value::String(assignee));
    }
    if let Some(issue_type) = options.issue_type {
        fields.insert("issue_type".to_string(), Value::String(issue_type));
    }
    if !options.labels.is_empty() {
        fields.insert("labels".to_string(), Value::from(options.labels));
    }

    let store = globals.store()?;
    let stamp = globals.stamp(&store);
    let issue = store.mutate_with(|graph| {
        let id = resolve_id(graph, &options.id)?;
        let event = ops::update(graph, &stamp, &id, fields)?;
        Ok((vec![event], snapshot(graph, &id)?))
    })?;

    let human = issue_human("tl update", &issue);
    emit_success(globals.output, "update", &issue, Some(&human))
}

pub fn run_close(globals: &Globals, id: &str, reason: Option<&str>) -> Result<()> {
    let store = globals.store()?;
    let stamp = globals.stamp(&store);
    let issue = store.mutate_with(|graph| {
        let id = resolve_id(graph, id)?;
        let event = ops::close(graph, &stamp, &id, reason)?;
        Ok((vec![event], snapshot(graph, &id)?))
    })?;

    let mut human = issue_human("tl close", &issue);
    human.push_next_step("tl ready");
    emit_success(globals.output, "close", &issue, Some(&human))
}

pub fn run_reopen(globals: &Globals, id: &str) -> Result<()> {
    let store = globals.store()?;
    let stamp = globals.stamp(&store);
    let issue = store.mutate_with(|graph| {
        let id = resolve_id(graph, id)?;
        let event = ops::reopen(graph, &stamp, &id)?;
        Ok((vec![event], snapshot(graph, &id)?))
    })?;

    let human = issue_human("tl reopen", &issue);
    emit_success(globals.output, "reopen", &issue, Some(&human))
}

pub fn run_claim(globals: &Globals, id: &str, agent: Option<&str>) -> Result<()> {
    let store = globals.store()?;
    let stamp = globals.stamp(&store);
    let agent = agent
        .map(str::to_string)
        .unwrap_or_else(|| stamp.actor.clone());
    let issue = store.mutate_with(|graph| {
        let id = resolve_id(graph, id)?;
        let event = ops::claim(graph, &stamp, &id, &agent)?;
        Ok((vec![event], snapshot(graph, &id)?))
    })?;

    let mut human = issue_human("tl claim", &issue);
    human.push_next_step(format!("tl close {}", issue.id));
    emit_success(globals.output, "claim", &issue, Some(&human))
}
