//! Issue-file import and export.
//!
//! The interchange format is one JSON issue object per line, the shape
//! other trackers (beads) write. Top-level fields tl does not model are
//! kept in `metadata` on import and promoted back to the top level on
//! export, so a round trip through tl loses nothing.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::deps::would_cycle;
use crate::error::{Error, Result};
use crate::event::{CreateData, Event, EventStamp};
use crate::graph::Graph;
use crate::hash::compute_content_hash;
use crate::model::{Dependency, DependencyType, Issue, IssueType, Status, DEFAULT_PRIORITY};
use crate::replay::apply;

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

#[derive(Debug, Deserialize)]
struct IssueLine {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    design: Option<String>,
    #[serde(default)]
    acceptance_criteria: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    spec_id: Option<String>,
    #[serde(default)]
    status: Status,
    #[serde(default = "default_priority")]
    priority: i32,
    #[serde(default)]
    issue_type: IssueType,
    #[serde(default)]
    assignee: Option<String>,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    created_by: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    close_reason: Option<String>,
    #[serde(default)]
    defer_until: Option<DateTime<Utc>>,
    #[serde(default)]
    labels: Option<Vec<String>>,
    #[serde(default)]
    dependencies: Option<Vec<DependencyLine>>,
    #[serde(default)]
    pinned: bool,
    #[serde(default)]
    ephemeral: bool,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct DependencyLine {
    #[serde(default)]
    depends_on_id: String,
    #[serde(rename = "type", default)]
    dep_type: DependencyType,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    created_by: Option<String>,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.is_empty())
}

impl IssueLine {
    fn into_issue(self) -> Issue {
        let updated_at = self.updated_at.unwrap_or(self.created_at);
        let mut issue = Issue::new(self.id, self.title, self.created_at);
        issue.updated_at = updated_at;
        issue.description = blank_to_none(self.description);
        issue.design = blank_to_none(self.design);
        issue.acceptance_criteria = blank_to_none(self.acceptance_criteria);
        issue.notes = blank_to_none(self.notes);
        issue.spec_id = blank_to_none(self.spec_id);
        issue.status = self.status;
        issue.priority = self.priority;
        issue.issue_type = self.issue_type;
        issue.assignee = blank_to_none(self.assignee);
        issue.owner = blank_to_none(self.owner);
        issue.created_by = blank_to_none(self.created_by);
        issue.closed_at = self.closed_at;
        issue.close_reason = blank_to_none(self.close_reason);
        issue.defer_until = self.defer_until;
        issue.labels = self.labels.unwrap_or_default();
        issue.pinned = self.pinned;
        issue.ephemeral = self.ephemeral;
        issue.metadata = self.extra;

        let source = issue.id.clone();
        let created_at = issue.created_at;
        issue.dependencies = self
            .dependencies
            .unwrap_or_default()
            .into_iter()
            .map(|dep| Dependency {
                issue_id: source.clone(),
                depends_on_id: dep.depends_on_id,
                dep_type: dep.dep_type,
                created_at: dep.created_at.unwrap_or(created_at),
                created_by: blank_to_none(dep.created_by),
            })
            .collect();
        issue
    }
}

/// Parse line-delimited issue objects.
///
/// A final line without a trailing newline that does not parse is taken
/// to be a torn write and dropped; every other bad line is an error.
pub fn parse_issue_lines(source: &Path, input: &str) -> Result<Vec<Issue>> {
    let mut issues = Vec::new();
    let mut pending: Option<(usize, &str, bool)> = None;

    for (idx, raw) in input.split_inclusive('\n').enumerate() {
        let line = raw.trim_end_matches('\n').trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let terminated = raw.ends_with('\n');
        if let Some((prev_no, prev, _)) = pending.replace((idx + 1, line, terminated)) {
            issues.push(parse_issue_line(source, prev_no, prev)?);
        }
    }

    if let Some((last_no, last, terminated)) = pending {
        match parse_issue_line(source, last_no, last) {
            Ok(issue) => issues.push(issue),
            Err(err) if !terminated => {
                tracing::warn!(
                    path = %source.display(),
                    line = last_no,
                    error = %err,
                    "dropping truncated final issue line"
                );
            }
            Err(err) => return Err(err),
        }
    }
    Ok(issues)
}

fn parse_issue_line(source: &Path, line_no: usize, line: &str) -> Result<Issue> {
    let parsed: IssueLine = serde_json::from_str(line).map_err(|err| Error::Corruption {
        path: source.to_path_buf(),
        line: line_no,
        reason: err.to_string(),
    })?;
    if parsed.id.trim().is_empty() {
        return Err(Error::Corruption {
            path: source.to_path_buf(),
            line: line_no,
            reason: "issue id is empty".to_string(),
        });
    }
    Ok(parsed.into_issue())
}

pub fn read_issue_file(path: &Path) -> Result<Vec<Issue>> {
    let input = std::fs::read_to_string(path)?;
    parse_issue_lines(path, &input)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportCounts {
    pub imported: usize,
    pub updated: usize,
    pub skipped: usize,
    pub dependencies: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ImportPlan {
    pub events: Vec<Event>,
    pub counts: ImportCounts,
}

/// Plan the events that merge `incoming` into `graph`.
///
/// New ids become `create` events at their original creation time. Known
/// ids are skipped when the content hash matches or the incoming copy is
/// not newer; otherwise the differing fields become one `update`. Missing
/// dependency edges are added last so that every source exists.
pub fn plan_import(graph: &mut Graph, stamp: &EventStamp, incoming: &[Issue]) -> Result<ImportPlan> {
    let mut plan = ImportPlan::default();

    for issue in incoming {
        let event = match graph.issue(&issue.id) {
            None => {
                plan.counts.imported += 1;
                stamp.at(issue.created_at).create(&issue.id, &create_data(issue))?
            }
            Some(existing) => {
                if compute_content_hash(existing) == compute_content_hash(issue)
                    || issue.updated_at <= existing.updated_at
                {
                    plan.counts.skipped += 1;
                    continue;
                }
                let fields = changed_fields(existing, issue);
                if fields.is_empty() {
                    plan.counts.skipped += 1;
                    continue;
                }
                plan.counts.updated += 1;
                stamp.at(issue.updated_at).update(&issue.id, fields)?
            }
        };
        apply(graph, &event);
        plan.events.push(event);
    }

    for issue in incoming {
        for dep in &issue.dependencies {
            let target = dep.depends_on_id.as_str();
            if target.is_empty() || target == issue.id || graph.has_edge(&issue.id, target) {
                continue;
            }
            if would_cycle(graph, &issue.id, target) {
                tracing::warn!(issue = %issue.id, depends_on = %target, "skipping imported dependency that would form a cycle");
                continue;
            }
            let event = stamp.at(dep.created_at).dep_add(&issue.id, target, &dep.dep_type)?;
            apply(graph, &event);
            plan.events.push(event);
            plan.counts.dependencies += 1;
        }
    }

    Ok(plan)
}

fn create_data(issue: &Issue) -> CreateData {
    CreateData {
        title: issue.title.clone(),
        description: issue.description.clone().unwrap_or_default(),
        priority: issue.priority,
        issue_type: issue.issue_type.as_str().to_string(),
        status: issue.status.as_str().to_string(),
        labels: issue.labels.clone(),
        design: issue.design.clone().unwrap_or_default(),
        acceptance_criteria: issue.acceptance_criteria.clone().unwrap_or_default(),
        notes: issue.notes.clone().unwrap_or_default(),
        spec_id: issue.spec_id.clone().unwrap_or_default(),
        assignee: issue.assignee.clone().unwrap_or_default(),
        owner: issue.owner.clone().unwrap_or_default(),
        created_by: issue.created_by.clone().unwrap_or_default(),
        defer_until: issue.defer_until,
        pinned: issue.pinned,
        ephemeral: issue.ephemeral,
        metadata: issue.metadata.clone(),
    }
}

fn text(value: &Option<String>) -> Value {
    value.as_ref().map_or(Value::Null, |text| Value::String(text.clone()))
}

fn changed_fields(existing: &Issue, incoming: &Issue) -> BTreeMap<String, Value> {
    let mut fields = BTreeMap::new();
    let mut diff = |name: &str, old: Value, new: Value| {
        if old != new {
            fields.insert(name.to_string(), new);
        }
    };

    diff("title", Value::from(existing.title.as_str()), Value::from(incoming.title.as_str()));
    diff("description", text(&existing.description), text(&incoming.description));
    diff("design", text(&existing.design), text(&incoming.design));
    diff(
        "acceptance_criteria",
        text(&existing.acceptance_criteria),
        text(&incoming.acceptance_criteria),
    );
    diff("notes", text(&existing.notes), text(&incoming.notes));
    diff("spec_id", text(&existing.spec_id), text(&incoming.spec_id));
    diff(
        "status",
        Value::from(existing.status.as_str()),
        Value::from(incoming.status.as_str()),
    );
    diff("priority", Value::from(existing.priority), Value::from(incoming.priority));
    diff(
        "issue_type",
        Value::from(existing.issue_type.as_str()),
        Value::from(incoming.issue_type.as_str()),
    );
    diff("assignee", text(&existing.assignee), text(&incoming.assignee));
    diff("owner", text(&existing.owner), text(&incoming.owner));
    diff("close_reason", text(&existing.close_reason), text(&incoming.close_reason));
    diff("labels", Value::from(existing.labels.clone()), Value::from(incoming.labels.clone()));
    diff(
        "defer_until",
        existing.defer_until.map_or(Value::Null, |at| Value::from(at.to_rfc3339())),
        incoming.defer_until.map_or(Value::Null, |at| Value::from(at.to_rfc3339())),
    );
    diff("pinned", Value::from(existing.pinned), Value::from(incoming.pinned));

    for (key, value) in &incoming.metadata {
        if existing.metadata.get(key) != Some(value) {
            fields.insert(key.clone(), value.clone());
        }
    }
    fields
}

/// Issues in id order, for export
pub fn export_issues(graph: &Graph) -> Vec<&Issue> {
    graph.issues().collect()
}

/// Serialize one issue with its metadata promoted to top-level fields
pub fn export_line(issue: &Issue) -> Result<String> {
    let mut value = serde_json::to_value(issue)?;
    if let Value::Object(map) = &mut value {
        map.remove("metadata");
        for (key, extra) in &issue.metadata {
            map.entry(key.clone()).or_insert_with(|| extra.clone());
        }
    }
    Ok(serde_json::to_string(&value)?)
}

/// The full export file: one line per issue, newline terminated
pub fn export_lines(graph: &Graph) -> Result<String> {
    let mut out = String::new();
    for issue in export_issues(graph) {
        out.push_str(&export_line(issue)?);
        out.push('\n');
    }
    Ok(out)
}
