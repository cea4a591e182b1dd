//! Deterministic fold of events into a [`Graph`].
//!
//! Replay never fails. Unknown kinds, events for ids that were never
//! created, and payloads that do not decode are skipped with a warning so
//! that a log written by a newer tool still loads.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::event::{ClaimData, CloseData, CreateData, DepAddData, DepRemoveData, Event, EventKind, UpdateData};
use crate::graph::Graph;
use crate::model::{non_empty, DependencyType, Issue, IssueType, Status};

/// Build the graph for a full history
pub fn replay(events: &[Event]) -> Graph {
    let mut graph = Graph::new();
    for event in events {
        apply(&mut graph, event);
    }
    graph
}

/// Apply one event in place
pub fn apply(graph: &mut Graph, event: &Event) {
    match &event.kind {
        EventKind::Create => {
            if let Some(data) = decode::<CreateData>(event) {
                graph.insert_issue(issue_from_create(event, data));
            }
        }
        EventKind::Update => {
            let Some(data) = decode::<UpdateData>(event) else {
                return;
            };
            if let Some(issue) = graph.issue_mut(&event.id) {
                apply_update(issue, data.fields, event.timestamp);
            }
        }
        EventKind::Close => {
            let Some(data) = decode::<CloseData>(event) else {
                return;
            };
            let Some(issue) = graph.issue_mut(&event.id) else {
                return;
            };
            issue.status = Status::Closed;
            issue.closed_at = Some(event.timestamp);
            issue.close_reason = data.reason.and_then(non_empty);
            issue.updated_at = event.timestamp;
            graph.clear_incoming(&event.id);
        }
        EventKind::Reopen => {
            if let Some(issue) = graph.issue_mut(&event.id) {
                issue.status = Status::Open;
                issue.closed_at = None;
                issue.close_reason = None;
                issue.assignee = None;
                issue.updated_at = event.timestamp;
            }
        }
        EventKind::Claim => {
            let Some(data) = decode::<ClaimData>(event) else {
                return;
            };
            if let Some(issue) = graph.issue_mut(&event.id) {
                issue.status = Status::InProgress;
                issue.assignee = non_empty(data.agent).or_else(|| non_empty(event.actor.clone()));
                issue.updated_at = event.timestamp;
            }
        }
        EventKind::DepAdd => {
            let Some(data) = decode::<DepAddData>(event) else {
                return;
            };
            graph.add_edge(
                &event.id,
                &data.depends_on_id,
                DependencyType::parse(&data.dep_type),
                event.timestamp,
                non_empty(event.actor.clone()),
            );
        }
        EventKind::DepRemove => {
            if let Some(data) = decode::<DepRemoveData>(event) {
                graph.remove_edge(&event.id, &data.depends_on_id);
            }
        }
        EventKind::Unknown(kind) => {
            tracing::debug!(kind = %kind, id = %event.id, "skipping unknown event kind");
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(event: &Event) -> Option<T> {
    match event.payload::<T>() {
        Ok(data) => Some(data),
        Err(err) => {
            tracing::warn!(
                kind = %event.kind,
                id = %event.id,
                error = %err,
                "skipping event with undecodable payload"
            );
            None
        }
    }
}

fn issue_from_create(event: &Event, data: CreateData) -> Issue {
    let mut issue = Issue::new(event.id.clone(), data.title, event.timestamp);
    issue.description = non_empty(data.description);
    issue.design = non_empty(data.design);
    issue.acceptance_criteria = non_empty(data.acceptance_criteria);
    issue.notes = non_empty(data.notes);
    issue.spec_id = non_empty(data.spec_id);
    issue.status = if data.status.is_empty() {
        Status::Open
    } else {
        Status::parse(&data.status)
    };
    issue.priority = data.priority;
    issue.issue_type = IssueType::parse(&data.issue_type);
    issue.assignee = non_empty(data.assignee);
    issue.owner = non_empty(data.owner);
    issue.created_by = non_empty(data.created_by).or_else(|| non_empty(event.actor.clone()));
    issue.defer_until = data.defer_until;
    issue.labels = data.labels;
    issue.pinned = data.pinned;
    issue.ephemeral = data.ephemeral;
    issue.metadata = data.metadata;
    issue
}

fn apply_update(issue: &mut Issue, fields: BTreeMap<String, Value>, at: DateTime<Utc>) {
    for (key, value) in fields {
        let applied = match key.as_str() {
            "title" => value.as_str().map(|title| issue.title = title.to_string()),
            "status" => value.as_str().map(|status| issue.status = Status::parse(status)),
            "issue_type" => value
                .as_str()
                .map(|issue_type| issue.issue_type = IssueType::parse(issue_type)),
            "priority" => as_priority(&value).map(|priority| issue.priority = priority),
            "description" => optional_text(&value).map(|text| issue.description = text),
            "design" => optional_text(&value).map(|text| issue.design = text),
            "acceptance_criteria" => optional_text(&value).map(|text| issue.acceptance_criteria = text),
            "notes" => optional_text(&value).map(|text| issue.notes = text),
            "spec_id" => optional_text(&value).map(|text| issue.spec_id = text),
            "assignee" => optional_text(&value).map(|text| issue.assignee = text),
            "owner" => optional_text(&value).map(|text| issue.owner = text),
            "close_reason" => optional_text(&value).map(|text| issue.close_reason = text),
            "labels" => as_labels(&value).map(|labels| issue.labels = labels),
            "defer_until" => as_defer_until(&value).map(|defer| issue.defer_until = defer),
            "pinned" => value.as_bool().map(|pinned| issue.pinned = pinned),
            _ => {
                issue.metadata.insert(key, value);
                continue;
            }
        };
        if applied.is_none() {
            tracing::warn!(id = %issue.id, field = %key, "ignoring update field with unexpected type");
        }
    }
    issue.updated_at = at;
}

/// `null` clears; a string sets (empty also clears)
fn optional_text(value: &Value) -> Option<Option<String>> {
    match value {
        Value::Null => Some(None),
        Value::String(text) => Some(non_empty(text.as_str())),
        _ => None,
    }
}

fn as_priority(value: &Value) -> Option<i32> {
    let raw = value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|number| number.fract() == 0.0)
            .map(|number| number as i64)
    })?;
    i32::try_from(raw).ok()
}

fn as_labels(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Null => Some(Vec::new()),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => None,
    }
}

fn as_defer_until(value: &Value) -> Option<Option<DateTime<Utc>>> {
    match value {
        Value::Null => Some(None),
        Value::String(text) if text.is_empty() => Some(None),
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|at| Some(at.with_timezone(&Utc))),
        _ => None,
    }
}
