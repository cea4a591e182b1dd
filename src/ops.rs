//! Validated mutation planners.
//!
//! Each planner checks a request against the current graph, builds the
//! event, applies it to the graph with the same step replay uses, and
//! returns the event for the store to append. Nothing here touches disk.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::deps::would_cycle;
use crate::error::{Error, Result};
use crate::event::{CreateData, Event, EventStamp};
use crate::graph::Graph;
use crate::model::{validate_transition, DependencyType, Issue, IssueType, Status, DEFAULT_PRIORITY};
use crate::replay::apply;

/// Request for a new issue
#[derive(Debug, Clone, PartialEq)]
pub struct NewIssue {
    pub title: String,
    pub description: Option<String>,
    pub priority: i32,
    pub issue_type: IssueType,
    pub labels: Vec<String>,
    pub assignee: Option<String>,
    pub owner: Option<String>,
    pub design: Option<String>,
    pub acceptance_criteria: Option<String>,
    pub notes: Option<String>,
    pub defer_until: Option<DateTime<Utc>>,
    pub metadata: BTreeMap<String, Value>,
}

impl NewIssue {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            priority: DEFAULT_PRIORITY,
            issue_type: IssueType::Task,
            labels: Vec::new(),
            assignee: None,
            owner: None,
            design: None,
            acceptance_criteria: None,
            notes: None,
            defer_until: None,
            metadata: BTreeMap::new(),
        }
    }
}

fn get_issue<'a>(graph: &'a Graph, id: &str) -> Result<&'a Issue> {
    graph.issue(id).ok_or_else(|| Error::NotFound(id.to_string()))
}

fn commit(graph: &mut Graph, event: Event) -> Event {
    apply(graph, &event);
    event
}

pub fn create(graph: &mut Graph, stamp: &EventStamp, id: &str, new: NewIssue) -> Result<Event> {
    let title = new.title.trim();
    if title.is_empty() {
        return Err(Error::InvalidArgument("title cannot be empty".to_string()));
    }
    if id.trim().is_empty() {
        return Err(Error::InvalidArgument("issue id cannot be empty".to_string()));
    }
    if graph.contains(id) {
        return Err(Error::InvalidArgument(format!("issue already exists: {id}")));
    }

    let data = CreateData {
        title: title.to_string(),
        description: new.description.unwrap_or_default(),
        priority: new.priority,
        issue_type: new.issue_type.as_str().to_string(),
        status: Status::Open.as_str().to_string(),
        labels: new.labels,
        design: new.design.unwrap_or_default(),
        acceptance_criteria: new.acceptance_criteria.unwrap_or_default(),
        notes: new.notes.unwrap_or_default(),
        assignee: new.assignee.unwrap_or_default(),
        owner: new.owner.unwrap_or_default(),
        defer_until: new.defer_until,
        metadata: new.metadata,
        ..CreateData::default()
    };
    Ok(commit(graph, stamp.create(id, &data)?))
}

pub fn update(
    graph: &mut Graph,
    stamp: &EventStamp,
    id: &str,
    fields: BTreeMap<String, Value>,
) -> Result<Event> {
    let issue = get_issue(graph, id)?;
    if fields.is_empty() {
        return Err(Error::InvalidArgument("no fields to update".to_string()));
    }
    if let Some(status) = fields.get("status") {
        let to = status
            .as_str()
            .ok_or_else(|| Error::InvalidArgument("status must be a string".to_string()))?;
        validate_transition(id, &issue.status, &Status::parse(to))?;
    }
    if let Some(title) = fields.get("title") {
        if title.as_str().map_or(true, |title| title.trim().is_empty()) {
            return Err(Error::InvalidArgument("title cannot be empty".to_string()));
        }
    }
    Ok(commit(graph, stamp.update(id, fields)?))
}

pub fn close(graph: &mut Graph, stamp: &EventStamp, id: &str, reason: Option<&str>) -> Result<Event> {
    let issue = get_issue(graph, id)?;
    validate_transition(id, &issue.status, &Status::Closed)?;
    Ok(commit(graph, stamp.close(id, reason)?))
}

pub fn reopen(graph: &mut Graph, stamp: &EventStamp, id: &str) -> Result<Event> {
    let issue = get_issue(graph, id)?;
    validate_transition(id, &issue.status, &Status::Open)?;
    Ok(commit(graph, stamp.reopen(id)?))
}

/// Take an open issue. Anything but `open` is rejected, including an issue
/// someone else already claimed.
pub fn claim(graph: &mut Graph, stamp: &EventStamp, id: &str, agent: &str) -> Result<Event> {
    let agent = agent.trim();
    if agent.is_empty() {
        return Err(Error::InvalidArgument("agent cannot be empty".to_string()));
    }
    let issue = get_issue(graph, id)?;
    if issue.status != Status::Open {
        return Err(Error::InvalidTransition {
            id: id.to_string(),
            from: issue.status.to_string(),
            to: Status::InProgress.to_string(),
        });
    }
    Ok(commit(graph, stamp.claim(id, agent)?))
}

pub fn add_dependency(
    graph: &mut Graph,
    stamp: &EventStamp,
    id: &str,
    depends_on: &str,
    dep_type: DependencyType,
) -> Result<Event> {
    if id == depends_on {
        return Err(Error::SelfDependency(id.to_string()));
    }
    get_issue(graph, id)?;
    get_issue(graph, depends_on)?;
    if graph.has_edge(id, depends_on) {
        return Err(Error::InvalidArgument(format!(
            "dependency already exists: {id} -> {depends_on}"
        )));
    }
    if would_cycle(graph, id, depends_on) {
        return Err(Error::Cycle {
            issue: id.to_string(),
            depends_on: depends_on.to_string(),
        });
    }
    Ok(commit(graph, stamp.dep_add(id, depends_on, &dep_type)?))
}

pub fn remove_dependency(graph: &mut Graph, stamp: &EventStamp, id: &str, depends_on: &str) -> Result<Event> {
    get_issue(graph, id)?;
    if !graph.has_edge(id, depends_on) {
        return Err(Error::NotFound(format!("{id} -> {depends_on}")));
    }
    Ok(commit(graph, stamp.dep_remove(id, depends_on)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::replay;
    use serde_json::json;

    fn stamp() -> EventStamp {
        EventStamp::new("tester", "2026-02-01T12:00:00Z".parse().expect("ts"))
    }

    fn seeded(ids: &[&str]) -> Graph {
        let mut graph = Graph::new();
        for id in ids {
            create(&mut graph, &stamp(), id, NewIssue::new(format!("issue {id}"))).expect("create");
        }
        graph
    }

    #[test]
    fn create_applies_defaults() {
        let mut graph = Graph::new();
        let event = create(&mut graph, &stamp(), "tl-a", NewIssue::new("  Write docs ")).expect("create");
        let issue = graph.issue("tl-a").expect("issue");
        assert_eq!(issue.title, "Write docs");
        assert_eq!(issue.status, Status::Open);
        assert_eq!(issue.priority, 2);
        assert_eq!(issue.issue_type, IssueType::Task);
        assert_eq!(replay(&[event]).issue("tl-a"), Some(issue));
    }

    #[test]
    fn create_rejects_blank_title_and_duplicates() {
        let mut graph = seeded(&["tl-a"]);
        assert!(matches!(
            create(&mut graph, &stamp(), "tl-b", NewIssue::new("   ")),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            create(&mut graph, &stamp(), "tl-a", NewIssue::new("again")),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn update_checks_status_transition() {
        let mut graph = seeded(&["tl-a"]);
        let mut fields = BTreeMap::new();
        fields.insert("status".to_string(), json!("deferred"));
        update(&mut graph, &stamp(), "tl-a", fields).expect("open -> deferred");

        let mut fields = BTreeMap::new();
        fields.insert("status".to_string(), json!("closed"));
        let err = update(&mut graph, &stamp(), "tl-a", fields).expect_err("deferred -> closed");
        assert!(matches!(err, Error::InvalidTransition { .. }));

        assert!(matches!(
            update(&mut graph, &stamp(), "tl-a", BTreeMap::new()),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn claim_requires_open() {
        let mut graph = seeded(&["tl-a"]);
        claim(&mut graph, &stamp(), "tl-a", "alice").expect("first claim");
        let err = claim(&mut graph, &stamp(), "tl-a", "bob").expect_err("second claim");
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert_eq!(
            graph.issue("tl-a").and_then(|issue| issue.assignee.as_deref()),
            Some("alice")
        );
    }

    #[test]
    fn close_and_reopen_follow_table() {
        let mut graph = seeded(&["tl-a"]);
        close(&mut graph, &stamp(), "tl-a", Some("done")).expect("close");
        close(&mut graph, &stamp(), "tl-a", None).expect("closed -> closed is allowed");
        reopen(&mut graph, &stamp(), "tl-a").expect("reopen");
        assert_eq!(graph.issue("tl-a").expect("a").status, Status::Open);
        assert!(matches!(
            close(&mut graph, &stamp(), "tl-missing", None),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn dependency_validation() {
        let mut graph = seeded(&["a", "b", "c"]);
        add_dependency(&mut graph, &stamp(), "a", "b", DependencyType::Blocks).expect("a->b");
        add_dependency(&mut graph, &stamp(), "b", "c", DependencyType::Blocks).expect("b->c");

        assert!(matches!(
            add_dependency(&mut graph, &stamp(), "a", "a", DependencyType::Blocks),
            Err(Error::SelfDependency(_))
        ));
        assert!(matches!(
            add_dependency(&mut graph, &stamp(), "c", "a", DependencyType::Blocks),
            Err(Error::Cycle { .. })
        ));
        assert!(matches!(
            add_dependency(&mut graph, &stamp(), "a", "b", DependencyType::Related),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            add_dependency(&mut graph, &stamp(), "a", "zz", DependencyType::Blocks),
            Err(Error::NotFound(_))
        ));

        remove_dependency(&mut graph, &stamp(), "a", "b").expect("remove");
        assert!(matches!(
            remove_dependency(&mut graph, &stamp(), "a", "b"),
            Err(Error::NotFound(_))
        ));
        add_dependency(&mut graph, &stamp(), "c", "a", DependencyType::Blocks).expect("no cycle now");
        graph.assert_consistent();
    }
}
