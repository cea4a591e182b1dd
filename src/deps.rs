//! Dependency analysis: cycle checks, the blocked set and the ready queue.
//!
//! An issue is blocked when it has a readiness-affecting edge
//! (`blocks`, `parent-child`, `conditional-blocks`, `waits-for`) to an issue
//! that is still open, in progress or blocked. Blocking also flows down
//! `parent-child` edges: a child of a blocked parent is blocked.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::graph::Graph;
use crate::model::{DependencyType, Issue, Status};

/// Would adding `issue -> depends_on` close a cycle?
///
/// True when `issue` is reachable from `depends_on` along existing forward
/// edges, or when both are the same id.
pub fn would_cycle(graph: &Graph, issue: &str, depends_on: &str) -> bool {
    if issue == depends_on {
        return true;
    }
    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = vec![depends_on];
    while let Some(current) = stack.pop() {
        if current == issue {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        for next in graph.depends_on(current) {
            if !visited.contains(next.as_str()) {
                stack.push(next.as_str());
            }
        }
    }
    false
}

fn blocks_through(graph: &Graph, issue: &Issue, blocked: &BTreeSet<String>) -> Vec<String> {
    let mut blockers = Vec::new();
    for dep in &issue.dependencies {
        if !dep.dep_type.affects_ready_work() {
            continue;
        }
        let Some(target) = graph.issue(&dep.depends_on_id) else {
            continue;
        };
        let target_blocks = target.status.blocks_ready()
            || (dep.dep_type == DependencyType::ParentChild && blocked.contains(&target.id));
        if target_blocks {
            blockers.push(target.id.clone());
        }
    }
    blockers
}

/// Every issue id that is currently blocked.
pub fn compute_blocked_set(graph: &Graph) -> BTreeSet<String> {
    let mut blocked = BTreeSet::new();
    loop {
        let mut changed = false;
        for issue in graph.issues() {
            if blocked.contains(&issue.id) {
                continue;
            }
            if !blocks_through(graph, issue, &blocked).is_empty() {
                blocked.insert(issue.id.clone());
                changed = true;
            }
        }
        if !changed {
            return blocked;
        }
    }
}

/// Ids currently blocking `issue`, sorted.
pub fn blockers_for(graph: &Graph, issue: &Issue, blocked: &BTreeSet<String>) -> Vec<String> {
    let mut blockers = blocks_through(graph, issue, blocked);
    blockers.sort();
    blockers.dedup();
    blockers
}

fn by_priority_then_age(a: &Issue, b: &Issue) -> std::cmp::Ordering {
    a.priority
        .cmp(&b.priority)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Open, unblocked, unpinned issues whose deferral (if any) has passed,
/// most urgent first.
pub fn collect_ready<'a>(graph: &'a Graph, blocked: &BTreeSet<String>, now: DateTime<Utc>) -> Vec<&'a Issue> {
    let mut ready: Vec<&Issue> = graph
        .issues()
        .filter(|issue| issue.status == Status::Open)
        .filter(|issue| !blocked.contains(&issue.id))
        .filter(|issue| !issue.pinned)
        .filter(|issue| issue.defer_until.map_or(true, |until| until < now))
        .collect();
    ready.sort_by(|a, b| by_priority_then_age(a, b));
    ready
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockedIssue {
    pub id: String,
    pub title: String,
    pub status: Status,
    pub priority: i32,
    pub blocked_by: Vec<String>,
}

/// Blocked, non-closed issues with their blockers, most urgent first.
pub fn collect_blocked(graph: &Graph, blocked: &BTreeSet<String>) -> Vec<BlockedIssue> {
    let mut issues: Vec<&Issue> = graph
        .issues()
        .filter(|issue| blocked.contains(&issue.id))
        .filter(|issue| issue.status != Status::Closed)
        .collect();
    issues.sort_by(|a, b| by_priority_then_age(a, b));
    issues
        .into_iter()
        .map(|issue| BlockedIssue {
            id: issue.id.clone(),
            title: issue.title.clone(),
            status: issue.status.clone(),
            priority: issue.priority,
            blocked_by: blockers_for(graph, issue, blocked),
        })
        .collect()
}
