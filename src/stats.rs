//! Per-status issue counts.

use serde::Serialize;

use crate::graph::Graph;
use crate::model::Status;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: usize,
    pub open: usize,
    pub in_progress: usize,
    pub blocked: usize,
    pub deferred: usize,
    pub closed: usize,
    /// Statuses outside the five above (pinned, hooked, custom)
    pub other: usize,
}

pub fn compute_stats(graph: &Graph) -> Stats {
    let mut stats = Stats::default();
    for issue in graph.issues() {
        stats.total += 1;
        match issue.status {
            Status::Open => stats.open += 1,
            Status::InProgress => stats.in_progress += 1,
            Status::Blocked => stats.blocked += 1,
            Status::Deferred => stats.deferred += 1,
            Status::Closed => stats.closed += 1,
            _ => stats.other += 1,
        }
    }
    stats
}
