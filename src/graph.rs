//! In-memory issue graph.
//!
//! An edge `a -> b` ("a depends on b") lives in three places: the
//! `dependencies` list on issue `a`, the forward adjacency of `a`, and the
//! reverse adjacency of `b`. Only the edge methods here touch those, so the
//! three views cannot drift apart.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{Dependency, DependencyType, Issue};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Graph {
    issues: BTreeMap<String, Issue>,
    forward: BTreeMap<String, Vec<String>>,
    reverse: BTreeMap<String, Vec<String>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.issues.contains_key(id)
    }

    pub fn issue(&self, id: &str) -> Option<&Issue> {
        self.issues.get(id)
    }

    /// Issues in id order
    pub fn issues(&self) -> impl Iterator<Item = &Issue> {
        self.issues.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.issues.keys().map(String::as_str)
    }

    /// Ids `id` depends on
    pub fn depends_on(&self, id: &str) -> &[String] {
        self.forward.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ids that depend on `id`
    pub fn dependents(&self, id: &str) -> &[String] {
        self.reverse.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_edge(&self, issue: &str, depends_on: &str) -> bool {
        self.depends_on(issue).iter().any(|target| target == depends_on)
    }

    /// Insert or replace an issue. Edges already recorded for the id are
    /// kept; the issue's own dependency list is rebuilt from them.
    pub(crate) fn insert_issue(&mut self, mut issue: Issue) {
        issue.dependencies = self
            .issues
            .get(&issue.id)
            .map(|existing| existing.dependencies.clone())
            .unwrap_or_default();
        self.issues.insert(issue.id.clone(), issue);
    }

    /// Field-level access. Dependencies must go through the edge methods.
    pub(crate) fn issue_mut(&mut self, id: &str) -> Option<&mut Issue> {
        self.issues.get_mut(id)
    }

    /// Record `issue -> depends_on`. Returns false when the source issue is
    /// unknown or the edge already exists.
    pub(crate) fn add_edge(
        &mut self,
        issue: &str,
        depends_on: &str,
        dep_type: DependencyType,
        created_at: DateTime<Utc>,
        created_by: Option<String>,
    ) -> bool {
        if self.has_edge(issue, depends_on) {
            return false;
        }
        let Some(source) = self.issues.get_mut(issue) else {
            return false;
        };
        source.dependencies.push(Dependency {
            issue_id: issue.to_string(),
            depends_on_id: depends_on.to_string(),
            dep_type,
            created_at,
            created_by,
        });
        self.forward
            .entry(issue.to_string())
            .or_default()
            .push(depends_on.to_string());
        self.reverse
            .entry(depends_on.to_string())
            .or_default()
            .push(issue.to_string());
        true
    }

    /// Drop `issue -> depends_on` from all three views.
    pub(crate) fn remove_edge(&mut self, issue: &str, depends_on: &str) -> bool {
        let mut removed = false;
        if let Some(source) = self.issues.get_mut(issue) {
            let before = source.dependencies.len();
            source
                .dependencies
                .retain(|dep| dep.depends_on_id != depends_on);
            removed |= source.dependencies.len() != before;
        }
        removed |= remove_from(&mut self.forward, issue, depends_on);
        removed |= remove_from(&mut self.reverse, depends_on, issue);
        removed
    }

    /// Remove every edge pointing into `target`.
    pub(crate) fn clear_incoming(&mut self, target: &str) {
        let Some(dependents) = self.reverse.remove(target) else {
            return;
        };
        for dependent in dependents {
            remove_from(&mut self.forward, &dependent, target);
            if let Some(issue) = self.issues.get_mut(&dependent) {
                issue.dependencies.retain(|dep| dep.depends_on_id != target);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        for issue in self.issues.values() {
            let listed: Vec<&str> = issue
                .dependencies
                .iter()
                .map(|dep| dep.depends_on_id.as_str())
                .collect();
            let forward: Vec<&str> = self.depends_on(&issue.id).iter().map(String::as_str).collect();
            assert_eq!(listed, forward, "forward adjacency of {}", issue.id);
            for target in forward {
                assert!(
                    self.dependents(target).iter().any(|id| id == &issue.id),
                    "reverse adjacency missing {} -> {}",
                    issue.id,
                    target
                );
            }
        }
        for (target, dependents) in &self.reverse {
            for dependent in dependents {
                assert!(self.has_edge(dependent, target), "stale reverse edge {dependent} -> {target}");
            }
        }
    }
}

fn remove_from(map: &mut BTreeMap<String, Vec<String>>, key: &str, value: &str) -> bool {
    let Some(list) = map.get_mut(key) else {
        return false;
    };
    let before = list.len();
    list.retain(|item| item != value);
    let removed = list.len() != before;
    if list.is_empty() {
        map.remove(key);
    }
    removed
}
