//! Issue model for tl.
//!
//! Statuses, issue types and dependency types are open vocabularies: the
//! well-known values get their own variants, anything else is carried as
//! `Other(String)` and round-trips through JSON unchanged.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Default priority for new issues (0 = highest)
pub const DEFAULT_PRIORITY: i32 = 2;

macro_rules! string_enum_serde {
    ($ty:ident) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let value = String::deserialize(deserializer)?;
                Ok($ty::parse(&value))
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// Workflow state of an issue
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Status {
    #[default]
    Open,
    InProgress,
    Blocked,
    Deferred,
    Closed,
    Pinned,
    Hooked,
    Other(String),
}

impl Status {
    pub fn parse(value: &str) -> Self {
        match value {
            "open" => Status::Open,
            "in_progress" => Status::InProgress,
            "blocked" => Status::Blocked,
            "deferred" => Status::Deferred,
            "closed" => Status::Closed,
            "pinned" => Status::Pinned,
            "hooked" => Status::Hooked,
            other => Status::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Status::Open => "open",
            Status::InProgress => "in_progress",
            Status::Blocked => "blocked",
            Status::Deferred => "deferred",
            Status::Closed => "closed",
            Status::Pinned => "pinned",
            Status::Hooked => "hooked",
            Status::Other(value) => value,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Status::Other(_))
    }

    /// Statuses that keep dependents from being ready
    pub fn blocks_ready(&self) -> bool {
        matches!(self, Status::Open | Status::InProgress | Status::Blocked)
    }

    /// Statuses reachable from `self` in one step, excluding `self`.
    ///
    /// `pinned` and `hooked` have no outgoing transitions; they are only
    /// entered or left by replaying history written elsewhere.
    pub fn allowed_transitions(&self) -> Option<&'static [Status]> {
        const FROM_OPEN: &[Status] = &[
            Status::InProgress,
            Status::Blocked,
            Status::Deferred,
            Status::Closed,
        ];
        const FROM_IN_PROGRESS: &[Status] = &[Status::Open, Status::Blocked, Status::Closed];
        const FROM_BLOCKED: &[Status] = &[Status::Open, Status::InProgress, Status::Closed];
        const FROM_DEFERRED: &[Status] = &[Status::Open];
        const FROM_CLOSED: &[Status] = &[Status::Open];

        match self {
            Status::Open => Some(FROM_OPEN),
            Status::InProgress => Some(FROM_IN_PROGRESS),
            Status::Blocked => Some(FROM_BLOCKED),
            Status::Deferred => Some(FROM_DEFERRED),
            Status::Closed => Some(FROM_CLOSED),
            Status::Pinned | Status::Hooked => Some(&[]),
            Status::Other(_) => None,
        }
    }
}

string_enum_serde!(Status);

/// Check that `id` may move from `from` to `to`.
pub fn validate_transition(id: &str, from: &Status, to: &Status) -> Result<()> {
    if from == to {
        return Ok(());
    }
    let rejected = || Error::InvalidTransition {
        id: id.to_string(),
        from: from.to_string(),
        to: to.to_string(),
    };
    let allowed = from.allowed_transitions().ok_or_else(rejected)?;
    if allowed.contains(to) {
        Ok(())
    } else {
        Err(rejected())
    }
}

/// Category of work
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum IssueType {
    Bug,
    Feature,
    #[default]
    Task,
    Epic,
    Chore,
    Decision,
    Other(String),
}

impl IssueType {
    pub fn parse(value: &str) -> Self {
        match value {
            "" | "task" => IssueType::Task,
            "bug" => IssueType::Bug,
            "feature" => IssueType::Feature,
            "epic" => IssueType::Epic,
            "chore" => IssueType::Chore,
            "decision" => IssueType::Decision,
            other => IssueType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            IssueType::Bug => "bug",
            IssueType::Feature => "feature",
            IssueType::Task => "task",
            IssueType::Epic => "epic",
            IssueType::Chore => "chore",
            IssueType::Decision => "decision",
            IssueType::Other(value) => value,
        }
    }
}

string_enum_serde!(IssueType);

/// Kind of relation between two issues
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum DependencyType {
    #[default]
    Blocks,
    ParentChild,
    ConditionalBlocks,
    WaitsFor,
    Related,
    DiscoveredFrom,
    Other(String),
}

impl DependencyType {
    pub fn parse(value: &str) -> Self {
        match value {
            "" | "blocks" => DependencyType::Blocks,
            "parent-child" => DependencyType::ParentChild,
            "conditional-blocks" => DependencyType::ConditionalBlocks,
            "waits-for" => DependencyType::WaitsFor,
            "related" => DependencyType::Related,
            "discovered-from" => DependencyType::DiscoveredFrom,
            other => DependencyType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DependencyType::Blocks => "blocks",
            DependencyType::ParentChild => "parent-child",
            DependencyType::ConditionalBlocks => "conditional-blocks",
            DependencyType::WaitsFor => "waits-for",
            DependencyType::Related => "related",
            DependencyType::DiscoveredFrom => "discovered-from",
            DependencyType::Other(value) => value,
        }
    }

    /// Only these edge types participate in readiness
    pub fn affects_ready_work(&self) -> bool {
        matches!(
            self,
            DependencyType::Blocks
                | DependencyType::ParentChild
                | DependencyType::ConditionalBlocks
                | DependencyType::WaitsFor
        )
    }
}

string_enum_serde!(DependencyType);

fn is_false(value: &bool) -> bool {
    !*value
}

/// A directed edge `issue_id -> depends_on_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub issue_id: String,
    pub depends_on_id: String,
    #[serde(rename = "type", default)]
    pub dep_type: DependencyType,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

/// A work item as materialized by replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptance_criteria: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_id: Option<String>,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub issue_type: IssueType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defer_until: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub pinned: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub ephemeral: bool,
    /// Fields this model does not know about, kept for round-tripping
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Issue {
    /// A fresh open issue with both timestamps at `at`
    pub fn new(id: impl Into<String>, title: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            design: None,
            acceptance_criteria: None,
            notes: None,
            spec_id: None,
            status: Status::Open,
            priority: DEFAULT_PRIORITY,
            issue_type: IssueType::Task,
            assignee: None,
            owner: None,
            created_by: None,
            created_at: at,
            updated_at: at,
            closed_at: None,
            close_reason: None,
            defer_until: None,
            labels: Vec::new(),
            dependencies: Vec::new(),
            pinned: false,
            ephemeral: false,
            metadata: BTreeMap::new(),
        }
    }

    pub fn depends_on(&self, target: &str) -> bool {
        self.dependencies.iter().any(|dep| dep.depends_on_id == target)
    }
}

/// Empty strings mean "unset" for optional text fields
pub(crate) fn non_empty(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_round_trips() {
        let status: Status = serde_json::from_str("\"waiting_on_vendor\"").expect("parse");
        assert_eq!(status, Status::Other("waiting_on_vendor".to_string()));
        assert_eq!(
            serde_json::to_string(&status).expect("serialize"),
            "\"waiting_on_vendor\""
        );
        assert!(!status.is_known());
    }

    #[test]
    fn unknown_dependency_type_does_not_affect_readiness() {
        let dep_type = DependencyType::parse("tracks");
        assert_eq!(dep_type.as_str(), "tracks");
        assert!(!dep_type.affects_ready_work());
        assert!(DependencyType::parse("waits-for").affects_ready_work());
        assert!(!DependencyType::Related.affects_ready_work());
    }

    #[test]
    fn transitions_follow_table() {
        assert!(validate_transition("tl-1", &Status::Open, &Status::Closed).is_ok());
        assert!(validate_transition("tl-1", &Status::Closed, &Status::Open).is_ok());
        assert!(validate_transition("tl-1", &Status::Deferred, &Status::Open).is_ok());
        assert!(validate_transition("tl-1", &Status::Closed, &Status::Closed).is_ok());

        let err = validate_transition("tl-1", &Status::Deferred, &Status::Closed)
            .expect_err("deferred cannot close directly");
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }

    #[test]
    fn pinned_and_hooked_have_no_transitions() {
        for from in [Status::Pinned, Status::Hooked] {
            for to in [Status::Open, Status::InProgress, Status::Closed] {
                assert!(validate_transition("tl-1", &from, &to).is_err());
            }
        }
    }

    #[test]
    fn unknown_from_status_is_rejected() {
        let from = Status::Other("mystery".to_string());
        assert!(validate_transition("tl-1", &from, &Status::Open).is_err());
        assert!(validate_transition("tl-1", &from, &from.clone()).is_ok());
    }

    #[test]
    fn issue_metadata_skipped_when_empty() {
        let issue = Issue::new("tl-a", "Title", Utc::now());
        let json = serde_json::to_value(&issue).expect("serialize");
        assert!(json.get("metadata").is_none());
        assert!(json.get("pinned").is_none());
        assert_eq!(json["status"], "open");
    }
}
