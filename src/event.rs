//! Event records for the tl log.
//!
//! Every mutation is one event: `{type, id, ts, actor, data}`. The `data`
//! payload is kind-specific and stays a raw JSON value on the record so
//! that unknown kinds and fields survive a read/write cycle untouched.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Result;
use crate::model::DependencyType;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    Create,
    Update,
    Close,
    Reopen,
    DepAdd,
    DepRemove,
    Claim,
    /// Written by a newer tool; replay skips it
    Unknown(String),
}

impl EventKind {
    pub fn parse(value: &str) -> Self {
        match value {
            "create" => EventKind::Create,
            "update" => EventKind::Update,
            "close" => EventKind::Close,
            "reopen" => EventKind::Reopen,
            "dep_add" => EventKind::DepAdd,
            "dep_remove" => EventKind::DepRemove,
            "claim" => EventKind::Claim,
            other => EventKind::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Create => "create",
            EventKind::Update => "update",
            EventKind::Close => "close",
            EventKind::Reopen => "reopen",
            EventKind::DepAdd => "dep_add",
            EventKind::DepRemove => "dep_remove",
            EventKind::Claim => "claim",
            EventKind::Unknown(value) => value,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(EventKind::parse(&value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub id: String,
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub actor: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Event {
    pub fn new(
        kind: EventKind,
        id: impl Into<String>,
        stamp: &EventStamp,
        data: serde_json::Value,
    ) -> Self {
        Self {
            kind,
            id: id.into(),
            timestamp: stamp.at,
            actor: stamp.actor.clone(),
            data,
        }
    }

    /// Decode the payload into a kind-specific struct
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        let data = if self.data.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            self.data.clone()
        };
        Ok(serde_json::from_value(data)?)
    }
}

/// Who is writing, and when
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventStamp {
    pub actor: String,
    pub at: DateTime<Utc>,
}

impl EventStamp {
    pub fn new(actor: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            actor: actor.into(),
            at,
        }
    }

    pub fn now(actor: impl Into<String>) -> Self {
        Self::new(actor, Utc::now())
    }

    /// Same actor, different time (imports keep their source timestamps)
    pub fn at(&self, at: DateTime<Utc>) -> Self {
        Self::new(self.actor.clone(), at)
    }

    pub fn create(&self, id: &str, data: &CreateData) -> Result<Event> {
        Ok(Event::new(EventKind::Create, id, self, serde_json::to_value(data)?))
    }

    pub fn update(&self, id: &str, fields: BTreeMap<String, serde_json::Value>) -> Result<Event> {
        let data = UpdateData { fields };
        Ok(Event::new(EventKind::Update, id, self, serde_json::to_value(&data)?))
    }

    pub fn close(&self, id: &str, reason: Option<&str>) -> Result<Event> {
        let data = CloseData {
            reason: reason.map(str::to_string),
        };
        Ok(Event::new(EventKind::Close, id, self, serde_json::to_value(&data)?))
    }

    pub fn reopen(&self, id: &str) -> Result<Event> {
        Ok(Event::new(
            EventKind::Reopen,
            id,
            self,
            serde_json::Value::Object(serde_json::Map::new()),
        ))
    }

    pub fn claim(&self, id: &str, agent: &str) -> Result<Event> {
        let data = ClaimData {
            agent: agent.to_string(),
        };
        Ok(Event::new(EventKind::Claim, id, self, serde_json::to_value(&data)?))
    }

    pub fn dep_add(&self, id: &str, depends_on: &str, dep_type: &DependencyType) -> Result<Event> {
        let data = DepAddData {
            depends_on_id: depends_on.to_string(),
            dep_type: dep_type.as_str().to_string(),
        };
        Ok(Event::new(EventKind::DepAdd, id, self, serde_json::to_value(&data)?))
    }

    pub fn dep_remove(&self, id: &str, depends_on: &str) -> Result<Event> {
        let data = DepRemoveData {
            depends_on_id: depends_on.to_string(),
        };
        Ok(Event::new(EventKind::DepRemove, id, self, serde_json::to_value(&data)?))
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateData {
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub issue_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub design: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub acceptance_criteria: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub spec_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub assignee: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub owner: String,
    /// Original author when it differs from the event actor (imports)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defer_until: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub pinned: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub ephemeral: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateData {
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloseData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimData {
    #[serde(default)]
    pub agent: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepAddData {
    pub depends_on_id: String,
    #[serde(default)]
    pub dep_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepRemoveData {
    pub depends_on_id: String,
}
