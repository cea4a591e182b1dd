//! Content hash over an issue's user-visible fields.
//!
//! Used by import to tell "same issue, nothing changed" from "same id,
//! different content". Ids, timestamps and dependencies are not hashed.

use sha2::{Digest, Sha256};

use crate::model::Issue;

/// SHA-256 over the content fields, lowercase hex.
///
/// Each field is written followed by a NUL separator, in a fixed order.
/// Backslashes and embedded NULs are escaped first, so distinct field
/// values never encode to the same bytes.
pub fn compute_content_hash(issue: &Issue) -> String {
    let mut hasher = Sha256::new();

    let mut field = |value: &str| {
        hasher.update(escape(value).as_bytes());
        hasher.update([0u8]);
    };

    field(&issue.title);
    field(issue.description.as_deref().unwrap_or(""));
    field(issue.design.as_deref().unwrap_or(""));
    field(issue.acceptance_criteria.as_deref().unwrap_or(""));
    field(issue.notes.as_deref().unwrap_or(""));
    field(issue.spec_id.as_deref().unwrap_or(""));
    field(issue.status.as_str());
    field(&issue.priority.to_string());
    field(issue.issue_type.as_str());
    field(issue.assignee.as_deref().unwrap_or(""));
    field(issue.owner.as_deref().unwrap_or(""));
    field(issue.created_by.as_deref().unwrap_or(""));
    field(if issue.pinned { "pinned" } else { "" });

    let metadata = if issue.metadata.is_empty() {
        String::new()
    } else {
        // BTreeMap keys serialize in sorted order
        serde_json::to_string(&issue.metadata).unwrap_or_default()
    };
    field(&metadata);

    format!("{:x}", hasher.finalize())
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\0' => out.push_str("\\0"),
            other => out.push(other),
        }
    }
    out
}
