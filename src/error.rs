//! Error types for tl
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown issue, missing store)
//! - 3: Rejected (lock contention, invalid transition, dependency cycle)
//! - 4: Operation failed (I/O, corrupted log)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the tl CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const REJECTED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for tl operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("not found: {0}")]
    NotFound(String),

    #[error("no .tl directory found from {0} (run tl init)")]
    NoStore(PathBuf),

    #[error("{0} exists but is not a directory")]
    InvalidStore(PathBuf),

    #[error("already initialized at {0}")]
    AlreadyInitialized(PathBuf),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Rejected mutations (exit code 3)
    #[error("dependency would create a cycle: {issue} -> {depends_on}")]
    Cycle { issue: String, depends_on: String },

    #[error("cannot depend on self: {0}")]
    SelfDependency(String),

    #[error("invalid transition for {id}: {from} -> {to}")]
    InvalidTransition { id: String, from: String, to: String },

    #[error("lock busy, retry: {0}")]
    LockBusy(PathBuf),

    // Operation failures (exit code 4)
    #[error("{path}:{line}: corrupted events log: {reason}")]
    Corruption {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::NotFound(_)
            | Error::NoStore(_)
            | Error::InvalidStore(_)
            | Error::AlreadyInitialized(_)
            | Error::InvalidArgument(_)
            | Error::InvalidConfig(_) => exit_codes::USER_ERROR,

            Error::Cycle { .. }
            | Error::SelfDependency(_)
            | Error::InvalidTransition { .. }
            | Error::LockBusy(_) => exit_codes::REJECTED,

            Error::Corruption { .. }
            | Error::Git(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Short machine-readable name for the error class
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::NoStore(_) => "no_store",
            Error::InvalidStore(_) => "invalid_store",
            Error::AlreadyInitialized(_) => "already_initialized",
            Error::InvalidArgument(_) => "invalid_argument",
            Error::InvalidConfig(_) => "invalid_config",
            Error::Cycle { .. } | Error::SelfDependency(_) => "cycle",
            Error::InvalidTransition { .. } => "invalid_transition",
            Error::LockBusy(_) => "lock_busy",
            Error::Corruption { .. } => "corruption",
            Error::Git(_) | Error::Io(_) | Error::Json(_) | Error::TomlParse(_) | Error::TomlSerialize(_) => {
                "operation_failed"
            }
        }
    }

    /// Whether a caller may reasonably retry the same request later
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::LockBusy(_))
    }

    /// Structured fields for JSON error output
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::NotFound(id) => Some(serde_json::json!({ "id": id })),
            Error::Cycle { issue, depends_on } => Some(serde_json::json!({
                "issue": issue,
                "depends_on": depends_on,
            })),
            Error::SelfDependency(id) => Some(serde_json::json!({ "issue": id, "depends_on": id })),
            Error::InvalidTransition { id, from, to } => Some(serde_json::json!({
                "id": id,
                "from": from,
                "to": to,
            })),
            Error::LockBusy(path) => Some(serde_json::json!({ "lock": path })),
            Error::Corruption { path, line, .. } => Some(serde_json::json!({
                "path": path,
                "line": line,
            })),
            Error::InvalidConfig(message) => Some(serde_json::json!({ "message": message })),
            _ => None,
        }
    }
}

/// Result type alias for tl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            kind: err.kind(),
            details: err.details(),
        }
    }
}
