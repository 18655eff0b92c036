//! Error types for chitter-core
//!
//! Exit code scheme:
//! - 1: validation (bad identifier, bad configuration, busy session)
//! - 2: system (IO, unparseable input)
//! - 3: not found / not registered
//! - 4: turn violation (strict mode refused an out-of-order agent)
//!
//! Corrupted records and stale completion signals are deliberately absent:
//! both are absorbed where they occur and only show up in the log.

use thiserror::Error;

/// Core error type for chitter operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// Workflow or agent referenced but absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Decision or completion logged for an agent that never registered
    #[error("Agent {agent} not registered in workflow {workflow}. Register it with `agent start` first.")]
    NotRegistered { agent: String, workflow: String },

    /// Strict turn-taking refused an agent whose turn has not come
    #[error("Agent {agent} is at position {position} with {ahead} agent(s) ahead; wait for them to complete")]
    TurnViolation {
        agent: String,
        position: u64,
        ahead: usize,
    },

    /// Identifier that cannot be used as a storage key
    #[error("Invalid {kind} '{value}': {reason}")]
    InvalidIdentifier {
        kind: &'static str,
        value: String,
        reason: String,
    },

    /// A session holds at most one active workflow
    #[error("Session {session} already has active workflow {workflow}; close it or use another --session")]
    SessionBusy { session: String, workflow: String },

    /// Configuration value out of range or malformed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Filesystem failure
    #[error("IO error: {0}")]
    Io(String),

    /// Input that could not be parsed (hook payloads, config files)
    #[error("Parse error: {0}")]
    Parse(String),
}

impl Error {
    /// Create a not-found error for a workflow id.
    pub fn workflow_not_found(id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("workflow {id}"))
    }

    /// Create a not-registered error.
    pub fn not_registered(agent: impl Into<String>, workflow: impl Into<String>) -> Self {
        Self::NotRegistered {
            agent: agent.into(),
            workflow: workflow.into(),
        }
    }

    /// Exit code for this error category.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidIdentifier { .. } | Self::InvalidConfig(_) | Self::SessionBusy { .. } => 1,
            Self::Io(_) | Self::Parse(_) => 2,
            Self::NotFound(_) | Self::NotRegistered { .. } => 3,
            Self::TurnViolation { .. } => 4,
        }
    }

    /// Whether the caller should treat this as a message rather than a failure.
    pub const fn is_advisory(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::NotRegistered { .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(format!("Failed to parse config: {err}"))
    }
}

/// Result type alias for chitter-core operations
pub type Result<T> = std::result::Result<T, Error>;
