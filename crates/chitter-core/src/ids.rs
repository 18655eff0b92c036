//! Validated identifiers
//!
//! Every identifier doubles as a file name in the store, so names must:
//! - Be 1-128 characters long
//! - Contain only ASCII alphanumeric, dash, underscore, or dot
//! - Not start with a dot or dash

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

const MAX_ID_LEN: usize = 128;

fn validate(kind: &'static str, value: &str) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidIdentifier {
        kind,
        value: value.to_string(),
        reason: reason.to_string(),
    };

    if value.is_empty() || value.len() > MAX_ID_LEN {
        return Err(invalid("must be 1-128 characters"));
    }
    if value.starts_with('.') || value.starts_with('-') {
        return Err(invalid("cannot start with '.' or '-'"));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(invalid(
            "must contain only ASCII alphanumeric, '-', '_', or '.'",
        ));
    }
    Ok(())
}

/// Map an arbitrary host string onto the identifier alphabet.
fn sanitize(raw: &str) -> String {
    let mapped: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .take(MAX_ID_LEN)
        .collect();
    let trimmed = mapped.trim_start_matches(['.', '-']);
    if trimmed.is_empty() {
        "unknown".to_string()
    } else {
        trimmed.to_string()
    }
}

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create a validated identifier
            ///
            /// # Errors
            ///
            /// Returns `InvalidIdentifier` if the value is not a safe file name
            pub fn new(id: impl Into<String>) -> Result<Self> {
                let id = id.into();
                validate($kind, &id)?;
                Ok(Self(id))
            }

            /// Build an identifier from untrusted host input, never failing
            #[must_use]
            pub fn from_host(raw: &str) -> Self {
                Self(sanitize(raw))
            }

            /// Get the ID as a string slice
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = Error;

            fn try_from(value: String) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Self::new(s)
            }
        }
    };
}

identifier!(
    /// Coordination session identifier
    SessionId,
    "session id"
);

identifier!(
    /// Agent identifier, unique within a session
    AgentId,
    "agent id"
);

identifier!(
    /// Workflow identifier
    WorkflowId,
    "workflow id"
);

impl WorkflowId {
    /// Generate a fresh short workflow id
    #[must_use]
    pub fn generate() -> Self {
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        Self(uuid.chars().take(8).collect())
    }
}

impl AgentId {
    /// Derive an agent id from what the agent was asked to do, for hook
    /// calls that carry no host call id. Identical tasks hash alike.
    #[must_use]
    pub fn fingerprint(role: &str, task: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(role.as_bytes());
        hasher.update(b"\n");
        hasher.update(task.as_bytes());
        let digest = hex::encode(hasher.finalize());
        let prefix = sanitize(role);
        let prefix: String = prefix.chars().take(40).collect();
        Self(format!("{prefix}-{}", &digest[..12]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_validation() {
        assert!(SessionId::new("s1").is_ok());
        assert!(SessionId::new("abc-123_def.x").is_ok());
        assert!(AgentId::new("frontend-001").is_ok());

        assert!(SessionId::new("").is_err());
        assert!(SessionId::new(".hidden").is_err());
        assert!(SessionId::new("-flag").is_err());
        assert!(SessionId::new("has/slash").is_err());
        assert!(SessionId::new("has space").is_err());
        assert!(SessionId::new("a".repeat(129)).is_err());
    }

    #[test]
    fn test_from_host_never_fails() {
        assert_eq!(SessionId::from_host("").as_str(), "unknown");
        assert_eq!(SessionId::from_host("../../etc").as_str(), "etc");
        assert_eq!(SessionId::from_host("a b/c").as_str(), "a-b-c");
        assert!(SessionId::new(SessionId::from_host("💥 weird id").as_str()).is_ok());
    }

    #[test]
    fn test_fingerprint_is_stable_and_task_sensitive() {
        let a = AgentId::fingerprint("backend", "Build the login API");
        let b = AgentId::fingerprint("backend", "Build the login API");
        let c = AgentId::fingerprint("backend", "Build the signup API");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.as_str().starts_with("backend-"));
        assert!(AgentId::new(a.as_str()).is_ok());
    }

    #[test]
    fn test_generated_workflow_id_is_valid() {
        let id = WorkflowId::generate();
        assert_eq!(id.as_str().len(), 8);
        assert!(WorkflowId::new(id.as_str()).is_ok());
    }

    #[test]
    fn test_serde_rejects_invalid_ids() {
        let bad: std::result::Result<SessionId, _> = serde_json::from_str("\"../x\"");
        assert!(bad.is_err());
        let good: std::result::Result<SessionId, _> = serde_json::from_str("\"s1\"");
        assert!(good.is_ok());
    }
}
