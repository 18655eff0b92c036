//! chitter-core - file-based coordination for short-lived agent processes
//!
//! Agents run as independent processes with no shared memory, so every
//! piece of coordination state lives in a [`Store`] on disk and every
//! read-modify-write cycle happens under a per-session file lock.
//!
//! This crate provides:
//! - Durable store and session lock
//! - Session queue with turn computation
//! - Decision extraction from agent output
//! - Conflict detection across agents
//! - Coordination artifact rendering
//! - Workflow registry and the hook-level coordinator

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod conflict;
pub mod coordinator;
pub mod error;
pub mod extract;
pub mod ids;
pub mod lock;
pub mod queue;
pub mod registry;
pub mod render;
pub mod store;
pub mod workflow;

pub use config::{load_config, Config, CoordinationMode};
pub use conflict::{detect_conflicts, Conflict, ConflictKind, Severity};
pub use coordinator::{unavailable_verdict, AfterOutcome, AfterWork, BeforeWork, Coordinator, Verdict, VerdictKind};
pub use error::{Error, Result};
pub use extract::{extract_decisions, AgentOutput, ExtractedDecision};
pub use ids::{AgentId, SessionId, WorkflowId};
pub use queue::{QueueEngine, QueueEntry, QueueStatus, SessionQueue};
pub use registry::{
    AgentRegistration, ClosureSummary, Completion, Progress, ReviewReport, StatusReport,
    SweepReport, WorkflowRegistry,
};
pub use store::Store;
pub use workflow::{Agent, AgentStatus, Decision, DecisionType, Origin, Workflow, WorkflowStatus};
