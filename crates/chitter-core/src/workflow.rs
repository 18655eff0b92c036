//! Workflow aggregate types
//!
//! A workflow groups the agents of one session, their decisions and their
//! completion summaries. Values are rebuilt on every load-modify-save cycle;
//! the `with_*` methods return updated copies.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::ids::{AgentId, SessionId, WorkflowId};

/// Lifecycle of a workflow: active → reviewing → (deleted on close)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkflowStatus {
    Active,
    Reviewing,
    Closed,
}

/// Who created a workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Origin {
    /// Explicit `workflow start` operation
    Operation,
    /// Auto-created by the before-work hook
    Hook,
}

/// Lifecycle of an agent inside a workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AgentStatus {
    /// Registered through the operation interface, no queue involvement
    Working,
    Queued,
    Running,
    Blocked,
    Complete,
}

impl AgentStatus {
    /// Agents that are currently doing (or waiting to do) work
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Working | Self::Running)
    }
}

/// Category of a decision
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DecisionType {
    Architecture,
    Approach,
    Api,
    DataModel,
    Interface,
    Dependency,
    Other,
}

/// A choice made by an agent, meant to inform later agents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    #[serde(rename = "type")]
    pub kind: DecisionType,
    #[serde(rename = "decision")]
    pub text: String,
    #[serde(default)]
    pub rationale: String,
    pub timestamp: DateTime<Utc>,
}

impl Decision {
    #[must_use]
    pub fn new(kind: DecisionType, text: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            rationale: rationale.into(),
            timestamp: Utc::now(),
        }
    }
}

/// One agent's record inside a workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub task: String,
    pub role: String,
    pub status: AgentStatus,
    #[serde(default)]
    pub areas_of_concern: BTreeSet<String>,
    #[serde(default)]
    pub decisions: Vec<Decision>,
    #[serde(default)]
    pub files_modified: BTreeSet<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_excerpt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
}

impl Agent {
    #[must_use]
    pub fn new(role: impl Into<String>, task: impl Into<String>, status: AgentStatus) -> Self {
        Self {
            task: task.into(),
            role: role.into(),
            status,
            areas_of_concern: BTreeSet::new(),
            decisions: Vec::new(),
            files_modified: BTreeSet::new(),
            started_at: Utc::now(),
            completed_at: None,
            summary: None,
            output_excerpt: None,
            call_id: None,
        }
    }

    #[must_use]
    pub fn with_areas<I, S>(mut self, areas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.areas_of_concern
            .extend(areas.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_call_id(mut self, call_id: Option<String>) -> Self {
        self.call_id = call_id;
        self
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self.status, AgentStatus::Complete)
    }
}

/// Aggregate record of a session's agents, decisions and summaries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(rename = "workflow_id")]
    pub id: WorkflowId,
    pub session_id: SessionId,
    pub description: String,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Origin,
    #[serde(default)]
    pub agents_planned: Vec<String>,
    #[serde(default)]
    pub agents: BTreeMap<AgentId, Agent>,
}

impl Workflow {
    #[must_use]
    pub fn new(
        session_id: SessionId,
        description: impl Into<String>,
        agents_planned: Vec<String>,
        created_by: Origin,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: WorkflowId::generate(),
            session_id,
            description: description.into(),
            status: WorkflowStatus::Active,
            created_at: now,
            updated_at: now,
            created_by,
            agents_planned,
            agents: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn agent(&self, id: &AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    /// Insert or replace an agent record
    #[must_use]
    pub fn with_agent(mut self, id: AgentId, agent: Agent) -> Self {
        self.agents.insert(id, agent);
        self.updated_at = Utc::now();
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: WorkflowStatus) -> Self {
        self.status = status;
        self.updated_at = Utc::now();
        self
    }

    /// Agents working or running, in id order
    pub fn active_agents(&self) -> impl Iterator<Item = (&AgentId, &Agent)> {
        self.agents.iter().filter(|(_, a)| a.status.is_active())
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.agents.values().filter(|a| a.is_complete()).count()
    }

    #[must_use]
    pub fn decision_count(&self) -> usize {
        self.agents.values().map(|a| a.decisions.len()).sum()
    }

    /// Unique modified files across all agents
    #[must_use]
    pub fn unique_files(&self) -> BTreeSet<&str> {
        self.agents
            .values()
            .flat_map(|a| a.files_modified.iter().map(String::as_str))
            .collect()
    }

    /// Whether the workflow was created before `cutoff`
    #[must_use]
    pub fn is_older_than(&self, cutoff: DateTime<Utc>) -> bool {
        self.created_at < cutoff
    }
}
