//! Workflow registry: lifecycle operations over the Workflow aggregate
//!
//! Every mutation is a load-modify-save cycle inside the owning session's
//! lock. Reads (`status`, lookups) go straight to the store.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::{
    conflict::{detect_conflicts, Conflict},
    ids::{AgentId, SessionId, WorkflowId},
    queue::QueueStatus,
    store::Store,
    workflow::{Agent, AgentStatus, Decision, DecisionType, Origin, Workflow, WorkflowStatus},
    Error, Result,
};

/// Characters of raw agent output kept on the agent record
pub const OUTPUT_EXCERPT_CHARS: usize = 2000;

/// What an agent declares when it registers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRegistration {
    pub role: String,
    pub task: String,
    pub areas: Vec<String>,
    pub status: AgentStatus,
    pub call_id: Option<String>,
}

impl AgentRegistration {
    /// Registration through the operation interface
    #[must_use]
    pub fn working(role: impl Into<String>, task: impl Into<String>, areas: Vec<String>) -> Self {
        Self {
            role: role.into(),
            task: task.into(),
            areas,
            status: AgentStatus::Working,
            call_id: None,
        }
    }
}

/// What an agent reports when it finishes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub summary: Option<String>,
    pub files_modified: Vec<String>,
    pub decisions: Vec<Decision>,
    pub output_excerpt: Option<String>,
}

/// Insert a new agent, or refresh an existing one.
///
/// Re-registration replaces the task text and unions the areas; decisions,
/// files and status of the existing record are kept.
pub(crate) fn upsert_agent(workflow: Workflow, id: &AgentId, registration: AgentRegistration) -> Workflow {
    let agent = match workflow.agent(id) {
        Some(existing) => {
            let mut agent = existing.clone().with_areas(registration.areas);
            agent.task = registration.task;
            if registration.call_id.is_some() {
                agent.call_id = registration.call_id;
            }
            agent
        }
        None => Agent::new(registration.role, registration.task, registration.status)
            .with_areas(registration.areas)
            .with_call_id(registration.call_id),
    };
    workflow.with_agent(id.clone(), agent)
}

/// Mark a registered agent complete, folding in what it reported
pub(crate) fn complete_agent(workflow: Workflow, id: &AgentId, completion: Completion) -> Result<Workflow> {
    let mut agent = workflow
        .agent(id)
        .cloned()
        .ok_or_else(|| Error::not_registered(id.as_str(), workflow.id.as_str()))?;

    agent.status = AgentStatus::Complete;
    agent.completed_at = Some(Utc::now());
    if completion.summary.is_some() {
        agent.summary = completion.summary;
    }
    agent.files_modified.extend(completion.files_modified);
    agent.decisions.extend(completion.decisions);
    if let Some(output) = completion.output_excerpt {
        agent.output_excerpt = Some(output.chars().take(OUTPUT_EXCERPT_CHARS).collect());
    }
    Ok(workflow.with_agent(id.clone(), agent))
}

/// Completion progress after `complete`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub registered: usize,
    pub planned: usize,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} agents complete", self.completed, self.planned.max(self.registered))
    }
}

/// Per-agent line of a review report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentReview {
    pub agent_id: AgentId,
    pub role: String,
    pub status: AgentStatus,
    pub summary: Option<String>,
}

/// Decision attributed to the agent that made it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributedDecision {
    pub agent_id: AgentId,
    #[serde(rename = "type")]
    pub kind: DecisionType,
    pub decision: String,
}

/// Result of `review`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewReport {
    pub workflow_id: WorkflowId,
    pub description: String,
    pub planned: usize,
    pub registered: usize,
    pub completed: usize,
    pub agents: Vec<AgentReview>,
    pub decisions: Vec<AttributedDecision>,
    pub files_modified: Vec<String>,
    pub conflicts: Vec<Conflict>,
}

impl ReviewReport {
    fn from_workflow(workflow: &Workflow) -> Self {
        Self {
            workflow_id: workflow.id.clone(),
            description: workflow.description.clone(),
            planned: workflow.agents_planned.len(),
            registered: workflow.agents.len(),
            completed: workflow.completed_count(),
            agents: workflow
                .agents
                .iter()
                .map(|(id, a)| AgentReview {
                    agent_id: id.clone(),
                    role: a.role.clone(),
                    status: a.status,
                    summary: a.summary.clone(),
                })
                .collect(),
            decisions: workflow
                .agents
                .iter()
                .flat_map(|(id, a)| {
                    a.decisions.iter().map(move |d| AttributedDecision {
                        agent_id: id.clone(),
                        kind: d.kind,
                        decision: d.text.clone(),
                    })
                })
                .collect(),
            files_modified: workflow.unique_files().into_iter().map(str::to_string).collect(),
            conflicts: detect_conflicts(&workflow.agents),
        }
    }
}

impl fmt::Display for ReviewReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Workflow Review: {}", self.workflow_id)?;
        writeln!(f, "\n## Goal\n{}", self.description)?;
        writeln!(
            f,
            "\n## Agents ({} of {} complete, {} planned)",
            self.completed, self.registered, self.planned
        )?;
        for agent in &self.agents {
            writeln!(
                f,
                "- **{}** ({}, {}): {}",
                agent.agent_id,
                agent.role,
                agent.status,
                agent.summary.as_deref().unwrap_or("No summary")
            )?;
        }
        writeln!(f, "\n## Decisions ({} total)", self.decisions.len())?;
        for d in &self.decisions {
            writeln!(f, "- [{}] {} ({})", d.kind, d.decision, d.agent_id)?;
        }
        writeln!(f, "\n## Files Modified ({} unique)", self.files_modified.len())?;
        for file in &self.files_modified {
            writeln!(f, "- {file}")?;
        }
        if self.conflicts.is_empty() {
            writeln!(f, "\n## No Conflicts Detected")?;
        } else {
            writeln!(f, "\n## Conflicts Detected ({})", self.conflicts.len())?;
            for c in &self.conflicts {
                writeln!(f, "- [{}] **{}**: {}", c.severity, c.kind, c.message)?;
            }
        }
        write!(f, "\n---\nClose with `chitter workflow close {}` when done reviewing.", self.workflow_id)
    }
}

/// Result of `close`; returned to the caller and never persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClosureSummary {
    pub workflow_id: WorkflowId,
    pub description: String,
    pub agents_count: usize,
    pub decisions_count: usize,
    pub files_modified: Vec<String>,
    pub conflicts_found: usize,
    pub resolution_notes: String,
    pub closed_at: DateTime<Utc>,
}

impl fmt::Display for ClosureSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Workflow {} closed.", self.workflow_id)?;
        writeln!(f)?;
        writeln!(f, "Summary:")?;
        writeln!(f, "- Agents: {}", self.agents_count)?;
        writeln!(f, "- Decisions logged: {}", self.decisions_count)?;
        writeln!(f, "- Files modified: {}", self.files_modified.len())?;
        writeln!(f, "- Conflicts found: {}", self.conflicts_found)?;
        if !self.resolution_notes.is_empty() {
            writeln!(f, "- Resolution: {}", self.resolution_notes)?;
        }
        write!(f, "\nWorkflow state cleared.")
    }
}

/// One active workflow in a status listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowOverview {
    pub workflow_id: WorkflowId,
    pub session_id: SessionId,
    pub description: String,
    pub status: WorkflowStatus,
    pub completed: usize,
    pub registered: usize,
    pub planned: usize,
    pub created_at: DateTime<Utc>,
    /// (agent id, complete?, task)
    pub agents: Vec<(AgentId, bool, String)>,
}

/// Result of `status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub workflows: Vec<WorkflowOverview>,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.workflows.is_empty() {
            return write!(f, "No active workflows. Start one with `chitter workflow start`.");
        }
        write!(f, "# Active Workflows ({})", self.workflows.len())?;
        for wf in &self.workflows {
            writeln!(f)?;
            writeln!(f, "\n## {}", wf.workflow_id)?;
            writeln!(f, "**Goal:** {}", wf.description)?;
            writeln!(f, "**Session:** {}", wf.session_id)?;
            writeln!(f, "**Status:** {}", wf.status)?;
            writeln!(
                f,
                "**Agents:** {}/{} complete ({} planned)",
                wf.completed, wf.registered, wf.planned
            )?;
            write!(f, "**Created:** {}", wf.created_at.to_rfc3339())?;
            if !wf.agents.is_empty() {
                write!(f, "\n\n**Registered agents:**")?;
                for (id, done, task) in &wf.agents {
                    let mark = if *done { "✓" } else { "⋯" };
                    write!(f, "\n- {mark} {id}: {task}")?;
                }
            }
        }
        Ok(())
    }
}

/// Result of a retention sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub workflows_removed: usize,
    pub queues_removed: usize,
}

// ═══════════════════════════════════════════════════════════════════════════
// REGISTRY
// ═══════════════════════════════════════════════════════════════════════════

/// Workflow lifecycle operations bound to a store
#[derive(Debug, Clone, Copy)]
pub struct WorkflowRegistry<'a> {
    store: &'a Store,
}

impl<'a> WorkflowRegistry<'a> {
    #[must_use]
    pub const fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Load a workflow or fail with `NotFound`
    pub fn get(&self, id: &WorkflowId) -> Result<Workflow> {
        self.store
            .load_workflow(id)?
            .ok_or_else(|| Error::workflow_not_found(id))
    }

    /// Load-modify-save a workflow under its session lock
    fn update<T>(
        &self,
        id: &WorkflowId,
        f: impl FnOnce(Workflow) -> Result<(Workflow, T)>,
    ) -> Result<T> {
        let session = self.get(id)?.session_id;
        self.store.with_lock(&session, |store| {
            let workflow = store
                .load_workflow(id)?
                .ok_or_else(|| Error::workflow_not_found(id))?;
            let (workflow, out) = f(workflow)?;
            store.save_workflow(&workflow)?;
            Ok(out)
        })
    }

    /// Create a workflow in status active.
    ///
    /// # Errors
    ///
    /// `SessionBusy` when the session already has an active workflow.
    pub fn start(
        &self,
        session: &SessionId,
        description: &str,
        agents_planned: Vec<String>,
        origin: Origin,
    ) -> Result<Workflow> {
        let workflow = Workflow::new(session.clone(), description, agents_planned, origin);
        self.store.with_lock(session, |store| {
            if let Some(active) = store.find_active_workflow(session)? {
                return Err(Error::SessionBusy {
                    session: session.to_string(),
                    workflow: active.id.to_string(),
                });
            }
            store.save_workflow(&workflow)
        })?;
        tracing::info!(
            workflow = %workflow.id,
            session = %session,
            created_by = %origin,
            "workflow started"
        );
        Ok(workflow)
    }

    /// Register (or refresh) an agent; the workflow must exist
    pub fn register_agent(
        &self,
        id: &WorkflowId,
        agent_id: &AgentId,
        registration: AgentRegistration,
    ) -> Result<Workflow> {
        let workflow = self.update(id, |wf| {
            let wf = upsert_agent(wf, agent_id, registration);
            Ok((wf.clone(), wf))
        })?;
        tracing::info!(workflow = %id, agent = %agent_id, "agent registered");
        Ok(workflow)
    }

    /// Append a decision to a registered agent
    pub fn log_decision(
        &self,
        id: &WorkflowId,
        agent_id: &AgentId,
        kind: DecisionType,
        text: &str,
        rationale: &str,
    ) -> Result<Decision> {
        let decision = Decision::new(kind, text, rationale);
        self.update(id, |wf| {
            let mut agent = wf
                .agent(agent_id)
                .cloned()
                .ok_or_else(|| Error::not_registered(agent_id.as_str(), id.as_str()))?;
            agent.decisions.push(decision.clone());
            Ok((wf.with_agent(agent_id.clone(), agent), ()))
        })?;
        tracing::info!(workflow = %id, agent = %agent_id, kind = %kind, "decision logged");
        Ok(decision)
    }

    /// Mark a registered agent complete.
    ///
    /// If the agent also holds a running queue entry in the workflow's
    /// session, that entry is completed in the same critical section.
    pub fn complete(&self, id: &WorkflowId, agent_id: &AgentId, completion: Completion) -> Result<Progress> {
        let session = self.get(id)?.session_id;
        let progress = self.store.with_lock(&session, |store| {
            let workflow = store
                .load_workflow(id)?
                .ok_or_else(|| Error::workflow_not_found(id))?;
            let workflow = complete_agent(workflow, agent_id, completion)?;
            store.save_workflow(&workflow)?;

            if let Some(queue) = store.load_queue(&session)? {
                if queue.find(agent_id).is_some() {
                    let (queue, accepted) = queue.transition(agent_id, QueueStatus::Complete);
                    if accepted {
                        store.save_queue(&queue)?;
                    } else {
                        tracing::info!(session = %session, agent = %agent_id, "stale completion dropped");
                    }
                }
            }

            Ok(Progress {
                completed: workflow.completed_count(),
                registered: workflow.agents.len(),
                planned: workflow.agents_planned.len(),
            })
        })?;
        tracing::info!(workflow = %id, agent = %agent_id, completed = progress.completed, "agent complete");
        Ok(progress)
    }

    /// Move to reviewing and report decisions, files and conflicts
    pub fn review(&self, id: &WorkflowId) -> Result<ReviewReport> {
        let report = self.update(id, |wf| {
            let wf = wf.with_status(WorkflowStatus::Reviewing);
            let report = ReviewReport::from_workflow(&wf);
            Ok((wf, report))
        })?;
        tracing::info!(workflow = %id, conflicts = report.conflicts.len(), "workflow under review");
        Ok(report)
    }

    /// Summarise and delete the workflow.
    ///
    /// The session's queue and artifact go with it once no other workflow
    /// of that session remains.
    pub fn close(&self, id: &WorkflowId, resolution_notes: &str) -> Result<ClosureSummary> {
        let session = self.get(id)?.session_id;
        let summary = self.store.with_lock(&session, |store| {
            let workflow = store
                .load_workflow(id)?
                .ok_or_else(|| Error::workflow_not_found(id))?;
            let summary = ClosureSummary {
                workflow_id: workflow.id.clone(),
                description: workflow.description.clone(),
                agents_count: workflow.agents.len(),
                decisions_count: workflow.decision_count(),
                files_modified: workflow.unique_files().into_iter().map(str::to_string).collect(),
                conflicts_found: detect_conflicts(&workflow.agents).len(),
                resolution_notes: resolution_notes.to_string(),
                closed_at: Utc::now(),
            };
            store.delete_workflow(id)?;
            release_session_if_idle(store, &session)?;
            Ok(summary)
        })?;
        tracing::info!(workflow = %id, agents = summary.agents_count, "workflow closed");
        Ok(summary)
    }

    /// Active workflows across all sessions
    pub fn status(&self) -> Result<StatusReport> {
        let workflows = self
            .store
            .list_workflows()?
            .into_iter()
            .filter(|wf| wf.status == WorkflowStatus::Active)
            .map(|wf| WorkflowOverview {
                completed: wf.completed_count(),
                registered: wf.agents.len(),
                planned: wf.agents_planned.len(),
                agents: wf
                    .agents
                    .iter()
                    .map(|(id, a)| (id.clone(), a.is_complete(), a.task.clone()))
                    .collect(),
                workflow_id: wf.id,
                session_id: wf.session_id,
                description: wf.description,
                status: wf.status,
                created_at: wf.created_at,
            })
            .collect();
        Ok(StatusReport { workflows })
    }

    /// Delete workflows created before `now - retention`, then orphaned
    /// queues idle for as long. Corrupted records are removed by the
    /// listing itself.
    pub fn sweep(&self, retention: Duration) -> Result<SweepReport> {
        let cutoff = Utc::now() - retention;
        let mut report = SweepReport::default();

        for stale in self
            .store
            .list_workflows()?
            .into_iter()
            .filter(|wf| wf.is_older_than(cutoff))
        {
            let removed = self.store.with_lock(&stale.session_id, |store| {
                let still_stale = store
                    .load_workflow(&stale.id)?
                    .is_some_and(|wf| wf.is_older_than(cutoff));
                if still_stale {
                    store.delete_workflow(&stale.id)?;
                    release_session_if_idle(store, &stale.session_id)?;
                }
                Ok(still_stale)
            })?;
            if removed {
                report.workflows_removed += 1;
                tracing::info!(workflow = %stale.id, session = %stale.session_id, "expired workflow removed");
            }
        }

        for queue in self
            .store
            .list_queues()?
            .into_iter()
            .filter(|q| q.updated_at < cutoff)
        {
            let removed = self.store.with_lock(&queue.session_id, |store| {
                let idle = store
                    .load_queue(&queue.session_id)?
                    .is_some_and(|q| q.updated_at < cutoff);
                if idle && !session_has_workflow(store, &queue.session_id)? {
                    store.delete_queue(&queue.session_id)?;
                    store.delete_artifact(&queue.session_id)?;
                    return Ok(true);
                }
                Ok(false)
            })?;
            if removed {
                report.queues_removed += 1;
                tracing::info!(session = %queue.session_id, "orphaned queue removed");
            }
        }

        if report != SweepReport::default() {
            tracing::info!(
                workflows = report.workflows_removed,
                queues = report.queues_removed,
                "retention sweep"
            );
        }
        Ok(report)
    }
}

fn session_has_workflow(store: &Store, session: &SessionId) -> Result<bool> {
    Ok(store
        .list_workflows()?
        .iter()
        .any(|wf| &wf.session_id == session))
}

/// Drop a session's queue and artifact when it has no workflow left.
/// Caller holds the session lock.
fn release_session_if_idle(store: &Store, session: &SessionId) -> Result<()> {
    if session_has_workflow(store, session)? {
        return Ok(());
    }
    store.delete_queue(session)?;
    store.delete_artifact(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::SessionQueue;

    fn setup() -> Result<(tempfile::TempDir, Store)> {
        let temp = tempfile::tempdir()?;
        let store = Store::init(temp.path())?;
        Ok((temp, store))
    }

    fn started(registry: &WorkflowRegistry<'_>) -> Result<Workflow> {
        registry.start(
            &SessionId::new("s1")?,
            "Auth system",
            vec!["backend".into(), "frontend".into()],
            Origin::Operation,
        )
    }

    #[test]
    fn test_register_requires_workflow() -> Result<()> {
        let (_temp, store) = setup()?;
        let registry = WorkflowRegistry::new(&store);
        let result = registry.register_agent(
            &WorkflowId::new("missing1")?,
            &AgentId::new("a")?,
            AgentRegistration::working("backend", "api", vec![]),
        );
        assert!(matches!(result, Err(Error::NotFound(_))));
        Ok(())
    }

    #[test]
    fn test_decision_and_complete_require_registration() -> Result<()> {
        let (_temp, store) = setup()?;
        let registry = WorkflowRegistry::new(&store);
        let wf = started(&registry)?;
        let ghost = AgentId::new("ghost")?;

        let logged = registry.log_decision(&wf.id, &ghost, DecisionType::Api, "REST", "");
        assert!(matches!(logged, Err(Error::NotRegistered { .. })));
        let completed = registry.complete(&wf.id, &ghost, Completion::default());
        assert!(matches!(completed, Err(Error::NotRegistered { .. })));
        Ok(())
    }

    #[test]
    fn test_reregistration_refreshes_task_and_unions_areas() -> Result<()> {
        let (_temp, store) = setup()?;
        let registry = WorkflowRegistry::new(&store);
        let wf = started(&registry)?;
        let agent = AgentId::new("backend-001")?;

        registry.register_agent(&wf.id, &agent, AgentRegistration::working("backend", "v1", vec!["auth".into()]))?;
        registry.log_decision(&wf.id, &agent, DecisionType::Api, "REST under /api", "")?;
        let wf = registry.register_agent(
            &wf.id,
            &agent,
            AgentRegistration::working("backend", "v2", vec!["billing".into()]),
        )?;

        let record = wf
            .agent(&agent)
            .ok_or_else(|| Error::NotFound(agent.to_string()))?;
        assert_eq!(record.task, "v2");
        assert_eq!(record.areas_of_concern.len(), 2);
        assert_eq!(record.decisions.len(), 1);
        Ok(())
    }

    #[test]
    fn test_complete_reports_progress() -> Result<()> {
        let (_temp, store) = setup()?;
        let registry = WorkflowRegistry::new(&store);
        let wf = started(&registry)?;
        let agent = AgentId::new("backend-001")?;
        registry.register_agent(&wf.id, &agent, AgentRegistration::working("backend", "api", vec![]))?;

        let progress = registry.complete(
            &wf.id,
            &agent,
            Completion {
                summary: Some("Built the API".into()),
                files_modified: vec!["api.rs".into()],
                ..Completion::default()
            },
        )?;
        assert_eq!(progress, Progress { completed: 1, registered: 1, planned: 2 });
        assert_eq!(progress.to_string(), "1/2 agents complete");
        Ok(())
    }

    #[test]
    fn test_complete_advances_running_queue_entry() -> Result<()> {
        let (_temp, store) = setup()?;
        let registry = WorkflowRegistry::new(&store);
        let wf = started(&registry)?;
        let agent = AgentId::new("backend-001")?;
        let (queue, _) = SessionQueue::new(wf.session_id.clone()).admit(&agent, "backend", "api");
        let (queue, _) = queue.transition(&agent, QueueStatus::Running);
        store.save_queue(&queue)?;

        registry.register_agent(&wf.id, &agent, AgentRegistration::working("backend", "api", vec![]))?;
        registry.complete(&wf.id, &agent, Completion::default())?;

        let status = store
            .load_queue(&wf.session_id)?
            .and_then(|q| q.find(&agent).map(|e| e.status));
        assert_eq!(status, Some(QueueStatus::Complete));
        Ok(())
    }

    #[test]
    fn test_review_sets_reviewing_and_reports() -> Result<()> {
        let (_temp, store) = setup()?;
        let registry = WorkflowRegistry::new(&store);
        let wf = started(&registry)?;
        for (name, file) in [("a", "payments.go"), ("b", "payments.go")] {
            let id = AgentId::new(name)?;
            registry.register_agent(&wf.id, &id, AgentRegistration::working(name, "t", vec![]))?;
            registry.complete(
                &wf.id,
                &id,
                Completion {
                    files_modified: vec![file.into()],
                    ..Completion::default()
                },
            )?;
        }

        let report = registry.review(&wf.id)?;
        assert_eq!(registry.get(&wf.id)?.status, WorkflowStatus::Reviewing);
        assert_eq!(report.files_modified, vec!["payments.go"]);
        assert_eq!(report.conflicts.len(), 1);
        assert!(report.to_string().contains("Conflicts Detected (1)"));
        assert!(registry.status()?.workflows.is_empty());
        Ok(())
    }

    #[test]
    fn test_close_counts_then_not_found() -> Result<()> {
        let (_temp, store) = setup()?;
        let registry = WorkflowRegistry::new(&store);
        let wf = started(&registry)?;
        for (name, files) in [("a", vec!["x.rs", "y.rs"]), ("b", vec!["y.rs", "z.rs"])] {
            let id = AgentId::new(name)?;
            registry.register_agent(&wf.id, &id, AgentRegistration::working(name, "t", vec![]))?;
            registry.log_decision(&wf.id, &id, DecisionType::Approach, "one", "")?;
            registry.log_decision(&wf.id, &id, DecisionType::Approach, "two", "")?;
            registry.complete(
                &wf.id,
                &id,
                Completion {
                    files_modified: files.into_iter().map(String::from).collect(),
                    ..Completion::default()
                },
            )?;
        }

        let summary = registry.close(&wf.id, "merged")?;
        assert_eq!(summary.agents_count, 2);
        assert_eq!(summary.decisions_count, 4);
        assert_eq!(summary.files_modified.len(), 3);
        assert_eq!(summary.conflicts_found, 1);
        assert!(matches!(registry.get(&wf.id), Err(Error::NotFound(_))));
        assert!(matches!(registry.close(&wf.id, ""), Err(Error::NotFound(_))));
        Ok(())
    }

    #[test]
    fn test_start_refuses_second_active_workflow_in_session() -> Result<()> {
        let (_temp, store) = setup()?;
        let registry = WorkflowRegistry::new(&store);
        let first = started(&registry)?;

        let second = started(&registry);
        assert!(matches!(
            second,
            Err(Error::SessionBusy { ref workflow, .. }) if *workflow == first.id.to_string()
        ));
        assert_eq!(store.list_workflows()?.len(), 1);

        let other = registry.start(&SessionId::new("s2")?, "Docs", vec![], Origin::Operation)?;
        assert_ne!(other.id, first.id);

        registry.close(&first.id, "")?;
        let again = started(&registry)?;
        assert_ne!(again.id, first.id);
        Ok(())
    }

    #[test]
    fn test_sweep_removes_expired_and_keeps_fresh() -> Result<()> {
        let (_temp, store) = setup()?;
        let registry = WorkflowRegistry::new(&store);
        let fresh = started(&registry)?;

        let mut old = Workflow::new(SessionId::new("s2")?, "old", vec![], Origin::Hook);
        old.created_at = Utc::now() - Duration::hours(48);
        store.save_workflow(&old)?;
        let mut queue = SessionQueue::new(SessionId::new("s2")?);
        queue.updated_at = Utc::now() - Duration::hours(48);
        store.save_queue(&queue)?;
        store.write_artifact(&SessionId::new("s2")?, "# old")?;

        let report = registry.sweep(Duration::hours(24))?;
        assert_eq!(report.workflows_removed, 1);
        assert!(store.load_workflow(&old.id)?.is_none());
        assert!(store.load_workflow(&fresh.id)?.is_some());
        assert!(store.load_queue(&SessionId::new("s2")?)?.is_none());
        assert!(store.read_artifact(&SessionId::new("s2")?)?.is_none());
        Ok(())
    }

    #[test]
    fn test_sweep_removes_orphaned_idle_queue() -> Result<()> {
        let (_temp, store) = setup()?;
        let registry = WorkflowRegistry::new(&store);
        let mut queue = SessionQueue::new(SessionId::new("lonely")?);
        queue.updated_at = Utc::now() - Duration::hours(30);
        store.save_queue(&queue)?;

        let report = registry.sweep(Duration::hours(24))?;
        assert_eq!(report.queues_removed, 1);
        Ok(())
    }
}
