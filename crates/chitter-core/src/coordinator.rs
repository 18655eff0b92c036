//! Hook-level coordination strategy
//!
//! The host calls [`Coordinator::before_work`] before an agent runs and
//! [`Coordinator::after_work`] once it has produced output. One strategy
//! serves every [`CoordinationMode`]; the mode only changes the verdict.
//!
//! Hook agents are keyed on the host call id. A retry of a denied agent
//! resumes its blocked entry; every other call is a new invocation with its
//! own queue entry, even when an identical task ran before.
//!
//! When the coordination state cannot be used, [`unavailable_verdict`]
//! decides: `track` and `nudge` let the agent through, `turns` refuses and
//! `gate` refuses unless the instructions carry the acknowledgement marker.
//! `after_work` never fails the host.

use std::path::{Path, PathBuf};

use chrono::Utc;
use itertools::Itertools;
use serde::Serialize;
use strum::Display;

use crate::{
    config::{Config, CoordinationMode},
    extract::{extract_from_output, AgentOutput},
    ids::{AgentId, SessionId},
    queue::{QueueEntry, QueueStatus, SessionQueue},
    registry::{complete_agent, upsert_agent, AgentRegistration, Completion, WorkflowRegistry},
    render::{render, Snapshot},
    store::Store,
    workflow::{Agent, AgentStatus, Decision, Origin, Workflow, WorkflowStatus},
    Error, Result,
};

/// Decisions listed in the completion notice
const NOTICE_DECISIONS: usize = 10;
const DESCRIPTION_CHARS: usize = 80;
const EXTRACTED_RATIONALE: &str = "extracted from agent output";

/// What the host knows before an agent runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeforeWork {
    pub session: SessionId,
    pub role: String,
    pub task: String,
    /// Free-form instructions the agent will receive
    pub instructions: String,
    pub call_id: Option<String>,
}

/// What the host knows after an agent ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AfterWork {
    pub session: SessionId,
    pub role: String,
    pub task: String,
    pub call_id: Option<String>,
    pub output: AgentOutput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VerdictKind {
    Allow,
    Warn,
    Deny,
}

/// Admission decision for one agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub kind: VerdictKind,
    pub guidance: Option<String>,
    pub agent_id: AgentId,
    pub position: Option<u64>,
    pub artifact: Option<PathBuf>,
}

impl Verdict {
    #[must_use]
    pub const fn is_denied(&self) -> bool {
        matches!(self.kind, VerdictKind::Deny)
    }
}

/// Result of recording an agent's output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AfterOutcome {
    pub agent_id: AgentId,
    /// False when the completion was stale or nothing was recorded
    pub recorded: bool,
    pub decisions: usize,
    /// Set when the last agent of a multi-agent workflow finished
    pub notice: Option<String>,
}

impl AfterOutcome {
    const fn nothing(agent_id: AgentId, recorded: bool) -> Self {
        Self {
            agent_id,
            recorded,
            decisions: 0,
            notice: None,
        }
    }
}

/// Mode-driven coordination bound to a store and configuration
#[derive(Debug, Clone, Copy)]
pub struct Coordinator<'a> {
    store: &'a Store,
    config: &'a Config,
}

impl<'a> Coordinator<'a> {
    #[must_use]
    pub const fn new(store: &'a Store, config: &'a Config) -> Self {
        Self { store, config }
    }

    /// Decide whether an agent may start. Never fails.
    pub fn before_work(&self, request: &BeforeWork) -> Verdict {
        self.sweep();
        match self.try_before_work(request) {
            Ok(verdict) => {
                tracing::info!(
                    session = %request.session,
                    agent = %verdict.agent_id,
                    mode = %self.config.mode,
                    verdict = %verdict.kind,
                    position = ?verdict.position,
                    "before work"
                );
                verdict
            }
            Err(e) => {
                let verdict = unavailable_verdict(self.config, request, &e);
                tracing::warn!(
                    session = %request.session,
                    agent = %verdict.agent_id,
                    mode = %self.config.mode,
                    verdict = %verdict.kind,
                    error = %e,
                    "before work failed"
                );
                verdict
            }
        }
    }

    /// Record an agent's output. Never fails.
    pub fn after_work(&self, request: &AfterWork) -> AfterOutcome {
        self.sweep();
        match self.try_after_work(request) {
            Ok(outcome) => outcome,
            Err(e) => {
                let agent_id = provisional_id(&request.role, &request.task, request.call_id.as_deref());
                tracing::warn!(session = %request.session, agent = %agent_id, error = %e, "after work failed");
                AfterOutcome::nothing(agent_id, false)
            }
        }
    }

    fn sweep(&self) {
        if let Err(e) = WorkflowRegistry::new(self.store).sweep(self.config.retention()) {
            tracing::warn!(error = %e, "retention sweep failed");
        }
    }

    fn try_before_work(&self, request: &BeforeWork) -> Result<Verdict> {
        let session = &request.session;
        let artifact = self.store.artifact_path(session);

        self.store.with_lock(session, |store| {
            let workflow = match store.find_active_workflow(session)? {
                Some(existing) => existing,
                None => {
                    let created = Workflow::new(
                        session.clone(),
                        format!("Auto-coordinated: {}", shorten(&request.task, DESCRIPTION_CHARS)),
                        Vec::new(),
                        Origin::Hook,
                    );
                    tracing::info!(session = %session, workflow = %created.id, "workflow auto-created");
                    created
                }
            };
            let queue = store
                .load_queue(session)?
                .unwrap_or_else(|| SessionQueue::new(session.clone()));

            let agent_id = &admission_id(&queue, request);
            let decision = self.decide(request, agent_id, &workflow, queue, &artifact);
            let queue = decision.queue.bind_call(agent_id, request.call_id.as_deref());
            let verdict = decision.verdict;

            let workflow = if decision.register {
                let registration = AgentRegistration {
                    role: request.role.clone(),
                    task: request.task.clone(),
                    areas: Vec::new(),
                    status: decision.agent_status,
                    call_id: request.call_id.clone(),
                };
                with_hook_status(upsert_agent(workflow, agent_id, registration), agent_id, decision.agent_status)
            } else {
                workflow
            };

            store.save_queue(&queue)?;
            store.save_workflow(&workflow)?;
            let text = render(&Snapshot {
                session,
                queue: Some(&queue),
                workflow: &workflow,
                current: Some(agent_id),
                generated_at: Utc::now(),
            });
            let path = store.write_artifact(session, &text)?;

            Ok(Verdict {
                artifact: Some(path),
                ..verdict
            })
        })
    }

    /// Admit into the queue and apply the mode. Pure over loaded state.
    fn decide(
        &self,
        request: &BeforeWork,
        agent_id: &AgentId,
        workflow: &Workflow,
        queue: SessionQueue,
        artifact: &Path,
    ) -> Decided {
        let others: Vec<(&AgentId, &Agent)> =
            workflow.active_agents().filter(|(id, _)| *id != agent_id).collect();
        let acknowledged = self.acknowledged(&request.instructions, artifact);
        let max = self.config.max_concurrent;

        let (queue, admission) = queue.admit(agent_id, &request.role, &request.task);
        let position = Some(admission.position);
        let base = Verdict {
            kind: VerdictKind::Allow,
            guidance: None,
            agent_id: agent_id.clone(),
            position,
            artifact: None,
        };
        let allowed = |queue: SessionQueue, verdict: Verdict| {
            let (queue, _) = queue.transition(agent_id, QueueStatus::Running);
            Decided {
                queue,
                verdict,
                register: true,
                agent_status: AgentStatus::Running,
            }
        };

        match self.config.mode {
            CoordinationMode::Track => allowed(queue, base),

            CoordinationMode::Nudge => {
                let mut warnings = Vec::new();
                if !others.is_empty() && !acknowledged {
                    warnings.push(format!(
                        "chitter: {} other agent(s) active in this session. Read {} before starting and follow the decisions recorded there.",
                        others.len(),
                        artifact.display()
                    ));
                }
                if queue.is_turn(agent_id, max) == Some(false) {
                    warnings.push(format!(
                        "chitter: position {}, {} agent(s) ahead have not completed; proceeding anyway.",
                        admission.position,
                        queue.agents_ahead(agent_id).len()
                    ));
                }
                if warnings.is_empty() {
                    allowed(queue, base)
                } else {
                    allowed(
                        queue,
                        Verdict {
                            kind: VerdictKind::Warn,
                            guidance: Some(warnings.join("\n")),
                            ..base
                        },
                    )
                }
            }

            CoordinationMode::Gate => {
                if others.is_empty() || acknowledged {
                    let guidance = (!others.is_empty())
                        .then(|| format!("chitter: coordination verified; agent will read {}", artifact.display()));
                    return allowed(queue, Verdict { guidance, ..base });
                }
                let (queue, _) = queue.transition(agent_id, QueueStatus::Blocked);
                Decided {
                    queue,
                    verdict: Verdict {
                        kind: VerdictKind::Deny,
                        guidance: Some(self.gate_guidance(&others, artifact)),
                        ..base
                    },
                    register: false,
                    agent_status: AgentStatus::Blocked,
                }
            }

            CoordinationMode::Turns => {
                let granted = queue.is_turn(agent_id, max).unwrap_or(false);
                if granted {
                    return allowed(queue, base);
                }
                let ahead = queue.agents_ahead(agent_id);
                let (queue, _) = queue.transition(agent_id, QueueStatus::Blocked);
                Decided {
                    queue,
                    verdict: Verdict {
                        kind: VerdictKind::Deny,
                        guidance: Some(turn_guidance(agent_id, admission.position, &ahead)),
                        ..base
                    },
                    register: true,
                    agent_status: AgentStatus::Blocked,
                }
            }
        }
    }

    fn acknowledged(&self, instructions: &str, artifact: &Path) -> bool {
        instructions.contains(&self.config.acknowledgement_marker)
            || instructions.contains(&artifact.display().to_string())
            || instructions.contains(".chitter/active/")
    }

    fn gate_guidance(&self, others: &[(&AgentId, &Agent)], artifact: &Path) -> String {
        let working = others
            .iter()
            .map(|(_, a)| format!("  - {}: {}", a.role, a.task))
            .join("\n");
        format!(
            "chitter: BLOCKED - coordination required\n\n\
             Parallel agents detected. This agent must read the coordination file before starting.\n\n\
             Other agents currently working:\n{working}\n\n\
             Add this to the START of the agent's prompt:\n\n   \
             \"FIRST: Read the coordination file at {}\n    \
             and follow any decisions made by other agents.\n    \
             {}\"\n\n\
             Then retry.",
            artifact.display(),
            self.config.acknowledgement_marker
        )
    }

    fn try_after_work(&self, request: &AfterWork) -> Result<AfterOutcome> {
        let session = &request.session;
        let text = request.output.text();
        let extracted = extract_from_output(&request.output, self.config.max_decisions);
        let count = extracted.len();

        self.store.with_lock(session, |store| {
            let queue = store.load_queue(session)?;
            let workflows = session_workflows(store, session)?;

            let Some(agent_id) = completion_id(queue.as_ref(), &workflows, request) else {
                let agent_id = provisional_id(&request.role, &request.task, request.call_id.as_deref());
                tracing::info!(session = %session, agent = %agent_id, "no agent matches this completion");
                return Ok(AfterOutcome::nothing(agent_id, false));
            };
            let agent_id = &agent_id;

            let queue = match queue {
                Some(q) if q.find(agent_id).is_some() => {
                    let (q, accepted) = q.transition(agent_id, QueueStatus::Complete);
                    if !accepted {
                        tracing::info!(session = %session, agent = %agent_id, "stale completion dropped");
                        return Ok(AfterOutcome::nothing(agent_id.clone(), false));
                    }
                    store.save_queue(&q)?;
                    Some(q)
                }
                other => other,
            };

            let Some(workflow) = workflows.into_iter().find(|wf| wf.agents.contains_key(agent_id)) else {
                tracing::info!(session = %session, agent = %agent_id, "no workflow holds this agent");
                return Ok(AfterOutcome::nothing(agent_id.clone(), queue.is_some()));
            };

            let completion = Completion {
                summary: None,
                files_modified: Vec::new(),
                decisions: extracted
                    .into_iter()
                    .map(|d| Decision::new(d.kind, d.text, EXTRACTED_RATIONALE))
                    .collect(),
                output_excerpt: Some(text),
            };
            let workflow = complete_agent(workflow, agent_id, completion)?;
            store.save_workflow(&workflow)?;

            let next = workflow.active_agents().map(|(id, _)| id).next();
            let rendered = render(&Snapshot {
                session,
                queue: queue.as_ref(),
                workflow: &workflow,
                current: next,
                generated_at: Utc::now(),
            });
            store.write_artifact(session, &rendered)?;

            tracing::info!(session = %session, agent = %agent_id, decisions = count, "agent output recorded");
            Ok(AfterOutcome {
                agent_id: agent_id.clone(),
                recorded: true,
                decisions: count,
                notice: completion_notice(&workflow),
            })
        })
    }
}

/// Outcome of the mode decision
struct Decided {
    queue: SessionQueue,
    verdict: Verdict,
    register: bool,
    agent_status: AgentStatus,
}

/// Hook registrations track the queue state unless already complete
fn with_hook_status(workflow: Workflow, id: &AgentId, status: AgentStatus) -> Workflow {
    match workflow.agent(id) {
        Some(agent) if !agent.is_complete() && agent.status != status => {
            let mut agent = agent.clone();
            agent.status = status;
            workflow.with_agent(id.clone(), agent)
        }
        _ => workflow,
    }
}

/// Verdict for a hook call when the coordination state cannot be read or
/// written
#[must_use]
pub fn unavailable_verdict(config: &Config, request: &BeforeWork, error: &impl std::fmt::Display) -> Verdict {
    let reason = format!("chitter: coordination state unavailable ({error})");
    let acknowledged = request.instructions.contains(&config.acknowledgement_marker);
    let (kind, guidance) = match config.mode {
        CoordinationMode::Track => (VerdictKind::Allow, None),
        CoordinationMode::Nudge => (
            VerdictKind::Warn,
            Some(format!("{reason}; proceeding without coordination.")),
        ),
        CoordinationMode::Gate if acknowledged => (VerdictKind::Allow, None),
        CoordinationMode::Gate => (
            VerdictKind::Deny,
            Some(format!(
                "{reason}; parallel agents cannot be checked. Retry shortly, or add {} to the prompt once the coordination file has been read.",
                config.acknowledgement_marker
            )),
        ),
        CoordinationMode::Turns => (
            VerdictKind::Deny,
            Some(format!("{reason}; this agent's turn cannot be confirmed. Retry shortly.")),
        ),
    };
    Verdict {
        kind,
        guidance,
        agent_id: provisional_id(&request.role, &request.task, request.call_id.as_deref()),
        position: None,
        artifact: None,
    }
}

/// Id a new invocation is admitted under: the host call id, else a
/// fingerprint of role and task
fn provisional_id(role: &str, task: &str, call_id: Option<&str>) -> AgentId {
    call_id.map_or_else(|| AgentId::fingerprint(role, task), AgentId::from_host)
}

/// Queue identity for a hook invocation.
///
/// The unfinished entry bound to this call wins. Otherwise a blocked entry
/// with the same role and task is resumed, so a denied agent that retries
/// keeps its position. Any other call is a new invocation: running and
/// completed entries are never shared.
fn admission_id(queue: &SessionQueue, request: &BeforeWork) -> AgentId {
    let call_id = request.call_id.as_deref();
    let bound = call_id
        .and_then(|c| queue.find_call(c))
        .filter(|e| !e.status.is_terminal());
    let resumed = || {
        queue
            .entries
            .iter()
            .filter(|e| e.status == QueueStatus::Blocked && e.role == request.role && e.task == request.task)
            .min_by_key(|e| e.position)
    };
    match bound.or_else(resumed) {
        Some(entry) => entry.agent_id.clone(),
        None => unused_id(queue, provisional_id(&request.role, &request.task, call_id)),
    }
}

/// `base`, or `base` suffixed with the next position when an entry holds it
fn unused_id(queue: &SessionQueue, base: AgentId) -> AgentId {
    if queue.find(&base).is_none() {
        return base;
    }
    AgentId::from_host(&format!("{base}-{}", queue.next_position))
}

/// The agent a completion belongs to.
///
/// Prefers the queue entry bound to the call, then the oldest unfinished
/// entry with the same role and task (running ones first). Without a queue
/// entry, an unfinished workflow agent with the same call or task.
fn completion_id(queue: Option<&SessionQueue>, workflows: &[Workflow], request: &AfterWork) -> Option<AgentId> {
    let call_id = request.call_id.as_deref();
    let same_task = |role: &str, task: &str| role == request.role && task == request.task;

    let entry = queue.and_then(|q| {
        call_id.and_then(|c| q.find_call(c)).or_else(|| {
            q.entries
                .iter()
                .filter(|e| !e.status.is_terminal() && same_task(&e.role, &e.task))
                .min_by_key(|e| (e.status != QueueStatus::Running, e.position))
        })
    });
    if let Some(entry) = entry {
        return Some(entry.agent_id.clone());
    }

    workflows
        .iter()
        .flat_map(|wf| wf.agents.iter())
        .filter(|(_, a)| !a.is_complete())
        .find(|(_, a)| {
            call_id.is_some_and(|c| a.call_id.as_deref() == Some(c)) || same_task(&a.role, &a.task)
        })
        .map(|(id, _)| id.clone())
}

/// Workflows of a session, active ones first
fn session_workflows(store: &Store, session: &SessionId) -> Result<Vec<Workflow>> {
    Ok(store
        .list_workflows()?
        .into_iter()
        .filter(|wf| &wf.session_id == session)
        .sorted_by_key(|wf| wf.status != WorkflowStatus::Active)
        .collect())
}

fn turn_guidance(agent_id: &AgentId, position: u64, ahead: &[QueueEntry]) -> String {
    let violation = Error::TurnViolation {
        agent: agent_id.to_string(),
        position,
        ahead: ahead.len(),
    };
    let waiting = ahead
        .iter()
        .map(|e| format!("  - [{}] {}: {} ({})", e.position, e.role, shorten(&e.task, DESCRIPTION_CHARS), e.status))
        .join("\n");
    format!("chitter: {violation}\n\nAgents ahead:\n{waiting}\n\nRetry once they complete; the queue position is kept.")
}

fn completion_notice(workflow: &Workflow) -> Option<String> {
    let all_done = workflow.agents.values().all(|a| a.is_complete());
    if !all_done || workflow.agents.len() < 2 {
        return None;
    }
    let decisions = workflow
        .agents
        .iter()
        .flat_map(|(id, a)| a.decisions.iter().map(move |d| format!("[{id}] {}", d.text)))
        .take(NOTICE_DECISIONS)
        .join("\n");
    tracing::info!(workflow = %workflow.id, agents = workflow.agents.len(), "workflow complete");
    Some(format!(
        "chitter: parallel work complete\nWorkflow: {}\nAgents: {}\nDecisions detected:\n{}\n\nReview for conflicts with: chitter workflow review {}",
        workflow.id,
        workflow.agents.len(),
        if decisions.is_empty() { "(none)" } else { decisions.as_str() },
        workflow.id
    ))
}

fn shorten(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or_default().trim();
    if line.chars().count() <= max {
        return line.to_string();
    }
    let mut cut: String = line.chars().take(max.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}
