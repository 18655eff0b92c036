//! Coordination artifact rendering
//!
//! A pure function of queue + workflow state. The result overwrites the
//! session's previous artifact; there is only ever one current snapshot.

use chrono::{DateTime, Utc};

use crate::{
    config::DEFAULT_MARKER,
    ids::{AgentId, SessionId},
    queue::SessionQueue,
    workflow::{Agent, Workflow},
};

/// Decisions shown per completed agent
pub const DECISIONS_PER_AGENT: usize = 10;

const TABLE_TASK_CHARS: usize = 60;

/// Everything the renderer reads
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub session: &'a SessionId,
    pub queue: Option<&'a SessionQueue>,
    pub workflow: &'a Workflow,
    /// The agent the artifact is addressed to
    pub current: Option<&'a AgentId>,
    pub generated_at: DateTime<Utc>,
}

impl Snapshot<'_> {
    fn position_of(&self, id: &AgentId) -> Option<u64> {
        self.queue.and_then(|q| q.find(id)).map(|e| e.position)
    }

    /// Workflow agents ordered by queue position, unqueued ones last by id
    fn ordered_agents(&self) -> Vec<(&AgentId, &Agent)> {
        let mut agents: Vec<(&AgentId, &Agent)> = self.workflow.agents.iter().collect();
        agents.sort_by_key(|(id, _)| (self.position_of(id).unwrap_or(u64::MAX), (*id).clone()));
        agents
    }
}

/// Render the coordination artifact as markdown
pub fn render(snapshot: &Snapshot<'_>) -> String {
    let mut lines = vec![
        format!("# {DEFAULT_MARKER} - Session {}", snapshot.session),
        String::new(),
        "**Read this before starting your work.**".to_string(),
        String::new(),
        format!(
            "Workflow `{}` ({}): {}",
            snapshot.workflow.id, snapshot.workflow.status, snapshot.workflow.description
        ),
        String::new(),
    ];

    lines.extend(status_table(snapshot));
    lines.extend(assignment(snapshot));
    lines.extend(active_agents(snapshot));
    lines.extend(completed_agents(snapshot));

    lines.extend([
        "## Coordination Rules".to_string(),
        String::new(),
        "1. **Check decisions above** - if another agent defined an API, endpoint, or interface, use the same format".to_string(),
        "2. **Be explicit** - state your decisions clearly so later agents can follow them".to_string(),
        "3. **No conflicts** - if a decision above conflicts with your plan, match it".to_string(),
        String::new(),
        "---".to_string(),
        format!("*Generated by chitter at {}*", snapshot.generated_at.to_rfc3339()),
    ]);

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn status_table(snapshot: &Snapshot<'_>) -> Vec<String> {
    let mut lines = vec![
        "## Agent Status".to_string(),
        String::new(),
        "| # | Role | Task | State |".to_string(),
        "|---|------|------|-------|".to_string(),
    ];

    if let Some(queue) = snapshot.queue {
        let mut entries: Vec<_> = queue.entries.iter().collect();
        entries.sort_by_key(|e| e.position);
        for entry in entries {
            lines.push(format!(
                "| {} | {} | {} | {} |",
                entry.position,
                cell(&entry.role),
                cell(&entry.task),
                entry.status
            ));
        }
    }
    for (id, agent) in &snapshot.workflow.agents {
        if snapshot.position_of(id).is_none() {
            lines.push(format!(
                "| - | {} | {} | {} |",
                cell(&agent.role),
                cell(&agent.task),
                agent.status
            ));
        }
    }

    lines.push(String::new());
    lines
}

fn assignment(snapshot: &Snapshot<'_>) -> Vec<String> {
    let Some(current) = snapshot.current else {
        return Vec::new();
    };
    let entry = snapshot.queue.and_then(|q| q.find(current));
    let agent = snapshot.workflow.agent(current);

    let role = agent
        .map(|a| a.role.as_str())
        .or_else(|| entry.map(|e| e.role.as_str()))
        .unwrap_or("unknown");
    let task = agent
        .map(|a| a.task.as_str())
        .or_else(|| entry.map(|e| e.task.as_str()))
        .unwrap_or("");

    let mut lines = vec![
        "## Your Task".to_string(),
        String::new(),
        format!("You are: **{role}** (`{current}`)"),
        format!("Task: {task}"),
    ];
    if let (Some(entry), Some(queue)) = (entry, snapshot.queue) {
        lines.push(format!(
            "Position: {} ({} ahead, not yet complete)",
            entry.position,
            queue.agents_ahead(current).len()
        ));
    }
    lines.push(String::new());
    lines
}

fn active_agents(snapshot: &Snapshot<'_>) -> Vec<String> {
    let others: Vec<String> = snapshot
        .ordered_agents()
        .into_iter()
        .filter(|(id, agent)| agent.status.is_active() && Some(*id) != snapshot.current)
        .map(|(_, agent)| format!("- **{}**: {}", agent.role, agent.task))
        .collect();
    if others.is_empty() {
        return Vec::new();
    }

    let mut lines = vec![
        "## Currently Active Agents (working in parallel with you)".to_string(),
        String::new(),
    ];
    lines.extend(others);
    lines.push(String::new());
    lines
}

fn completed_agents(snapshot: &Snapshot<'_>) -> Vec<String> {
    let cutoff = snapshot.current.and_then(|id| snapshot.position_of(id));
    let completed: Vec<(&AgentId, &Agent)> = snapshot
        .ordered_agents()
        .into_iter()
        .filter(|(id, agent)| {
            agent.is_complete()
                && match (cutoff, snapshot.position_of(id)) {
                    (Some(limit), Some(position)) => position < limit,
                    _ => true,
                }
        })
        .collect();
    if completed.is_empty() {
        return Vec::new();
    }

    let mut lines = vec![
        "## Completed Agents (coordinate with their decisions)".to_string(),
        String::new(),
    ];
    for (id, agent) in completed {
        lines.push(format!("### {} (`{id}`)", agent.role));
        lines.push(format!("Task: {}", agent.task));
        if let Some(summary) = &agent.summary {
            lines.push(format!("Summary: {summary}"));
        }
        if !agent.decisions.is_empty() {
            lines.push("**Decisions made:**".to_string());
            lines.extend(
                agent
                    .decisions
                    .iter()
                    .take(DECISIONS_PER_AGENT)
                    .map(|d| format!("- [{}] {}", d.kind, d.text)),
            );
        }
        lines.push(String::new());
    }
    lines
}

/// Single-line, pipe-safe, shortened table cell
fn cell(text: &str) -> String {
    let flat = text.replace(['\n', '\r'], " ").replace('|', "\\|");
    if flat.chars().count() <= TABLE_TASK_CHARS {
        return flat;
    }
    let mut cut: String = flat.chars().take(TABLE_TASK_CHARS - 3).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::{
        queue::QueueStatus,
        workflow::{AgentStatus, Decision, DecisionType, Origin},
        Result,
    };

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5)
            .single()
            .unwrap_or_default()
    }

    struct Fixture {
        session: SessionId,
        queue: SessionQueue,
        workflow: Workflow,
        a: AgentId,
        c: AgentId,
    }

    fn fixture() -> Result<Fixture> {
        let session = SessionId::new("s1")?;
        let (a, b, c) = (AgentId::new("a")?, AgentId::new("b")?, AgentId::new("c")?);

        let (queue, _) = SessionQueue::new(session.clone()).admit(&a, "backend", "Build the API");
        let (queue, _) = queue.admit(&b, "frontend", "Build | the UI");
        let (queue, _) = queue.admit(&c, "docs", "Write docs");
        let (queue, _) = queue.transition(&a, QueueStatus::Running);
        let (queue, _) = queue.transition(&a, QueueStatus::Complete);
        let (queue, _) = queue.transition(&b, QueueStatus::Running);

        let mut done = Agent::new("backend", "Build the API", AgentStatus::Complete);
        done.decisions = (0..12)
            .map(|i| Decision::new(DecisionType::Api, format!("decision {i}"), ""))
            .collect();
        let workflow = Workflow::new(session.clone(), "Auth", vec![], Origin::Hook)
            .with_agent(a.clone(), done)
            .with_agent(b.clone(), Agent::new("frontend", "Build | the UI", AgentStatus::Running))
            .with_agent(c.clone(), Agent::new("docs", "Write docs", AgentStatus::Queued));

        Ok(Fixture { session, queue, workflow, a, c })
    }

    #[test]
    fn test_render_is_pure() -> Result<()> {
        let f = fixture()?;
        let snapshot = Snapshot {
            session: &f.session,
            queue: Some(&f.queue),
            workflow: &f.workflow,
            current: Some(&f.c),
            generated_at: fixed_time(),
        };
        assert_eq!(render(&snapshot), render(&snapshot));
        Ok(())
    }

    #[test]
    fn test_render_sections_for_late_agent() -> Result<()> {
        let f = fixture()?;
        let text = render(&Snapshot {
            session: &f.session,
            queue: Some(&f.queue),
            workflow: &f.workflow,
            current: Some(&f.c),
            generated_at: fixed_time(),
        });

        assert!(text.starts_with("# CHITTER_COORDINATION - Session s1"));
        assert!(text.contains("| 0 | backend | Build the API | complete |"));
        assert!(text.contains("| 1 | frontend | Build \\| the UI | running |"));
        assert!(text.contains("You are: **docs** (`c`)"));
        assert!(text.contains("Position: 2 (1 ahead, not yet complete)"));
        assert!(text.contains("- **frontend**: Build | the UI"));
        assert!(text.contains("### backend (`a`)"));
        assert!(text.contains("- [api] decision 9"));
        assert!(!text.contains("decision 10"));
        Ok(())
    }

    #[test]
    fn test_completed_agents_behind_current_are_hidden() -> Result<()> {
        let f = fixture()?;
        let text = render(&Snapshot {
            session: &f.session,
            queue: Some(&f.queue),
            workflow: &f.workflow,
            current: Some(&f.a),
            generated_at: fixed_time(),
        });
        assert!(!text.contains("## Completed Agents"));
        assert!(text.contains("You are: **backend** (`a`)"));
        assert!(text.contains("Position: 0 (0 ahead, not yet complete)"));
        assert!(text.contains("- **frontend**"));
        Ok(())
    }

    #[test]
    fn test_render_without_queue() -> Result<()> {
        let f = fixture()?;
        let text = render(&Snapshot {
            session: &f.session,
            queue: None,
            workflow: &f.workflow,
            current: None,
            generated_at: fixed_time(),
        });
        assert!(text.contains("| - | backend | Build the API | complete |"));
        assert!(!text.contains("## Your Task"));
        assert!(text.contains("## Completed Agents"));
        Ok(())
    }
}
