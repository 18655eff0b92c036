//! Session queue: ordered admission and turn computation
//!
//! `SessionQueue` is a pure value; `QueueEngine` runs its operations
//! against the store inside the session lock.
//!
//! Key properties:
//! - Positions are assigned once, in admission order, and never reused
//! - Re-admitting a known agent returns its original position
//! - Status only moves forward: queued → running → complete, or
//!   queued → blocked → running → complete

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::{
    ids::{AgentId, SessionId},
    store::Store,
    Result,
};

/// Status of a queue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QueueStatus {
    Queued,
    Running,
    Blocked,
    Complete,
}

impl QueueStatus {
    /// Check if this is a terminal state
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Whether moving to `next` respects the forward-only lifecycle.
    ///
    /// Re-applying the current status is allowed (idempotent writes).
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Queued | Self::Running | Self::Blocked)
                | (Self::Blocked, Self::Blocked | Self::Running)
                | (Self::Running, Self::Running | Self::Complete)
        )
    }
}

/// An agent's place in a session queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub agent_id: AgentId,
    pub role: String,
    pub task: String,
    pub position: u64,
    pub status: QueueStatus,
    pub enqueued_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Host call currently driving this entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
}

impl QueueEntry {
    fn with_status(mut self, status: QueueStatus) -> Self {
        self.status = status;
        self.updated_at = Utc::now();
        self
    }
}

/// Result of admitting an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub position: u64,
    /// False when the agent was already in the queue
    pub newly_admitted: bool,
}

/// Result of an admit-then-check sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnCheck {
    pub position: u64,
    pub granted: bool,
    pub ahead: Vec<QueueEntry>,
}

/// Ordered per-session list of agents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionQueue {
    pub session_id: SessionId,
    /// Next position to hand out; only ever increases
    pub next_position: u64,
    pub entries: Vec<QueueEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionQueue {
    /// Create a new empty queue
    #[must_use]
    pub fn new(session_id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            next_position: 0,
            entries: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find an entry by agent ID
    #[must_use]
    pub fn find(&self, agent_id: &AgentId) -> Option<&QueueEntry> {
        self.entries.iter().find(|e| &e.agent_id == agent_id)
    }

    /// Find the entry driven by a host call
    #[must_use]
    pub fn find_call(&self, call_id: &str) -> Option<&QueueEntry> {
        self.entries.iter().find(|e| e.call_id.as_deref() == Some(call_id))
    }

    /// Attach the host call now driving an entry; a no-op without a call id
    #[must_use]
    pub fn bind_call(mut self, agent_id: &AgentId, call_id: Option<&str>) -> Self {
        let entry = self.entries.iter_mut().find(|e| &e.agent_id == agent_id);
        if let (Some(entry), Some(call_id)) = (entry, call_id) {
            entry.call_id = Some(call_id.to_string());
            entry.updated_at = Utc::now();
        }
        self
    }

    /// Admit an agent, returning the new queue and its position.
    ///
    /// Idempotent: a known agent keeps its original position.
    #[must_use]
    pub fn admit(mut self, agent_id: &AgentId, role: &str, task: &str) -> (Self, Admission) {
        if let Some(existing) = self.find(agent_id) {
            let admission = Admission {
                position: existing.position,
                newly_admitted: false,
            };
            return (self, admission);
        }

        let now = Utc::now();
        let position = self.next_position;
        self.entries.push(QueueEntry {
            agent_id: agent_id.clone(),
            role: role.to_string(),
            task: task.to_string(),
            position,
            status: QueueStatus::Queued,
            enqueued_at: now,
            updated_at: now,
            call_id: None,
        });
        self.next_position = position.saturating_add(1);
        self.updated_at = now;
        (
            self,
            Admission {
                position,
                newly_admitted: true,
            },
        )
    }

    /// Entries with a smaller position that have not completed
    #[must_use]
    pub fn agents_ahead(&self, agent_id: &AgentId) -> Vec<QueueEntry> {
        self.find(agent_id)
            .map(|me| {
                self.entries
                    .iter()
                    .filter(|e| e.position < me.position && !e.status.is_terminal())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether the agent may run; `None` if it was never admitted
    #[must_use]
    pub fn is_turn(&self, agent_id: &AgentId, max_concurrent: u32) -> Option<bool> {
        self.find(agent_id).map(|me| {
            let ahead = self
                .entries
                .iter()
                .filter(|e| e.position < me.position && !e.status.is_terminal())
                .count();
            ahead < max_concurrent as usize
        })
    }

    /// Move an entry to `status` if the lifecycle allows it.
    ///
    /// Returns the new queue and whether the entry now holds `status`.
    #[must_use]
    pub fn transition(mut self, agent_id: &AgentId, status: QueueStatus) -> (Self, bool) {
        let Some(index) = self.entries.iter().position(|e| &e.agent_id == agent_id) else {
            return (self, false);
        };
        let current = self.entries[index].status;
        if !current.can_transition_to(status) {
            return (self, false);
        }
        if current != status {
            let entry = self.entries.remove(index).with_status(status);
            self.entries.insert(index, entry);
            self.updated_at = Utc::now();
        }
        (self, true)
    }

    /// Admit (if needed) and decide the turn as one step
    #[must_use]
    pub fn admit_and_check(
        self,
        agent_id: &AgentId,
        role: &str,
        task: &str,
        max_concurrent: u32,
    ) -> (Self, TurnCheck) {
        let (queue, admission) = self.admit(agent_id, role, task);
        let granted = queue.is_turn(agent_id, max_concurrent).unwrap_or(false);
        let ahead = queue.agents_ahead(agent_id);
        (
            queue,
            TurnCheck {
                position: admission.position,
                granted,
                ahead,
            },
        )
    }
}

/// Queue operations bound to a store
#[derive(Debug, Clone, Copy)]
pub struct QueueEngine<'a> {
    store: &'a Store,
}

impl<'a> QueueEngine<'a> {
    #[must_use]
    pub const fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Load-modify-save a session queue under the session lock
    fn update<T>(
        &self,
        session: &SessionId,
        f: impl FnOnce(SessionQueue) -> (SessionQueue, T),
    ) -> Result<T> {
        self.store.with_lock(session, |store| {
            let queue = store
                .load_queue(session)?
                .unwrap_or_else(|| SessionQueue::new(session.clone()));
            let (queue, out) = f(queue);
            store.save_queue(&queue)?;
            Ok(out)
        })
    }

    /// Admit an agent; idempotent
    pub fn admit(
        &self,
        session: &SessionId,
        agent_id: &AgentId,
        role: &str,
        task: &str,
    ) -> Result<u64> {
        let admission = self.update(session, |q| q.admit(agent_id, role, task))?;
        if admission.newly_admitted {
            tracing::info!(session = %session, agent = %agent_id, position = admission.position, "agent admitted");
        }
        Ok(admission.position)
    }

    /// Whether it is the agent's turn.
    ///
    /// Lock-free read. An absent queue or entry is treated as allowed
    /// (fail-open); enforcing callers use [`Self::admit_and_check`].
    pub fn is_turn(&self, session: &SessionId, agent_id: &AgentId, max_concurrent: u32) -> Result<bool> {
        Ok(self
            .store
            .load_queue(session)?
            .and_then(|q| q.is_turn(agent_id, max_concurrent))
            .unwrap_or(true))
    }

    /// Admit and decide the turn inside a single critical section.
    ///
    /// A granted turn marks the entry running, a refused one blocked.
    pub fn admit_and_check(
        &self,
        session: &SessionId,
        agent_id: &AgentId,
        role: &str,
        task: &str,
        max_concurrent: u32,
    ) -> Result<TurnCheck> {
        self.update(session, |q| {
            let (q, check) = q.admit_and_check(agent_id, role, task, max_concurrent);
            let next = if check.granted {
                QueueStatus::Running
            } else {
                QueueStatus::Blocked
            };
            let (q, _) = q.transition(agent_id, next);
            (q, check)
        })
    }

    pub fn mark_running(&self, session: &SessionId, agent_id: &AgentId) -> Result<bool> {
        self.mark(session, agent_id, QueueStatus::Running)
    }

    pub fn mark_blocked(&self, session: &SessionId, agent_id: &AgentId) -> Result<bool> {
        self.mark(session, agent_id, QueueStatus::Blocked)
    }

    /// Complete an entry; only accepted from running.
    ///
    /// A completion for a queued or blocked entry is a stale signal: it is
    /// logged and dropped, and `false` is returned.
    pub fn mark_complete(&self, session: &SessionId, agent_id: &AgentId) -> Result<bool> {
        let accepted = self.mark(session, agent_id, QueueStatus::Complete)?;
        if !accepted {
            tracing::info!(session = %session, agent = %agent_id, "stale completion dropped");
        }
        Ok(accepted)
    }

    fn mark(&self, session: &SessionId, agent_id: &AgentId, status: QueueStatus) -> Result<bool> {
        let changed = self.update(session, |q| q.transition(agent_id, status))?;
        tracing::debug!(session = %session, agent = %agent_id, %status, changed, "queue status write");
        Ok(changed)
    }

    /// Entries ahead of the agent that have not completed (lock-free read)
    pub fn agents_ahead(&self, session: &SessionId, agent_id: &AgentId) -> Result<Vec<QueueEntry>> {
        Ok(self
            .store
            .load_queue(session)?
            .map(|q| q.agents_ahead(agent_id))
            .unwrap_or_default())
    }

    /// Current queue snapshot (lock-free read)
    pub fn snapshot(&self, session: &SessionId) -> Result<Option<SessionQueue>> {
        self.store.load_queue(session)
    }
}
