//! Conflict detection across a workflow's agents
//!
//! Read-only: the same agent map always yields the same records, in the
//! same order (file conflicts, then area overlaps, then interface
//! mismatches, each sorted by subject).

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::{
    ids::AgentId,
    workflow::{Agent, DecisionType},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConflictKind {
    FileConflict,
    AreaOverlap,
    InterfaceMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// One detected disagreement between agents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    #[serde(rename = "type")]
    pub kind: ConflictKind,
    pub severity: Severity,
    /// File path, area name or interface key
    pub subject: String,
    pub agents: Vec<AgentId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decisions: Vec<String>,
    pub message: String,
}

/// Run every detector over an agent map
pub fn detect_conflicts(agents: &BTreeMap<AgentId, Agent>) -> Vec<Conflict> {
    file_conflicts(agents)
        .into_iter()
        .chain(area_overlaps(agents))
        .chain(interface_mismatches(agents))
        .collect()
}

/// Files touched by more than one agent
fn file_conflicts(agents: &BTreeMap<AgentId, Agent>) -> Vec<Conflict> {
    let mut by_file: BTreeMap<&str, Vec<&AgentId>> = BTreeMap::new();
    for (id, agent) in agents {
        for file in &agent.files_modified {
            by_file.entry(file.as_str()).or_default().push(id);
        }
    }

    by_file
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(file, ids)| Conflict {
            kind: ConflictKind::FileConflict,
            severity: Severity::High,
            subject: file.to_string(),
            message: format!("Multiple agents modified {file}: {}", ids.iter().join(", ")),
            agents: ids.into_iter().cloned().collect(),
            decisions: Vec::new(),
        })
        .collect()
}

/// Areas of concern under which more than one agent filed decisions
fn area_overlaps(agents: &BTreeMap<AgentId, Agent>) -> Vec<Conflict> {
    let mut by_area: BTreeMap<&str, Vec<(&AgentId, &str)>> = BTreeMap::new();
    for (id, agent) in agents {
        for area in &agent.areas_of_concern {
            by_area
                .entry(area.as_str())
                .or_default()
                .extend(agent.decisions.iter().map(|d| (id, d.text.as_str())));
        }
    }

    by_area
        .into_iter()
        .filter_map(|(area, entries)| {
            let ids: Vec<&AgentId> = entries.iter().map(|(id, _)| *id).unique().collect();
            (ids.len() > 1).then(|| Conflict {
                kind: ConflictKind::AreaOverlap,
                severity: Severity::Medium,
                subject: area.to_string(),
                message: format!(
                    "Multiple agents made decisions in '{area}': {} - review for compatibility",
                    ids.iter().join(", ")
                ),
                agents: ids.into_iter().cloned().collect(),
                decisions: entries.iter().map(|(_, text)| (*text).to_string()).collect(),
            })
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════
// INTERFACE MISMATCH
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stance {
    Expects,
    Provides,
}

/// An interface decision split into its stance, key and contract
#[derive(Debug, Clone, PartialEq, Eq)]
struct InterfaceClaim {
    stance: Stance,
    key: String,
    contract: String,
}

const ARTICLES: &[&str] = &["a", "an", "the"];
const PROVIDE_VERBS: &[&str] = &["provide", "create", "expose", "export"];

fn parse_claim(text: &str) -> Option<InterfaceClaim> {
    let tokens: Vec<String> = text
        .split_whitespace()
        .map(|t| {
            t.trim_matches(|c: char| !c.is_alphanumeric() && c != '_' && c != '/')
                .to_lowercase()
        })
        .filter(|t| !t.is_empty())
        .collect();

    let (verb_at, stance) = tokens.iter().enumerate().find_map(|(i, t)| {
        if t.starts_with("expect") {
            Some((i, Stance::Expects))
        } else if PROVIDE_VERBS.iter().any(|verb| t.starts_with(verb)) {
            Some((i, Stance::Provides))
        } else {
            None
        }
    })?;

    let mut rest = tokens[verb_at + 1..]
        .iter()
        .filter(|t| !ARTICLES.contains(&t.as_str()));
    let key = rest.by_ref().take(2).join(" ");
    if key.is_empty() {
        return None;
    }
    Some(InterfaceClaim {
        stance,
        key,
        contract: rest.join(" "),
    })
}

/// Expectations and provisions of the same key that disagree
fn interface_mismatches(agents: &BTreeMap<AgentId, Agent>) -> Vec<Conflict> {
    let mut by_key: BTreeMap<String, Vec<(&AgentId, InterfaceClaim, &str)>> = BTreeMap::new();
    for (id, agent) in agents {
        for decision in agent
            .decisions
            .iter()
            .filter(|d| d.kind == DecisionType::Interface)
        {
            if let Some(claim) = parse_claim(&decision.text) {
                by_key
                    .entry(claim.key.clone())
                    .or_default()
                    .push((id, claim, decision.text.as_str()));
            }
        }
    }

    by_key
        .into_iter()
        .filter_map(|(key, claims)| {
            let mismatched: Vec<(&AgentId, &AgentId)> = claims
                .iter()
                .filter(|(_, c, _)| c.stance == Stance::Expects)
                .cartesian_product(claims.iter().filter(|(_, c, _)| c.stance == Stance::Provides))
                .filter(|((a, exp, _), (b, prov, _))| a != b && exp.contract != prov.contract)
                .map(|((a, _, _), (b, _, _))| (*a, *b))
                .collect();
            if mismatched.is_empty() {
                return None;
            }

            let involved: BTreeSet<&AgentId> =
                mismatched.iter().flat_map(|(a, b)| [*a, *b]).collect();
            let (consumer, producer) = mismatched[0];
            Some(Conflict {
                kind: ConflictKind::InterfaceMismatch,
                severity: Severity::Low,
                message: format!(
                    "Interface '{key}' is expected by {consumer} but provided differently by {producer}"
                ),
                subject: key,
                agents: involved.into_iter().cloned().collect(),
                decisions: claims
                    .iter()
                    .filter(|(id, _, _)| mismatched.iter().any(|(a, b)| a == id || b == id))
                    .map(|(_, _, text)| (*text).to_string())
                    .collect(),
            })
        })
        .collect()
}
