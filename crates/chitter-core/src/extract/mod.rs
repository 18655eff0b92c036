//! Decision extraction from free-form agent output
//!
//! A pipeline of pure stages over a bounded line sequence:
//!
//! ```text
//! AgentOutput ─▶ text ─▶ bound ─▶ noise filter ─▶ heading classifier ─┐
//!                                                 phrase classifier ──┴▶ dedupe ─▶ cap
//! ```
//!
//! Heading-triggered sections and phrase-triggered lines feed one output
//! list in source order. Results are best-effort; the guarantees are
//! determinism and bounded size.

mod envelope;
mod headings;
mod noise;
mod phrases;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

pub use self::envelope::AgentOutput;
use crate::workflow::DecisionType;

/// Default number of decisions kept per agent
pub const DEFAULT_MAX_DECISIONS: usize = 15;
/// Hard ceiling regardless of configuration
pub const MAX_DECISIONS_CEILING: usize = 20;
/// Bytes of output scanned
pub const MAX_INPUT_BYTES: usize = 256 * 1024;
/// Lines of output scanned
pub const MAX_INPUT_LINES: usize = 4000;

const SECTION_CONTENT_LINES: usize = 3;
const SECTION_MAX_CHARS: usize = 300;

/// A decision statement mined from text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDecision {
    pub kind: DecisionType,
    pub text: String,
}

/// Extract at most `cap` (clamped to 1..=20) decisions from `text`
pub fn extract_decisions(text: &str, cap: usize) -> Vec<ExtractedDecision> {
    let cap = cap.clamp(1, MAX_DECISIONS_CEILING);
    let lines: Vec<&str> = noise::meaningful_lines(bound(text))
        .into_iter()
        .take(MAX_INPUT_LINES)
        .collect();

    let mut out = Collected::new(cap);
    let mut section: Option<Section> = None;

    for line in lines {
        if out.is_full() {
            break;
        }

        if let Some(heading) = headings::classify(line) {
            if let Some(open) = section.take() {
                out.push_section(open);
            }
            section = heading.kind.map(|kind| Section::new(heading.title, kind));
            continue;
        }

        if let Some(open) = section.as_mut() {
            open.lines.push(strip_marker(line).to_string());
            if open.lines.len() >= SECTION_CONTENT_LINES {
                if let Some(full) = section.take() {
                    out.push_section(full);
                }
            }
            continue;
        }

        if phrases::is_decision_line(line) {
            let text = strip_marker(line);
            out.push(ExtractedDecision {
                kind: infer_kind(text),
                text: text.to_string(),
            });
        }
    }

    if let Some(open) = section {
        out.push_section(open);
    }
    out.into_vec()
}

/// Convenience: resolve an output shape, then extract
pub fn extract_from_output(output: &AgentOutput, cap: usize) -> Vec<ExtractedDecision> {
    extract_decisions(&output.text(), cap)
}

/// Infer a decision type from keywords in its text
pub fn infer_kind(text: &str) -> DecisionType {
    const RULES: &[(DecisionType, &[&str])] = &[
        (DecisionType::Api, &["api", "endpoint", "route"]),
        (DecisionType::DataModel, &["schema", "table", "model", "column"]),
        (DecisionType::Interface, &["interface", "contract", "trait", "protocol"]),
        (
            DecisionType::Dependency,
            &["crate", "librar", "package", "dependenc", "stack"],
        ),
        (DecisionType::Architecture, &["architect", "layer", "module", "service"]),
    ];

    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    RULES
        .iter()
        .find(|(_, stems)| {
            words
                .iter()
                .any(|word| stems.iter().any(|stem| word.starts_with(stem)))
        })
        .map_or(DecisionType::Approach, |(kind, _)| *kind)
}

/// Limit scanned input to the byte budget, dropping any partial last line
fn bound(text: &str) -> &str {
    if text.len() <= MAX_INPUT_BYTES {
        return text;
    }
    let mut end = MAX_INPUT_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let head = &text[..end];
    head.rfind('\n').map_or(head, |newline| &head[..newline])
}

fn strip_marker(line: &str) -> &str {
    let line = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("+ "))
        .unwrap_or(line);
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix(". ") {
            return rest.trim_start();
        }
    }
    line.trim_start()
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

/// Heading-opened section awaiting its content lines
struct Section {
    title: String,
    kind: DecisionType,
    lines: Vec<String>,
}

impl Section {
    fn new(title: String, kind: DecisionType) -> Self {
        Self {
            title,
            kind,
            lines: Vec::with_capacity(SECTION_CONTENT_LINES),
        }
    }

    fn into_decision(self) -> Option<ExtractedDecision> {
        if self.lines.is_empty() {
            return None;
        }
        let text = format!("{}: {}", self.title, self.lines.join("; "));
        Some(ExtractedDecision {
            kind: self.kind,
            text: truncate_chars(&text, SECTION_MAX_CHARS),
        })
    }
}

/// Deduplicating, capped output list
struct Collected {
    cap: usize,
    seen: HashSet<String>,
    items: Vec<ExtractedDecision>,
}

impl Collected {
    fn new(cap: usize) -> Self {
        Self {
            cap,
            seen: HashSet::new(),
            items: Vec::with_capacity(cap),
        }
    }

    fn is_full(&self) -> bool {
        self.items.len() >= self.cap
    }

    fn push(&mut self, decision: ExtractedDecision) {
        if self.is_full() {
            return;
        }
        if self.seen.insert(decision.text.to_lowercase()) {
            self.items.push(decision);
        }
    }

    fn push_section(&mut self, section: Section) {
        if let Some(decision) = section.into_decision() {
            self.push(decision);
        }
    }

    fn into_vec(self) -> Vec<ExtractedDecision> {
        self.items
    }
}
