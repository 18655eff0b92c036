//! Heading classifier
//!
//! Recognises three heading shapes:
//! - markdown `#`-headings
//! - whole-line bold labels (`**Approach**`, `**Approach:**`)
//! - short bare labels ending in a colon (`Architecture:`)
//!
//! Every heading closes an open section; only headings from the decision
//! vocabulary open a new one.

use std::sync::OnceLock;

use regex::Regex;

use super::infer_kind;
use crate::workflow::DecisionType;

/// A recognised heading line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub title: String,
    /// Set when the title belongs to the decision vocabulary
    pub kind: Option<DecisionType>,
}

/// Classify a (trimmed, noise-free) line as a heading
pub fn classify(line: &str) -> Option<Heading> {
    let title = heading_title(line)?;
    let kind = is_decision_heading(&title).then(|| infer_kind(&title));
    Some(Heading { title, kind })
}

fn heading_title(line: &str) -> Option<String> {
    static MARKDOWN_RE: OnceLock<Option<Regex>> = OnceLock::new();
    static BOLD_RE: OnceLock<Option<Regex>> = OnceLock::new();
    static LABEL_RE: OnceLock<Option<Regex>> = OnceLock::new();

    let markdown = MARKDOWN_RE.get_or_init(|| Regex::new(r"^#{1,6}\s+(.+?)\s*#*$").ok());
    let bold = BOLD_RE.get_or_init(|| Regex::new(r"^\*\*\s*([^*]+?)\s*:?\s*\*\*\s*:?$").ok());
    let label = LABEL_RE.get_or_init(|| Regex::new(r"^([A-Za-z][A-Za-z0-9 /&()'-]{0,40}):$").ok());

    [markdown, bold, label]
        .into_iter()
        .filter_map(Option::as_ref)
        .find_map(|re| re.captures(line))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end_matches(':').trim().to_string())
        .filter(|title| !title.is_empty())
}

fn is_decision_heading(title: &str) -> bool {
    static VOCABULARY_RE: OnceLock<Option<Regex>> = OnceLock::new();
    VOCABULARY_RE
        .get_or_init(|| {
            Regex::new(
                r"(?i)\b(decisions?|approach|architecture|design|recommendations?|apis?|interfaces?|data model|schema|dependencies|tech stack|chosen solution)\b",
            )
            .ok()
        })
        .as_ref()
        .is_some_and(|re| re.is_match(title))
}
