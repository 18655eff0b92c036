//! Phrase classifier: standalone lines that announce a choice

/// Shorter lines are noise
pub const MIN_PHRASE_CHARS: usize = 20;
/// Longer lines are paragraphs, not single decisions
pub const MAX_PHRASE_CHARS: usize = 300;

const INDICATORS: &[&str] = &[
    "decided",
    "chose",
    "chosen",
    "using",
    "created",
    "implemented",
    "will use",
    "went with",
    "selected",
    "picked",
    "recommend",
    "should use",
    "best approach",
    "opted for",
    "settled on",
    "design direction",
    "final design",
    "winning concept",
];

/// Whether a line reads as a single decision statement
pub fn is_decision_line(line: &str) -> bool {
    let len = line.chars().count();
    if len <= MIN_PHRASE_CHARS || len >= MAX_PHRASE_CHARS {
        return false;
    }
    let lower = line.to_lowercase();
    INDICATORS.iter().any(|phrase| lower.contains(phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicator_within_band() {
        assert!(is_decision_line("We decided to use PostgreSQL for storage"));
        assert!(is_decision_line("- Went with JWT tokens for the session layer"));
    }

    #[test]
    fn test_length_band_is_exclusive() {
        assert!(!is_decision_line("using it"));
        let exactly_min = format!("using{}", "x".repeat(MIN_PHRASE_CHARS - 5));
        assert_eq!(exactly_min.chars().count(), MIN_PHRASE_CHARS);
        assert!(!is_decision_line(&exactly_min));
        let long = format!("We decided {}", "very ".repeat(80));
        assert!(!is_decision_line(&long));
    }

    #[test]
    fn test_no_indicator() {
        assert!(!is_decision_line("This paragraph describes the weather today."));
    }
}
