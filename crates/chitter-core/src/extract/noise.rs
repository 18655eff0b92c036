//! Structural noise filter
//!
//! Drops blank lines, code fences (and everything inside them), horizontal
//! rules, table rows and borders, and box-drawing decoration.

/// Lines worth classifying, trimmed, in source order
pub fn meaningful_lines(text: &str) -> Vec<&str> {
    let mut in_fence = false;
    text.lines()
        .map(str::trim)
        .filter(|line| {
            if is_fence(line) {
                in_fence = !in_fence;
                return false;
            }
            !in_fence && !line.is_empty() && !is_noise(line)
        })
        .collect()
}

fn is_fence(line: &str) -> bool {
    line.starts_with("```") || line.starts_with("~~~")
}

/// Table rows/borders, rules and box drawing
pub fn is_noise(line: &str) -> bool {
    is_table_row(line) || is_rule(line) || is_box_drawing(line)
}

fn is_table_row(line: &str) -> bool {
    line.starts_with('|') || line.starts_with('│') || line.starts_with('┃') || line.starts_with('║')
}

fn is_rule(line: &str) -> bool {
    let marks = line.chars().filter(|c| !c.is_whitespace()).count();
    marks >= 3
        && line
            .chars()
            .all(|c| c.is_whitespace() || matches!(c, '-' | '*' | '_' | '=' | '+' | '|' | ':'))
}

fn is_box_drawing(line: &str) -> bool {
    line.chars()
        .all(|c| c.is_whitespace() || ('\u{2500}'..='\u{257F}').contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_lines_are_dropped() {
        let text = "\
Intro line
| col | col |
|-----|-----|
+-----+-----+
---
***
━━━━━━━━━━
│ boxed row │

Kept line";
        assert_eq!(meaningful_lines(text), vec!["Intro line", "Kept line"]);
    }

    #[test]
    fn test_code_fence_contents_are_dropped() {
        let text = "before\n```rust\nlet chosen = using_this();\n```\nafter";
        assert_eq!(meaningful_lines(text), vec!["before", "after"]);
    }

    #[test]
    fn test_unterminated_fence_swallows_rest() {
        let text = "before\n~~~\nstill code";
        assert_eq!(meaningful_lines(text), vec!["before"]);
    }

    #[test]
    fn test_markdown_bullets_are_not_rules() {
        assert!(!is_noise("- We use Postgres"));
        assert!(!is_noise("* item"));
    }
}
