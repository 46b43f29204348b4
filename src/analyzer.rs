//! analyzer.rs
//!
//! Tree-sitter based syntax checks and a light PEP 8 style pass over
//! candidate source.

use std::cell::RefCell;

use serde::Serialize;
use tree_sitter::{Node, Parser, Tree};

const MAX_LINE_LEN: usize = 79;

thread_local! {
    static PY_PARSER: RefCell<Option<Parser>> = RefCell::new(make_python_parser());
}

fn make_python_parser() -> Option<Parser> {
    let mut p = Parser::new();
    p.set_language(&tree_sitter_python::language()).ok()?;
    Some(p)
}

/// Parse Python source on this thread's parser. `None` only if the grammar
/// could not be loaded or parsing was aborted.
pub fn parse_python(source: &str) -> Option<Tree> {
    PY_PARSER.with(|p| p.borrow_mut().as_mut()?.parse(source, None))
}

pub fn validate_syntax(source: &str) -> Result<(), Vec<String>> {
    let tree = parse_python(source)
        .ok_or_else(|| vec!["Error: Python grammar unavailable".to_string()])?;
    let root = tree.root_node();

    if !root.has_error() {
        return Ok(());
    }

    let msg = match first_error(root) {
        Some(node) if node.is_missing() => format!(
            "Syntax Error on line {}: missing '{}'",
            node.start_position().row + 1,
            node.kind()
        ),
        Some(node) => format!(
            "Syntax Error on line {}: unexpected '{}'",
            node.start_position().row + 1,
            snippet(node, source)
        ),
        None => "Syntax Error: source could not be parsed".to_string(),
    };

    Err(vec![msg])
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_error(child) {
            return Some(found);
        }
    }
    None
}

fn snippet(node: Node, source: &str) -> String {
    let text = node.utf8_text(source.as_bytes()).unwrap_or("");
    let line = text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");

    if line.chars().count() > 40 {
        let mut s: String = line.chars().take(40).collect();
        s.push_str("...");
        s
    } else {
        line.to_string()
    }
}

/* ============================================================
   Style
   ============================================================ */

#[derive(Debug, Clone, Serialize)]
pub struct StyleReport {
    pub score: f64,
    pub notes: Vec<String>,
}

pub fn check_style(source: &str) -> StyleReport {
    let mut notes = Vec::new();
    let mut score: f64 = 1.0;

    let lines: Vec<&str> = source.lines().collect();

    let long_lines: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| l.chars().count() > MAX_LINE_LEN)
        .map(|(i, _)| i + 1)
        .collect();
    if !long_lines.is_empty() {
        let more = if long_lines.len() > 3 { " and more..." } else { "" };
        notes.push(format!(
            "Lines {:?} exceed {} characters{}",
            &long_lines[..long_lines.len().min(3)],
            MAX_LINE_LEN,
            more
        ));
        score -= (0.1 * long_lines.len() as f64).min(0.3);
    }

    let trailing: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| l.trim_end() != **l)
        .map(|(i, _)| i + 1)
        .collect();
    if !trailing.is_empty() {
        notes.push(format!(
            "Trailing whitespace on lines {:?}",
            &trailing[..trailing.len().min(3)]
        ));
        score -= 0.05;
    }

    if notes.is_empty() {
        notes.push("PEP8 check OK".to_string());
    }

    StyleReport {
        score: score.max(0.0),
        notes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_source_passes() {
        assert!(validate_syntax("def solution(a, b):\n    return a + b\n").is_ok());
    }

    #[test]
    fn reports_line_of_first_error() {
        let errs = validate_syntax("x = 1\ndef broken(:\n    return 2\n").unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(errs[0].starts_with("Syntax Error on line 2"), "{}", errs[0]);
    }

    #[test]
    fn clean_style() {
        let report = check_style("def f():\n    return 1\n");
        assert_eq!(report.score, 1.0);
        assert_eq!(report.notes, vec!["PEP8 check OK".to_string()]);
    }

    #[test]
    fn long_and_trailing_lines_cost_points() {
        let long = format!("x = '{}'\n", "a".repeat(90));
        let src = format!("{long}{long}y = 1   \n");
        let report = check_style(&src);
        assert!((report.score - 0.75).abs() < 1e-9, "score {}", report.score);
        assert_eq!(report.notes[0], "Lines [1, 2] exceed 79 characters");
        assert_eq!(report.notes[1], "Trailing whitespace on lines [3]");
    }

    #[test]
    fn long_line_penalty_is_capped() {
        let src = format!("x = '{}'\n", "a".repeat(90)).repeat(6);
        let report = check_style(&src);
        assert!((report.score - 0.7).abs() < 1e-9);
        assert!(report.notes[0].ends_with("and more..."));
    }
}
