//! screen
//!
//! Static safety pre-screen. Runs before anything touches the filesystem or
//! spawns a process. It is a deny-list over imports and raw tokens, which
//! stops accidents and casual misuse, not a determined attacker.

pub mod denylist;

use serde::Serialize;
use tracing::warn;
use tree_sitter::Node;

use crate::analyzer::parse_python;
use denylist::{denied_module, denied_token};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafetyVerdict {
    pub allowed: bool,
    pub reason: Option<String>,
    /// False when the source did not parse cleanly. Such source is let
    /// through unless the policy says otherwise.
    pub syntax_ok: bool,
}

impl SafetyVerdict {
    fn allow(syntax_ok: bool) -> Self {
        Self {
            allowed: true,
            reason: None,
            syntax_ok,
        }
    }

    fn deny(reason: String, syntax_ok: bool) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            syntax_ok,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScreenPolicy {
    /// Reject source that fails to parse instead of passing it through.
    pub reject_unparsable: bool,
}

pub fn screen(source: &str) -> SafetyVerdict {
    screen_with(source, &ScreenPolicy::default())
}

pub fn screen_with(source: &str, policy: &ScreenPolicy) -> SafetyVerdict {
    let tree = parse_python(source);
    if tree.is_none() {
        warn!("python grammar unavailable, import screening skipped");
    }
    let syntax_ok = tree.as_ref().is_some_and(|t| !t.root_node().has_error());

    // Imports are only trusted from a clean parse.
    if syntax_ok {
        if let Some(t) = &tree {
            if let Some((module, cap)) = first_denied_import(t.root_node(), source) {
                return SafetyVerdict::deny(
                    format!("import of `{}` is not allowed ({})", module, cap),
                    syntax_ok,
                );
            }
        }
    }

    if let Some((token, cap)) = denied_token(source) {
        return SafetyVerdict::deny(
            format!("use of `{}` is not allowed ({})", token.trim_end_matches('('), cap),
            syntax_ok,
        );
    }

    if !syntax_ok && policy.reject_unparsable {
        return SafetyVerdict::deny("source could not be parsed".to_string(), syntax_ok);
    }

    SafetyVerdict::allow(syntax_ok)
}

fn first_denied_import(
    node: Node,
    source: &str,
) -> Option<(&'static str, denylist::Capability)> {
    for path in import_paths(node, source) {
        if let Some(hit) = denied_module(&path) {
            return Some(hit);
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(hit) = first_denied_import(child, source) {
            return Some(hit);
        }
    }

    None
}

/// Module paths and imported names referenced by a single import node.
fn import_paths(node: Node, source: &str) -> Vec<String> {
    let mut paths = Vec::new();

    match node.kind() {
        "import_statement" => {
            collect_names(node, source, &mut paths);
        }
        "import_from_statement" => {
            if let Some(module) = node.child_by_field_name("module_name") {
                let dotted = if module.kind() == "relative_import" {
                    let mut cursor = module.walk();
                    let found = module
                        .named_children(&mut cursor)
                        .find(|c| c.kind() == "dotted_name");
                    found
                } else {
                    Some(module)
                };
                if let Some(d) = dotted {
                    paths.push(text_of(d, source));
                }
            }
            collect_names(node, source, &mut paths);
        }
        "future_import_statement" => {
            paths.push("__future__".to_string());
            collect_names(node, source, &mut paths);
        }
        _ => {}
    }

    paths
}

fn collect_names(node: Node, source: &str, out: &mut Vec<String>) {
    let mut cursor = node.walk();
    for name in node.children_by_field_name("name", &mut cursor) {
        let target = if name.kind() == "aliased_import" {
            name.child_by_field_name("name")
        } else {
            Some(name)
        };
        if let Some(t) = target {
            out.push(text_of(t, source));
        }
    }
}

fn text_of(node: Node, source: &str) -> String {
    node.utf8_text(source.as_bytes())
        .unwrap_or("")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}
