//! harness/target.rs
//!
//! Call targets such as `solution` or `Solution().process`, validated on
//! the host so the generated driver never evaluates free-form text.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::codec::{self, Parser};

const PY_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise",
    "return", "try", "while", "with", "yield",
];

fn ident_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex"))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub name: String,
    /// Literal arguments when the segment is called, e.g. `Counter(3)`.
    pub call: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallTarget {
    text: String,
    segments: Vec<Segment>,
}

impl CallTarget {
    /// Grammar: `segment ("." segment)*`, `segment = ident ["(" literals ")"]`.
    pub fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        if text.is_empty() {
            return Err("empty target".into());
        }

        let mut p = Parser::new(text);
        let mut segments = Vec::new();

        loop {
            p.skip_ws();
            let name = read_ident(&mut p)?;
            let call = if p.eat('(') {
                Some(read_call_args(&mut p)?)
            } else {
                None
            };
            segments.push(Segment { name, call });

            p.skip_ws();
            if p.at_end() {
                break;
            }
            if !p.eat('.') {
                return Err(format!("unexpected '{}' in target", p.rest()));
            }
        }

        Ok(Self {
            text: text.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Python expression for the registry thunk. Only validated identifiers
    /// and codec-encoded literals end up in it.
    pub fn render(&self) -> String {
        self.segments
            .iter()
            .map(|s| match &s.call {
                None => s.name.clone(),
                Some(args) => {
                    let parts: Vec<String> = args.iter().map(codec::encode).collect();
                    format!("{}({})", s.name, parts.join(", "))
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }
}

fn read_ident(p: &mut Parser<'_>) -> Result<String, String> {
    let mut name = String::new();
    while let Some(c) = p.peek() {
        if c.is_ascii_alphanumeric() || c == '_' {
            name.push(c);
            p.bump();
        } else {
            break;
        }
    }

    if !ident_re().is_match(&name) {
        return Err(match p.peek() {
            Some(c) if name.is_empty() => format!("expected identifier but found '{}'", c),
            _ if name.is_empty() => "expected identifier".to_string(),
            _ => format!("'{}' is not an identifier", name),
        });
    }
    if PY_KEYWORDS.contains(&name.as_str()) {
        return Err(format!("'{}' is a keyword", name));
    }
    if name.starts_with("__") {
        return Err(format!("dunder name '{}' is not allowed", name));
    }

    Ok(name)
}

fn read_call_args(p: &mut Parser<'_>) -> Result<Vec<Value>, String> {
    let mut args = Vec::new();
    loop {
        if p.eat(')') {
            return Ok(args);
        }
        args.push(p.parse_value()?);
        if !p.eat(',') {
            if p.eat(')') {
                return Ok(args);
            }
            return Err("expected ',' or ')' in call arguments".into());
        }
    }
}
