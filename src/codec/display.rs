//! codec/display.rs
//!
//! Human-facing rendering of values, the way Python's `str()` prints them:
//! a bare string shows its text, everything else shows its `repr`.

use serde_json::{Map, Number, Value};

pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => {
            let mut out = String::new();
            write_repr(&mut out, other);
            out
        }
    }
}

fn write_repr(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("None"),
        Value::Bool(true) => out.push_str("True"),
        Value::Bool(false) => out.push_str("False"),
        Value::Number(n) => out.push_str(&number_repr(n)),
        Value::String(s) => write_str_repr(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_repr(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => write_dict(out, map),
    }
}

fn write_dict(out: &mut String, map: &Map<String, Value>) {
    out.push('{');
    for (i, (key, item)) in map.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_str_repr(out, key);
        out.push_str(": ");
        write_repr(out, item);
    }
    out.push('}');
}

// Single quotes unless the text holds a single quote and no double quote.
fn write_str_repr(out: &mut String, s: &str) {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
}

/// Python writes exponents with a sign and at least two digits: `1e+25`.
fn number_repr(n: &Number) -> String {
    let text = n.to_string();
    let Some((mantissa, exp)) = text.split_once(['e', 'E']) else {
        return text;
    };
    let (sign, digits) = match exp.strip_prefix('-') {
        Some(d) => ('-', d),
        None => ('+', exp.strip_prefix('+').unwrap_or(exp)),
    };
    let mantissa = mantissa.strip_suffix(".0").unwrap_or(mantissa);
    format!("{}e{}{:0>2}", mantissa, sign, digits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_strings_show_their_text() {
        assert_eq!(display(&json!("olleh")), "olleh");
        assert_eq!(display(&json!("")), "");
    }

    #[test]
    fn containers_show_python_reprs() {
        assert_eq!(display(&json!(["a", 1, null, true])), "['a', 1, None, True]");
        assert_eq!(display(&json!({"k": [1.5, false]})), "{'k': [1.5, False]}");
        assert_eq!(display(&json!(["it's"])), r#"["it's"]"#);
        assert_eq!(display(&json!(["a\nb\\"])), r"['a\nb\\']");
    }

    #[test]
    fn numbers() {
        assert_eq!(display(&json!(-3)), "-3");
        let big: Value = serde_json::from_str("15511210043330985984000000").unwrap();
        assert_eq!(display(&big), "15511210043330985984000000");
        assert_eq!(number_repr(&serde_json::from_str("1e25").unwrap()), "1e+25");
        assert_eq!(number_repr(&serde_json::from_str("1.5e-5").unwrap()), "1.5e-05");
    }
}
