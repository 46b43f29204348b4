//! codec/encode.rs
//!
//! JSON values -> Python literal source text.

use serde_json::{Map, Value};

/// Render a value as a Python literal that evaluates back to the same value.
pub fn encode(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Positional arguments as a tuple literal.
pub fn encode_args(args: &[Value]) -> String {
    match args {
        [] => "()".to_string(),
        [single] => format!("({},)", encode(single)),
        many => {
            let parts: Vec<String> = many.iter().map(encode).collect();
            format!("({})", parts.join(", "))
        }
    }
}

/// Named arguments as a dict literal with string keys.
pub fn encode_kwargs(kwargs: &Map<String, Value>) -> String {
    let mut out = String::new();
    write_object(&mut out, kwargs);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("None"),
        Value::Bool(true) => out.push_str("True"),
        Value::Bool(false) => out.push_str("False"),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => write_object(out, map),
    }
}

fn write_object(out: &mut String, map: &Map<String, Value>) {
    out.push('{');
    for (i, (key, item)) in map.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_string(out, key);
        out.push_str(": ");
        write_value(out, item);
    }
    out.push('}');
}

// JSON string escapes (\" \\ \n \r \t \b \f \uXXXX) are all valid inside a
// double-quoted Python literal.
fn write_string(out: &mut String, s: &str) {
    match serde_json::to_string(s) {
        Ok(quoted) => out.push_str(&quoted),
        Err(_) => {
            out.push('"');
            for c in s.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
                    c => out.push(c),
                }
            }
            out.push('"');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_use_python_spelling() {
        assert_eq!(encode(&json!(null)), "None");
        assert_eq!(encode(&json!(true)), "True");
        assert_eq!(encode(&json!(false)), "False");
        assert_eq!(encode(&json!(-7)), "-7");
        assert_eq!(encode(&json!(2.5)), "2.5");
    }

    #[test]
    fn strings_are_escaped_not_interpolated() {
        let hostile = json!("\"); import os; (\"");
        assert_eq!(encode(&hostile), r#""\"); import os; (\"""#);
        assert_eq!(encode(&json!("a\nb")), r#""a\nb""#);
    }

    #[test]
    fn tuples_keep_trailing_comma_for_single_element() {
        assert_eq!(encode_args(&[]), "()");
        assert_eq!(encode_args(&[json!(1)]), "(1,)");
        assert_eq!(encode_args(&[json!(2), json!(3)]), "(2, 3)");
    }

    #[test]
    fn nested_containers() {
        let v = json!({"xs": [1, [2, null]], "ok": false});
        let text = encode(&v);
        assert!(text.contains(r#""xs": [1, [2, None]]"#));
        assert!(text.contains(r#""ok": False"#));
    }

    #[test]
    fn kwargs_render_as_dict() {
        let mut map = Map::new();
        map.insert("sep".into(), json!(", "));
        assert_eq!(encode_kwargs(&map), r#"{"sep": ", "}"#);
        assert_eq!(encode_kwargs(&Map::new()), "{}");
    }
}
