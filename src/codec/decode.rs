//! codec/decode.rs
//!
//! Python `repr` text -> JSON values.
//!
//! Only the literal subset a sandboxed return value can round-trip through
//! is understood. Object reprs, bytes and complex numbers are rejected so the
//! caller can fall back to comparing the raw text.

use std::cmp::Ordering;

use serde_json::{Map, Number, Value};

pub fn decode(text: &str) -> Result<Value, String> {
    let mut p = Parser::new(text);
    let value = p.parse_value()?;
    p.skip_ws();
    if !p.at_end() {
        return Err(format!("unexpected trailing input at offset {}", p.pos()));
    }
    Ok(value)
}

/// Cursor over Python literal text. Shared with the call-target parser,
/// which reads constructor arguments with it.
pub(crate) struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    pub(crate) fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub(crate) fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    pub(crate) fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    /// Skip whitespace, then consume `c` if it is next.
    pub(crate) fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<(), String> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(match self.peek() {
                Some(found) => format!("expected '{}' but found '{}' at offset {}", c, found, self.pos),
                None => format!("expected '{}' but input ended", c),
            })
        }
    }

    pub(crate) fn parse_value(&mut self) -> Result<Value, String> {
        self.skip_ws();
        match self.peek() {
            None => Err("unexpected end of input".into()),
            Some('[') => {
                self.bump();
                Ok(Value::Array(self.parse_items(']')?.0))
            }
            Some('(') => {
                self.bump();
                let (mut items, trailing_comma) = self.parse_items(')')?;
                // `(x)` is just a parenthesised value, `(x,)` is a tuple.
                if items.len() == 1 && !trailing_comma {
                    Ok(items.remove(0))
                } else {
                    Ok(Value::Array(items))
                }
            }
            Some('{') => {
                self.bump();
                self.parse_brace()
            }
            Some('\'') | Some('"') => self.parse_string().map(Value::String),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.parse_number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.parse_word(),
            Some(c) => Err(format!("unexpected character '{}' at offset {}", c, self.pos)),
        }
    }

    /// Comma separated values up to `close`. Reports whether a comma followed
    /// the last item.
    fn parse_items(&mut self, close: char) -> Result<(Vec<Value>, bool), String> {
        let mut items = Vec::new();
        let mut trailing_comma = false;
        loop {
            if self.eat(close) {
                return Ok((items, trailing_comma));
            }
            items.push(self.parse_value()?);
            trailing_comma = self.eat(',');
            if !trailing_comma {
                self.expect(close)?;
                return Ok((items, false));
            }
        }
    }

    fn parse_brace(&mut self) -> Result<Value, String> {
        if self.eat('}') {
            return Ok(Value::Object(Map::new()));
        }

        let first = self.parse_value()?;
        if !self.eat(':') {
            // set literal
            let mut items = vec![first];
            if self.eat(',') {
                let (rest, _) = self.parse_items('}')?;
                items.extend(rest);
            } else {
                self.expect('}')?;
            }
            return Ok(Value::Array(canonical_set(items)));
        }

        let mut map = Map::new();
        let value = self.parse_value()?;
        map.insert(key_text(first)?, value);
        loop {
            if self.eat('}') {
                break;
            }
            self.expect(',')?;
            if self.eat('}') {
                break;
            }
            let key = self.parse_value()?;
            self.expect(':')?;
            let value = self.parse_value()?;
            map.insert(key_text(key)?, value);
        }
        Ok(Value::Object(map))
    }

    fn parse_word(&mut self) -> Result<Value, String> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        let word = &self.src[start..self.pos];

        match word {
            "None" => Ok(Value::Null),
            "True" => Ok(Value::Bool(true)),
            "False" => Ok(Value::Bool(false)),
            "set" | "frozenset" => {
                self.expect('(')?;
                if self.eat(')') {
                    return Ok(Value::Array(Vec::new()));
                }
                let inner = self.parse_value()?;
                self.expect(')')?;
                match inner {
                    Value::Array(items) => Ok(Value::Array(canonical_set(items))),
                    _ => Err(format!("unsupported {}() argument", word)),
                }
            }
            "inf" | "nan" => Err(format!("non-finite float '{}' has no JSON form", word)),
            "b" | "rb" | "br" if matches!(self.peek(), Some('\'') | Some('"')) => {
                Err("bytes literals are not supported".into())
            }
            "r" | "u" | "R" | "U" if matches!(self.peek(), Some('\'') | Some('"')) => {
                let raw = word.eq_ignore_ascii_case("r");
                let s = if raw { self.parse_raw_string()? } else { self.parse_string()? };
                Ok(Value::String(s))
            }
            other => Err(format!("unsupported literal '{}'", other)),
        }
    }

    fn parse_number(&mut self) -> Result<Value, String> {
        let start = self.pos;
        if matches!(self.peek(), Some('-') | Some('+')) {
            self.bump();
        }
        if matches!(self.peek(), Some(c) if c.is_alphabetic()) {
            let word_start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_alphabetic()) {
                self.bump();
            }
            return Err(format!(
                "non-finite float '{}' has no JSON form",
                &self.src[word_start..self.pos]
            ));
        }

        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' | '_' => {}
                '.' => is_float = true,
                'e' | 'E' => {
                    is_float = true;
                    self.bump();
                    if matches!(self.peek(), Some('-') | Some('+')) {
                        self.bump();
                    }
                    continue;
                }
                _ => break,
            }
            self.bump();
        }

        if matches!(self.peek(), Some('j') | Some('J')) {
            return Err("complex numbers are not supported".into());
        }

        let text: String = self.src[start..self.pos].chars().filter(|c| *c != '_').collect();
        let text = text.strip_prefix('+').unwrap_or(&text);

        if is_float {
            let f: f64 = text
                .parse()
                .map_err(|_| format!("invalid float literal '{}'", text))?;
            return Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| format!("non-finite float '{}' has no JSON form", text));
        }

        if let Ok(i) = text.parse::<i64>() {
            return Ok(Value::Number(i.into()));
        }
        if let Ok(u) = text.parse::<u64>() {
            return Ok(Value::Number(u.into()));
        }
        // Arbitrary precision keeps every digit of a big int.
        serde_json::from_str::<Number>(text)
            .map(Value::Number)
            .map_err(|_| format!("invalid integer literal '{}'", text))
    }

    pub(crate) fn parse_string(&mut self) -> Result<String, String> {
        let quote = self.bump().ok_or("expected string")?;
        let triple = self.rest().starts_with(&format!("{quote}{quote}"));
        if triple {
            self.bump();
            self.bump();
        }

        let mut out = String::new();
        loop {
            let c = self.bump().ok_or("unterminated string literal")?;
            if c == quote {
                if !triple {
                    return Ok(out);
                }
                if self.rest().starts_with(&format!("{quote}{quote}")) {
                    self.bump();
                    self.bump();
                    return Ok(out);
                }
                out.push(c);
                continue;
            }
            if c == '\n' && !triple {
                return Err("newline in single-quoted string".into());
            }
            if c != '\\' {
                out.push(c);
                continue;
            }
            self.parse_escape(&mut out)?;
        }
    }

    fn parse_raw_string(&mut self) -> Result<String, String> {
        let quote = self.bump().ok_or("expected string")?;
        let mut out = String::new();
        loop {
            let c = self.bump().ok_or("unterminated string literal")?;
            if c == quote {
                return Ok(out);
            }
            out.push(c);
            if c == '\\' {
                if let Some(next) = self.bump() {
                    out.push(next);
                }
            }
        }
    }

    fn parse_escape(&mut self, out: &mut String) -> Result<(), String> {
        let e = self.bump().ok_or("unterminated escape")?;
        match e {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'v' => out.push('\u{0b}'),
            '0'..='7' => {
                let mut code = e.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match self.peek().and_then(|c| c.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            self.bump();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(code).ok_or("invalid octal escape")?);
            }
            'x' => out.push(self.hex_escape(2)?),
            'u' => out.push(self.hex_escape(4)?),
            'U' => out.push(self.hex_escape(8)?),
            other => {
                // Python keeps unknown escapes verbatim.
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn hex_escape(&mut self, digits: usize) -> Result<char, String> {
        let mut code = 0u32;
        for _ in 0..digits {
            let d = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or("truncated hex escape")?;
            code = code * 16 + d;
        }
        char::from_u32(code).ok_or_else(|| format!("invalid code point {:#x}", code))
    }
}

/// Set iteration order follows the child's string hashing, so elements are
/// sorted before comparison ever sees them.
fn canonical_set(mut items: Vec<Value>) -> Vec<Value> {
    items.sort_by(canonical_cmp);
    items
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn canonical_cmp(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (fx, fy) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            fx.partial_cmp(&fy)
                .unwrap_or(Ordering::Equal)
                .then_with(|| x.to_string().cmp(&y.to_string()))
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(xs), Value::Array(ys)) => xs
            .iter()
            .zip(ys)
            .map(|(x, y)| canonical_cmp(x, y))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| xs.len().cmp(&ys.len())),
        (Value::Object(_), Value::Object(_)) => a.to_string().cmp(&b.to_string()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

// Mirrors json.dumps: scalar keys are stringified, containers are refused.
fn key_text(key: Value) -> Result<String, String> {
    match key {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok("null".into()),
        other => Err(format!("unsupported dict key {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn python_reprs() {
        assert_eq!(decode("5").unwrap(), json!(5));
        assert_eq!(decode("-12").unwrap(), json!(-12));
        assert_eq!(decode("0.1").unwrap(), json!(0.1));
        assert_eq!(decode("1e-05").unwrap(), json!(0.00001));
        assert_eq!(decode("None").unwrap(), json!(null));
        assert_eq!(decode("True").unwrap(), json!(true));
        assert_eq!(decode("'Processed: test'").unwrap(), json!("Processed: test"));
        assert_eq!(decode("[4, 8]").unwrap(), json!([4, 8]));
        assert_eq!(decode("[]").unwrap(), json!([]));
    }

    #[test]
    fn quoting_and_escapes() {
        assert_eq!(decode(r#""it's""#).unwrap(), json!("it's"));
        assert_eq!(decode(r#"'say "hi"'"#).unwrap(), json!("say \"hi\""));
        assert_eq!(decode(r"'a\'b'").unwrap(), json!("a'b"));
        assert_eq!(decode(r"'line\nnext\ttab'").unwrap(), json!("line\nnext\ttab"));
        assert_eq!(decode(r"'\x41é\U0001F600'").unwrap(), json!("Aé😀"));
        assert_eq!(decode("'\"\"\"'").unwrap(), json!("\"\"\""));
    }

    #[test]
    fn tuples_sets_and_dicts() {
        assert_eq!(decode("(1, 2)").unwrap(), json!([1, 2]));
        assert_eq!(decode("(1,)").unwrap(), json!([1]));
        assert_eq!(decode("()").unwrap(), json!([]));
        assert_eq!(decode("{1, 2, 3}").unwrap(), json!([1, 2, 3]));
        assert_eq!(decode("set()").unwrap(), json!([]));
        assert_eq!(
            decode("{'a': 1, 'b': [True, None]}").unwrap(),
            json!({"a": 1, "b": [true, null]})
        );
        assert_eq!(decode("{1: 'x', None: 2}").unwrap(), json!({"1": "x", "null": 2}));
        assert_eq!(decode("{}").unwrap(), json!({}));
    }

    #[test]
    fn unsupported_reprs_are_errors() {
        assert!(decode("<__main__.Solution object at 0x7f3a>").is_err());
        assert!(decode("b'raw'").is_err());
        assert!(decode("inf").is_err());
        assert!(decode("-inf").is_err());
        assert!(decode("nan").is_err());
        assert!(decode("3j").is_err());
        assert!(decode("[1, 2").is_err());
        assert!(decode("1 2").is_err());
        assert!(decode("{(1, 2): 3}").is_err());
    }

    #[test]
    fn underscores_and_big_unsigned() {
        assert_eq!(decode("1_000").unwrap(), json!(1000));
        assert_eq!(decode("18446744073709551615").unwrap(), json!(u64::MAX));
    }

    #[test]
    fn big_ints_keep_every_digit() {
        let v = decode("15511210043330985984000000").unwrap();
        assert_eq!(v.to_string(), "15511210043330985984000000");
        let v = decode("[18446744073709551616, -18446744073709551617]").unwrap();
        assert_eq!(v.to_string(), "[18446744073709551616,-18446744073709551617]");
    }

    #[test]
    fn sets_come_back_in_canonical_order() {
        assert_eq!(decode("{'banana', 'apple', 'cherry'}").unwrap(), json!(["apple", "banana", "cherry"]));
        assert_eq!(decode("{3, 1.5, -2}").unwrap(), json!([-2, 1.5, 3]));
        assert_eq!(decode("frozenset({'b', 'a'})").unwrap(), json!(["a", "b"]));
        assert_eq!(decode("{(2, 'x'), (1, 'y'), None}").unwrap(), json!([null, [1, "y"], [2, "x"]]));
        // Lists and tuples keep their order.
        assert_eq!(decode("['b', 'a']").unwrap(), json!(["b", "a"]));
    }
}
