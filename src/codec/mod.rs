//! codec
//!
//! Literal value codec: call arguments go into the harness as Python
//! literals, return values come back as `repr` text and are decoded into
//! JSON values for comparison against expected outcomes.

mod decode;
mod display;
mod encode;

pub use decode::decode;
pub use display::display;
pub use encode::{encode, encode_args, encode_kwargs};

pub(crate) use decode::Parser;

use serde_json::{Number, Value};

/// Structural equality where numbers compare by value, so an expected `5`
/// matches a returned `5.0` the way Python's `==` does. Integers of any
/// size compare digit for digit.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        // Python's bool is an int: True == 1, False == 0.
        (Value::Bool(flag), Value::Number(n)) | (Value::Number(n), Value::Bool(flag)) => {
            numbers_equal(n, &Number::from(u8::from(*flag)))
        }
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xm), Value::Object(ym)) => {
            xm.len() == ym.len()
                && xm
                    .iter()
                    .all(|(k, x)| ym.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

fn numbers_equal(x: &Number, y: &Number) -> bool {
    match (integer_digits(x), integer_digits(y)) {
        (Some(dx), Some(dy)) => dx == dy,
        _ => match (x.as_f64(), y.as_f64()) {
            (Some(fx), Some(fy)) => fx == fy,
            _ => false,
        },
    }
}

/// Canonical digits of an integral number, `None` for floats.
fn integer_digits(n: &Number) -> Option<String> {
    let text = n.to_string();
    if text.contains(['.', 'e', 'E']) {
        return None;
    }
    Some(if text == "-0" { "0".to_string() } else { text })
}
