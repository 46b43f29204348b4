//! harness
//!
//! Wraps candidate source in a generated Python driver. The driver looks up
//! the call target in a registry built at synthesis time, invokes it with
//! literal arguments, and prints exactly one JSON result record as its last
//! line of output.

pub mod target;

pub use target::{CallTarget, Segment};

use serde_json::{Map, Value};

use crate::codec;

pub const SOURCE_START: &str = "# ===== CANDIDATE SOURCE START =====";
pub const SOURCE_END: &str = "# ===== CANDIDATE SOURCE END =====";

// `print` is captured before the candidate runs so rebinding it cannot
// swallow the result record.
const PRELUDE: &str = "# Generated by codejudge. Do not edit.\n_cj_print = print\n\n";

const DRIVER: &str = r#"

def _cj_emit(record):
    import json as _cj_json
    try:
        line = _cj_json.dumps(record)
    except Exception as exc:
        line = _cj_json.dumps({"success": False, "error": "serialization error: %s: %s" % (type(exc).__name__, exc)})
    # A leading newline ends any partial line the candidate left behind.
    _cj_print("\n" + line, flush=True)


def _cj_main():
    if _CJ_KEY is None:
        _cj_emit({"success": True, "result": "OK"})
        return
    try:
        target = _CJ_TARGETS[_CJ_KEY]()
    except Exception as exc:
        _cj_emit({"success": False, "error": "cannot resolve target %r: %s: %s" % (_CJ_KEY, type(exc).__name__, exc)})
        return
    try:
        args = {args}
        kwargs = {kwargs}
        result = target(*args, **kwargs)
    except (Exception, SystemExit) as exc:
        _cj_emit({"success": False, "error": "Execution error: %s: %s" % (type(exc).__name__, exc)})
        return
    try:
        text = repr(result)
    except Exception as exc:
        _cj_emit({"success": False, "error": "cannot represent result: %s: %s" % (type(exc).__name__, exc)})
        return
    _cj_emit({"success": True, "result": text})


try:
    _cj_main()
except Exception as exc:
    _cj_emit({"success": False, "error": "harness error: %s: %s" % (type(exc).__name__, exc)})
"#;

/// Build a complete, self-contained program for one test case.
pub fn synthesize(
    source: &str,
    target: Option<&CallTarget>,
    args: &[Value],
    kwargs: &Map<String, Value>,
) -> String {
    let mut out = String::with_capacity(source.len() + PRELUDE.len() + DRIVER.len() + 256);

    out.push_str(PRELUDE);
    out.push_str(SOURCE_START);
    out.push('\n');
    out.push_str(source);
    if !source.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(SOURCE_END);
    out.push_str("\n\n");

    out.push_str(&registry(target));

    out.push_str(&expand_template(
        DRIVER,
        &[
            ("args", &codec::encode_args(args)),
            ("kwargs", &codec::encode_kwargs(kwargs)),
        ],
    ));

    out
}

fn registry(target: Option<&CallTarget>) -> String {
    match target {
        None => "_CJ_TARGETS = {}\n_CJ_KEY = None\n".to_string(),
        Some(t) => {
            let key = codec::encode(&Value::String(t.as_str().to_string()));
            format!(
                "_CJ_TARGETS = {{\n    {key}: lambda: {expr},\n}}\n_CJ_KEY = {key}\n",
                key = key,
                expr = t.render()
            )
        }
    }
}

// Single pass, so substituted text is never rescanned for placeholders.
// Only ever applied to DRIVER, never to text that contains candidate source.
fn expand_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    'scan: while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        for (k, v) in vars {
            let placeholder = format!("{{{k}}}");
            if tail.starts_with(&placeholder) {
                out.push_str(v);
                rest = &tail[placeholder.len()..];
                continue 'scan;
            }
        }
        out.push('{');
        rest = &tail[1..];
    }

    out.push_str(rest);
    out
}
