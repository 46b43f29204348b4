//! protocol.rs
//!
//! Turns captured child output into a typed outcome. The child speaks one
//! JSON line:
//!
//!   {"success": true,  "result": "<repr>"}
//!   {"success": false, "error":  "<message>"}
//!
//! written as the last non-empty line of stdout. Anything else falls back to
//! stderr so a crashing child still yields a deterministic outcome.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::sandbox::RawRun;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The harness caught an exception and reported it.
    Raised,
    /// No usable record and the child died noisily.
    Crash,
    /// No usable record and nothing on stderr either.
    Protocol,
    /// The interpreter never ran.
    Spawn,
    /// The call target was rejected on the host; nothing was spawned.
    InvalidTarget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Success { result: String },
    Failure { kind: FailureKind, message: String },
    Timeout { limit: Duration },
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success { .. })
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionOutcome::Success { result } => write!(f, "{}", result),
            ExecutionOutcome::Failure { message, .. } => f.write_str(message),
            ExecutionOutcome::Timeout { limit } => {
                write!(f, "Execution timeout ({}s exceeded)", format_secs(*limit))
            }
        }
    }
}

fn format_secs(d: Duration) -> String {
    if d.subsec_nanos() == 0 {
        d.as_secs().to_string()
    } else {
        format!("{:.1}", d.as_secs_f64())
    }
}

#[derive(Debug, Deserialize)]
struct ResultRecord {
    success: bool,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub fn parse_outcome(raw: &RawRun, limit: Duration) -> ExecutionOutcome {
    if raw.timed_out {
        return ExecutionOutcome::Timeout { limit };
    }

    if let Some(err) = &raw.spawn_error {
        return ExecutionOutcome::Failure {
            kind: FailureKind::Spawn,
            message: err.clone(),
        };
    }

    if let Some(outcome) = last_line(&raw.stdout).and_then(decode_record) {
        return outcome;
    }

    let stderr = raw.stderr.trim();
    if !stderr.is_empty() {
        ExecutionOutcome::Failure {
            kind: FailureKind::Crash,
            message: stderr.to_string(),
        }
    } else {
        let kind = match raw.exit_code {
            Some(0) => FailureKind::Protocol,
            _ => FailureKind::Crash,
        };
        ExecutionOutcome::Failure {
            kind,
            message: "no output".to_string(),
        }
    }
}

fn last_line(stdout: &str) -> Option<&str> {
    stdout.lines().map(str::trim).rev().find(|l| !l.is_empty())
}

fn decode_record(line: &str) -> Option<ExecutionOutcome> {
    let record: ResultRecord = serde_json::from_str(line).ok()?;

    if record.success {
        record
            .result
            .map(|result| ExecutionOutcome::Success { result })
    } else {
        Some(ExecutionOutcome::Failure {
            kind: FailureKind::Raised,
            message: record.error.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(stdout: &str, stderr: &str) -> RawRun {
        RawRun {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code: Some(0),
            ..RawRun::default()
        }
    }

    const LIMIT: Duration = Duration::from_secs(5);

    #[test]
    fn success_record() {
        let out = parse_outcome(&raw("{\"success\": true, \"result\": \"5\"}\n", ""), LIMIT);
        assert_eq!(out, ExecutionOutcome::Success { result: "5".into() });
    }

    #[test]
    fn failure_record() {
        let out = parse_outcome(
            &raw("{\"success\": false, \"error\": \"Execution error: ZeroDivisionError: division by zero\"}", ""),
            LIMIT,
        );
        assert_eq!(
            out,
            ExecutionOutcome::Failure {
                kind: FailureKind::Raised,
                message: "Execution error: ZeroDivisionError: division by zero".into()
            }
        );
    }

    #[test]
    fn failure_record_without_error_text() {
        let out = parse_outcome(&raw("{\"success\": false}", ""), LIMIT);
        assert_eq!(out.to_string(), "Unknown error");
    }

    #[test]
    fn earlier_lines_and_blank_tail_are_ignored() {
        let stdout = "debug 1\n{not json}\n{\"success\": true, \"result\": \"[4, 8]\"}\n\n  \n";
        let out = parse_outcome(&raw(stdout, ""), LIMIT);
        assert_eq!(out, ExecutionOutcome::Success { result: "[4, 8]".into() });
    }

    #[test]
    fn garbage_falls_back_to_stderr() {
        let out = parse_outcome(&raw("hello", "Traceback: boom"), LIMIT);
        assert_eq!(
            out,
            ExecutionOutcome::Failure {
                kind: FailureKind::Crash,
                message: "Traceback: boom".into()
            }
        );
    }

    #[test]
    fn empty_output_is_no_output() {
        let out = parse_outcome(&raw("", ""), LIMIT);
        assert_eq!(
            out,
            ExecutionOutcome::Failure {
                kind: FailureKind::Protocol,
                message: "no output".into()
            }
        );

        let mut crashed = raw("", "");
        crashed.exit_code = Some(1);
        assert!(matches!(
            parse_outcome(&crashed, LIMIT),
            ExecutionOutcome::Failure { kind: FailureKind::Crash, .. }
        ));
    }

    #[test]
    fn success_without_result_is_not_a_record() {
        let out = parse_outcome(&raw("{\"success\": true}", ""), LIMIT);
        assert_eq!(out.to_string(), "no output");
    }

    #[test]
    fn timeout_wins_over_everything() {
        let mut r = raw("{\"success\": true, \"result\": \"1\"}", "");
        r.timed_out = true;
        let out = parse_outcome(&r, LIMIT);
        assert_eq!(out, ExecutionOutcome::Timeout { limit: LIMIT });
        assert_eq!(out.to_string(), "Execution timeout (5s exceeded)");
    }

    #[test]
    fn spawn_error_is_reported() {
        let r = RawRun {
            spawn_error: Some("Execution error: cannot start python3".into()),
            ..RawRun::default()
        };
        assert!(matches!(
            parse_outcome(&r, LIMIT),
            ExecutionOutcome::Failure { kind: FailureKind::Spawn, .. }
        ));
    }
}
