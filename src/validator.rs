//! validator.rs
//!
//! Runs a submission against an ordered list of test cases and turns the
//! outcomes into feedback lines. Every failure caused by the submission ends
//! up as a line in the report; only host problems are `Err`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::challenge::TestCase;
use crate::codec;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::harness::{self, CallTarget};
use crate::protocol::{parse_outcome, ExecutionOutcome, FailureKind};
use crate::sandbox::{ConcurrencyBudget, Sandbox};
use crate::screen::{screen_with, SafetyVerdict, ScreenPolicy};

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub all_passed: bool,
    /// Summary line first, then one line per case in input order.
    pub feedback: Vec<String>,
    pub passed: usize,
    pub total: usize,
    pub duration_ms: u64,
    /// RFC 3339, UTC.
    pub generated_at: String,
}

impl ValidationReport {
    fn new(all_passed: bool, feedback: Vec<String>, passed: usize, total: usize, started: Instant) -> Self {
        Self {
            all_passed,
            feedback,
            passed,
            total,
            duration_ms: started.elapsed().as_millis() as u64,
            generated_at: Utc::now().to_rfc3339(),
        }
    }
}

/* ============================================================
   Screen cache
   ============================================================ */

/// Verdicts keyed by the SHA-256 of the source. Screening is pure, so a
/// cached verdict is always current for the same policy.
#[derive(Debug, Default)]
pub struct ScreenCache {
    map: Mutex<HashMap<String, SafetyVerdict>>,
}

impl ScreenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<SafetyVerdict> {
        self.map
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn insert(&self, key: String, verdict: SafetyVerdict) {
        self.map
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, verdict);
    }

    pub fn len(&self) -> usize {
        self.map.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn source_key(source: &str) -> String {
    let mut h = Sha256::new();
    h.update(source.as_bytes());
    hex::encode(h.finalize())
}

/* ============================================================
   Validator
   ============================================================ */

#[derive(Debug)]
pub struct Validator {
    config: EngineConfig,
    policy: ScreenPolicy,
    sandbox: Sandbox,
    cache: ScreenCache,
}

impl Validator {
    /// Owns a fresh budget sized from `config.max_concurrent`.
    pub fn new(config: EngineConfig) -> Self {
        let budget = Arc::new(ConcurrencyBudget::new(config.max_concurrent));
        Self::with_budget(config, budget)
    }

    /// Shares `budget` with whoever else holds it.
    pub fn with_budget(config: EngineConfig, budget: Arc<ConcurrencyBudget>) -> Self {
        let sandbox = Sandbox::new(config.python.clone(), budget);
        Self {
            policy: config.screen_policy(),
            config,
            sandbox,
            cache: ScreenCache::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn budget(&self) -> &Arc<ConcurrencyBudget> {
        self.sandbox.budget()
    }

    pub fn cache(&self) -> &ScreenCache {
        &self.cache
    }

    pub fn screen(&self, source: &str) -> SafetyVerdict {
        let key = source_key(source);
        if let Some(verdict) = self.cache.get(&key) {
            debug!(key = %&key[..12], "screen cache hit");
            return verdict;
        }
        let verdict = screen_with(source, &self.policy);
        self.cache.insert(key, verdict.clone());
        verdict
    }

    /// One sandboxed run of `case` against `source`. No screening here.
    pub fn execute(&self, source: &str, case: &TestCase) -> EngineResult<ExecutionOutcome> {
        let target = match case.target_expr().map(CallTarget::parse).transpose() {
            Ok(t) => t,
            Err(e) => {
                return Ok(ExecutionOutcome::Failure {
                    kind: FailureKind::InvalidTarget,
                    message: format!(
                        "invalid target `{}`: {}",
                        case.target.as_deref().unwrap_or_default().trim(),
                        e
                    ),
                })
            }
        };

        let program = harness::synthesize(source, target.as_ref(), &case.args, &case.kwargs);
        let raw = self.sandbox.run(&program, self.config.timeout)?;
        Ok(parse_outcome(&raw, self.config.timeout))
    }

    pub fn validate(&self, source: &str, test_cases: &[TestCase], expected: &[Value]) -> EngineResult<ValidationReport> {
        let started = Instant::now();

        if test_cases.len() != expected.len() {
            return Err(EngineError::CaseCountMismatch {
                cases: test_cases.len(),
                expected: expected.len(),
            });
        }

        if test_cases.is_empty() {
            return Ok(ValidationReport::new(
                true,
                vec!["No test cases defined".to_string()],
                0,
                0,
                started,
            ));
        }

        let verdict = self.screen(source);
        if !verdict.allowed {
            let reason = verdict.reason.unwrap_or_else(|| "unknown reason".to_string());
            warn!(%reason, "submission rejected by screen");
            return Ok(ValidationReport::new(
                false,
                vec![format!("❌ Unsafe code rejected: {}", reason)],
                0,
                test_cases.len(),
                started,
            ));
        }

        let total = test_cases.len();
        let mut passed = 0;
        let mut lines = Vec::with_capacity(total + 1);

        for (i, (case, want)) in test_cases.iter().zip(expected).enumerate() {
            let n = i + 1;
            match self.execute(source, case)? {
                ExecutionOutcome::Success { result } => {
                    let got = codec::decode(&result).unwrap_or(Value::String(result));
                    if codec::values_equal(&got, want) {
                        passed += 1;
                        lines.push(format!("✅ Test {}: Passed", n));
                    } else {
                        lines.push(format!(
                            "❌ Test {}: Expected {}, got {}",
                            n,
                            codec::display(want),
                            codec::display(&got)
                        ));
                    }
                }
                failed => lines.push(format!("❌ Test {}: {}", n, failed)),
            }
        }

        let all_passed = passed == total;
        let summary = if all_passed {
            format!("🎉 All {} test cases passed!", total)
        } else {
            format!("⚠️  {}/{} test cases passed", passed, total)
        };
        lines.insert(0, summary);

        let report = ValidationReport::new(all_passed, lines, passed, total, started);
        info!(passed, total, ms = report.duration_ms, "validation finished");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validator() -> Validator {
        Validator::new(EngineConfig::default().with_max_concurrent(2))
    }

    #[test]
    fn no_cases_is_a_pass() {
        let v = validator();
        let report = v.validate("def solution(): pass\n", &[], &[]).unwrap();
        assert!(report.all_passed);
        assert_eq!(report.feedback, vec!["No test cases defined".to_string()]);
        assert_eq!(report.total, 0);
    }

    #[test]
    fn count_mismatch_is_a_caller_error() {
        let v = validator();
        let err = v
            .validate("x = 1\n", &[TestCase::call("solution", vec![])], &[])
            .unwrap_err();
        assert!(matches!(err, EngineError::CaseCountMismatch { cases: 1, expected: 0 }));
    }

    #[test]
    fn rejection_never_touches_the_sandbox() {
        let v = validator();
        let cases = vec![TestCase::call("solution", vec![json!(1)])];
        let report = v
            .validate("import os\ndef solution(x):\n    return x\n", &cases, &[json!(1)])
            .unwrap();
        assert!(!report.all_passed);
        assert_eq!(report.feedback.len(), 1);
        assert!(report.feedback[0].starts_with("❌ Unsafe code rejected: "));
        assert!(report.feedback[0].contains("`os`"));
        assert_eq!(v.budget().available(), 2);
    }

    #[test]
    fn verdicts_are_cached_by_source() {
        let v = validator();
        let src = "def solution(a, b):\n    return a + b\n";
        assert!(v.cache().is_empty());
        let first = v.screen(src);
        let second = v.screen(src);
        assert_eq!(first, second);
        assert_eq!(v.cache().len(), 1);
        v.screen("x = eval('1')\n");
        assert_eq!(v.cache().len(), 2);
    }

    #[test]
    fn invalid_target_is_reported_without_spawning() {
        let v = validator();
        let case = TestCase::call("__import__('os').system", vec![]);
        let out = v.execute("x = 1\n", &case).unwrap();
        match out {
            ExecutionOutcome::Failure { kind, message } => {
                assert_eq!(kind, FailureKind::InvalidTarget);
                assert!(message.starts_with("invalid target `__import__('os').system`"), "{}", message);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(v.budget().available(), 2);
    }

    #[test]
    fn screening_cannot_be_switched_off_from_the_environment() {
        let mut cfg = EngineConfig::default();
        cfg.apply_env_with(|k| (k == "CODEJUDGE_SAFE_MODE").then(|| "off".to_string()))
            .unwrap();
        cfg.python = "codejudge-no-such-interpreter".into();
        let v = Validator::new(cfg);
        let cases = vec![TestCase::call("solution", vec![])];
        let report = v.validate("import os\n", &cases, &[json!(null)]).unwrap();
        assert_eq!(report.feedback.len(), 1);
        assert!(report.feedback[0].starts_with("❌ Unsafe code rejected: "), "{:?}", report.feedback);
        assert_eq!(v.cache().len(), 1);
    }

    #[test]
    fn source_key_is_hex_sha256() {
        let key = source_key("");
        assert_eq!(key, "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855");
    }
}
