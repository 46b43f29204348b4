// Kept in its own test binary: it points TMPDIR at a private directory,
// which would race with any other test in the same process.

#[macro_use]
mod common;

use std::env;
use std::fs;

use serde_json::json;

use codejudge::TestCase;

use common::validator_with;

fn staged_scripts(dir: &std::path::Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with("codejudge-") && n.ends_with(".py"))
        .collect()
}

#[test]
fn rejected_and_finished_runs_leave_no_scripts_behind() {
    let tmp = tempfile::tempdir().unwrap();
    env::set_var("TMPDIR", tmp.path());

    let (v, budget) = validator_with(2, 1);
    let cases = vec![TestCase::call("solution", vec![json!(1)])];

    let rejected = v
        .validate("import socket\ndef solution(x):\n    return x\n", &cases, &[json!(1)])
        .unwrap();
    assert!(!rejected.all_passed);
    assert!(staged_scripts(tmp.path()).is_empty());
    assert_eq!(budget.available(), 1);

    if common::python_available() {
        let report = v
            .validate("def solution(x):\n    return x\n", &cases, &[json!(1)])
            .unwrap();
        assert!(report.all_passed, "{:?}", report.feedback);

        let timed_out = v
            .validate(
                "import time\ndef solution(x):\n    time.sleep(5)\n    return x\n",
                &cases,
                &[json!(1)],
            )
            .unwrap();
        assert_eq!(timed_out.feedback[1], "❌ Test 1: Execution timeout (2s exceeded)");
    }

    assert!(staged_scripts(tmp.path()).is_empty());
    assert_eq!(budget.available(), 1);
}
