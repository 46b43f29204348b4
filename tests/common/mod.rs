#![allow(dead_code)]

use std::process::Command;
use std::sync::Arc;

use codejudge::{ConcurrencyBudget, EngineConfig, Validator};

pub fn python_available() -> bool {
    Command::new("python3")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Bail out of a test quietly when there is no interpreter to run.
macro_rules! require_python {
    () => {
        if !crate::common::python_available() {
            eprintln!("python3 not found, skipping");
            return;
        }
    };
}

pub fn validator_with(timeout_secs: u64, capacity: usize) -> (Validator, Arc<ConcurrencyBudget>) {
    let cfg = EngineConfig::default()
        .with_timeout_secs(timeout_secs)
        .with_max_concurrent(capacity);
    let budget = Arc::new(ConcurrencyBudget::new(cfg.max_concurrent));
    (Validator::with_budget(cfg, Arc::clone(&budget)), budget)
}

pub fn validator() -> Validator {
    validator_with(5, 4).0
}
