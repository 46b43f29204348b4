//! codejudge
//!
//! Screens untrusted Python submissions, runs them one test case per
//! interpreter process, and compares what comes back against expected
//! values.

pub mod analyzer;
pub mod challenge;
pub mod codec;
pub mod config;
pub mod error;
pub mod harness;
pub mod protocol;
pub mod sandbox;
pub mod screen;
pub mod validator;

pub use challenge::{Challenge, TestCase};
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use protocol::{ExecutionOutcome, FailureKind};
pub use sandbox::ConcurrencyBudget;
pub use screen::{screen, SafetyVerdict, ScreenPolicy};
pub use validator::{ValidationReport, Validator};
