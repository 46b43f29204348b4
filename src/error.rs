//! error.rs
//!
//! Hard failures of the engine itself. Anything caused by the submission
//! is turned into feedback by the validator and never shows up here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The host could not stage the harness on disk.
    #[error("cannot stage sandbox script: {0}")]
    TempFile(String),

    #[error("challenge defines {cases} test cases but {expected} expected outputs")]
    CaseCountMismatch { cases: usize, expected: usize },

    #[error("config error: {0}")]
    Config(String),

    #[error("challenge error: {0}")]
    Challenge(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
