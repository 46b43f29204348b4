//! sandbox
//!
//! The only part of the engine that touches processes and the filesystem.

mod budget;
mod runner;

pub use budget::{BudgetPermit, ConcurrencyBudget};
pub use runner::{RawRun, Sandbox};
