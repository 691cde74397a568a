//! Heat sequencing: who drinks next, when the clock runs, and what gets
//! recorded.

/// Controller state machine.
pub mod runner;

pub use runner::{BottleOutcome, ContestRunner, Phase, ResultForm, RunnerError, RunnerSnapshot};
