//! The generate-then-optimize flow behind the form's main button.
//!
//! 1. Validate the request
//! 2. Generate an initial answer to the question
//! 3. Repeat `iterations` times: evaluate → feedback → rewrite → reset
//! 4. Report the last good answer and the full iteration log
//!
//! The flow never returns an error: every failure becomes a history entry.

mod runner;
mod types;

pub use runner::{ANSWER_ROLE, QUESTION_ROLE, run_optimization_flow, validate_request};
pub use types::{EntryStatus, HistoryEntry, OptimizationOutcome, OptimizationRequest};
