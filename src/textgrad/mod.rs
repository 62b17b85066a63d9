//! Textual gradient descent.
//!
//! The paradigm, borrowed from numeric optimization:
//! - Numeric: Loss(θ) → ∂Loss/∂θ → θ ← θ - η·∇
//! - Textual: Evaluation(text) → LLM feedback on the text → LLM rewrite using the feedback
//!
//! The "gradient" is natural-language criticism addressed to one span of text.
//!
//! ## One step
//!
//! ```text
//! answer ──TextLoss(criteria)──> evaluation          (forward)
//! evaluation ──backward──> feedback pushed to answer  (gradient)
//! answer + feedback ──Tgd::step──> improved answer    (update)
//! Tgd::zero_grad                                      (reset)
//! ```
//!
//! The computation graph here is a single edge: one loss over one
//! variable. That is all the optimization flow needs.

mod llm;
mod loss;
mod optimizer;
mod prompts;
mod variable;

pub use llm::BlackboxLlm;
pub use loss::{Loss, TextLoss};
pub use optimizer::{Tgd, extract_improved_variable};
pub use variable::Variable;

use thiserror::Error;

use crate::engine::EngineError;

#[derive(Debug, Error)]
pub enum TextGradError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("optimizer reply did not contain an improved variable: {0}")]
    MissingImprovedVariable(String),

    #[error("improved variable was empty")]
    EmptyImprovedVariable,
}
