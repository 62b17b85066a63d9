use std::collections::VecDeque;

use super::prompts::{IMPROVED_END, IMPROVED_START, STEP_SYSTEM, step_prompt};
use super::{TextGradError, Variable};
use crate::engine::Engine;

/// Textual gradient descent.
///
/// Rewrites a variable using the feedback attached to it. With
/// `gradient_memory > 0` the feedback of the last N steps is also shown, which
/// plays the part momentum plays in numeric optimizers.
#[derive(Debug, Clone, Default)]
pub struct Tgd {
    pub constraints: Vec<String>,
    pub gradient_memory: usize,
    past: VecDeque<String>,
}

impl Tgd {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_constraints(mut self, constraints: Vec<String>) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_gradient_memory(mut self, steps: usize) -> Self {
        self.gradient_memory = steps;
        self
    }

    /// Update `variable` in place. Does nothing if it has no gradients.
    pub fn step(&mut self, engine: &Engine<'_>, variable: &mut Variable) -> Result<(), TextGradError> {
        if !variable.requires_grad || variable.gradients.is_empty() {
            return Ok(());
        }

        let past: Vec<String> = self.past.iter().cloned().collect();
        let prompt = step_prompt(
            &variable.role_description,
            &variable.value,
            &variable.gradient_text(),
            &past,
            &self.constraints,
        );
        let reply = engine.generate(Some(STEP_SYSTEM), &prompt)?;
        let improved = extract_improved_variable(&reply)?;
        variable.set_value(improved);

        if self.gradient_memory > 0 {
            for g in &variable.gradients {
                self.past.push_back(g.clone());
            }
            while self.past.len() > self.gradient_memory {
                self.past.pop_front();
            }
        }
        Ok(())
    }

    pub fn zero_grad(&self, variable: &mut Variable) {
        variable.clear_gradients();
    }
}

/// Pull the text between the improved-variable tags out of a reply.
///
/// A missing closing tag takes the rest of the reply; a missing opening tag
/// is an error.
pub fn extract_improved_variable(reply: &str) -> Result<String, TextGradError> {
    let start = reply
        .find(IMPROVED_START)
        .ok_or_else(|| TextGradError::MissingImprovedVariable(reply.chars().take(200).collect()))?;
    let rest = &reply[start + IMPROVED_START.len()..];
    let body = match rest.find(IMPROVED_END) {
        Some(end) => &rest[..end],
        None => rest,
    };
    let body = body.trim();
    if body.is_empty() {
        return Err(TextGradError::EmptyImprovedVariable);
    }
    Ok(body.to_string())
}
