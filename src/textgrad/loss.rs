use super::prompts::{BACKWARD_SYSTEM, backward_prompt};
use super::{TextGradError, Variable};
use crate::engine::Engine;

/// A loss defined by natural-language evaluation instructions.
#[derive(Debug, Clone)]
pub struct TextLoss {
    pub criteria: String,
}

/// The evaluation of one variable, plus what is needed to differentiate it.
#[derive(Debug, Clone)]
pub struct Loss {
    /// The evaluator's reply. This is what the user sees as "feedback".
    pub value: String,
    pub system_prompt: String,
    /// Snapshot of the evaluated text at forward time.
    pub input_value: String,
    /// Role of the evaluated variable at forward time.
    pub input_role: String,
}

impl TextLoss {
    pub fn new(criteria: impl Into<String>) -> Self {
        Self { criteria: criteria.into() }
    }

    pub fn forward(&self, engine: &Engine<'_>, input: &Variable) -> Result<Loss, TextGradError> {
        let value = engine.generate(Some(&self.criteria), &input.value)?;
        Ok(Loss {
            value,
            system_prompt: self.criteria.clone(),
            input_value: input.value.clone(),
            input_role: input.role_description.clone(),
        })
    }
}

impl Loss {
    /// Ask the engine how `target` should change to improve this evaluation,
    /// and attach the answer to `target` as a gradient.
    pub fn backward(&self, engine: &Engine<'_>, target: &mut Variable) -> Result<(), TextGradError> {
        if !target.requires_grad {
            return Ok(());
        }
        let prompt = backward_prompt(
            &self.system_prompt,
            &self.input_value,
            &self.value,
            &self.input_role,
        );
        let feedback = engine.generate(Some(BACKWARD_SYSTEM), &prompt)?;
        target.push_gradient(feedback);
        Ok(())
    }
}
