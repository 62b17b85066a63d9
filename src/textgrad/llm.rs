use super::{TextGradError, Variable};
use crate::engine::Engine;

/// Role given to text produced by a model call.
pub const RESPONSE_ROLE: &str = "response from the language model";

/// A model treated as an opaque function from text to text.
#[derive(Debug, Clone, Default)]
pub struct BlackboxLlm {
    pub system_prompt: Option<String>,
}

impl BlackboxLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(system_prompt: impl Into<String>) -> Self {
        Self { system_prompt: Some(system_prompt.into()) }
    }

    /// Call the model on `input` and wrap the reply as a trainable variable.
    pub fn forward(&self, engine: &Engine<'_>, input: &Variable) -> Result<Variable, TextGradError> {
        let reply = engine.generate(self.system_prompt.as_deref(), &input.value)?;
        Ok(Variable::new(reply, RESPONSE_ROLE, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ChatRole, ScriptedBackend};

    #[test]
    fn test_forward_wraps_reply() {
        let backend = ScriptedBackend::new().with_replies(["Gravity bends spacetime."]);
        let engine = Engine::new(&backend, "m");
        let question = Variable::new("What is gravity?", "question", false);

        let answer = BlackboxLlm::new().forward(&engine, &question).unwrap();
        assert_eq!(answer.value, "Gravity bends spacetime.");
        assert!(answer.requires_grad);
        assert_eq!(answer.role_description, RESPONSE_ROLE);

        let calls = backend.calls();
        assert_eq!(calls[0].messages.len(), 1);
        assert_eq!(calls[0].messages[0].role, ChatRole::User);
    }
}
