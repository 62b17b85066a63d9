use serde::{Deserialize, Serialize};

/// A piece of text in the optimization, with the feedback it has received.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Variable {
    pub value: String,
    /// Tells every prompt what this text is for ("the user's question", ...).
    pub role_description: String,
    pub requires_grad: bool,
    /// Feedback accumulated since the last `zero_grad`.
    #[serde(default)]
    pub gradients: Vec<String>,
}

impl Variable {
    pub fn new(value: impl Into<String>, role_description: impl Into<String>, requires_grad: bool) -> Self {
        Self {
            value: value.into(),
            role_description: role_description.into(),
            requires_grad,
            gradients: Vec::new(),
        }
    }

    pub fn set_role_description(&mut self, role: impl Into<String>) {
        self.role_description = role.into();
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    /// Record feedback. Ignored for variables that do not require gradients.
    pub fn push_gradient(&mut self, feedback: impl Into<String>) {
        if self.requires_grad {
            self.gradients.push(feedback.into());
        }
    }

    pub fn clear_gradients(&mut self) {
        self.gradients.clear();
    }

    /// Gradients joined for prompt inclusion.
    pub fn gradient_text(&self) -> String {
        self.gradients
            .iter()
            .map(|g| format!("<FEEDBACK>{}</FEEDBACK>", g))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
