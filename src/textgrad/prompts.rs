//! Prompt templates for the backward pass and the optimizer step.
//!
//! Placeholders are `{name}`. [`render`] fills them in one pass over the
//! template, so substituted text is never scanned for placeholders again.

pub const IMPROVED_START: &str = "<IMPROVED_VARIABLE>";
pub const IMPROVED_END: &str = "</IMPROVED_VARIABLE>";

/// System prompt for the feedback ("gradient") call.
pub const BACKWARD_SYSTEM: &str = "You are part of an optimization system that improves a given text \
(the variable). Your only job is to give intelligent, creative and critical feedback on the variable \
so that it scores better on the objective. Do not propose a new version of the variable; describe \
concretely what should change and why. The variable is the text inside the <VARIABLE> tags.";

/// User prompt for the feedback call.
pub const BACKWARD_USER: &str = "An evaluator was given the following instructions:
<EVALUATOR_INSTRUCTIONS>{system_prompt}</EVALUATOR_INSTRUCTIONS>

It evaluated this input:
<EVALUATED_INPUT>{input}</EVALUATED_INPUT>

And produced this evaluation:
<EVALUATION>{evaluation}</EVALUATION>

<OBJECTIVE>Improve the {role} so that the evaluation above becomes as favourable as possible. \
Nothing else matters.</OBJECTIVE>

Give feedback to the {role}, which is the following text:
<VARIABLE>{input}</VARIABLE>

Describe how the {role} could be improved to better meet the <OBJECTIVE>.";

/// System prompt for the update call.
pub const STEP_SYSTEM: &str = "You are part of an optimization system that improves text (the variable). \
You receive the current variable and feedback on it, and you rewrite the variable to address the feedback. \
Keep what already works. The improved variable must be placed between <IMPROVED_VARIABLE> and \
</IMPROVED_VARIABLE> tags, with nothing else inside the tags.";

/// User prompt for the update call.
pub const STEP_USER: &str = "Here is the role of the variable you will improve: <ROLE>{role}</ROLE>.

The variable is the text within the following span:
<VARIABLE>{value}</VARIABLE>

Here is the feedback we got for the variable:
<CONTEXT>{gradients}</CONTEXT>
{past}{constraints}
Improve the variable ({role}) using the feedback provided in <FEEDBACK> tags.
Send the improved variable in the following format:

<IMPROVED_VARIABLE>{the improved variable}</IMPROVED_VARIABLE>

Send ONLY the improved variable between the tags, and nothing else.";

/// Fill `{name}` placeholders from `values`. Unknown placeholders are kept verbatim.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after
            .find('}')
            .and_then(|close| values.iter().find(|(k, _)| *k == &after[..close]).map(|(_, v)| (close, *v)));
        match value {
            Some((close, v)) => {
                out.push_str(v);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn backward_prompt(system_prompt: &str, input: &str, evaluation: &str, role: &str) -> String {
    render(
        BACKWARD_USER,
        &[
            ("system_prompt", system_prompt),
            ("input", input),
            ("evaluation", evaluation),
            ("role", role),
        ],
    )
}

pub fn step_prompt(role: &str, value: &str, gradients: &str, past: &[String], constraints: &[String]) -> String {
    let past_block = if past.is_empty() {
        String::new()
    } else {
        let items: Vec<String> = past.iter().map(|p| format!("<FEEDBACK>{}</FEEDBACK>", p)).collect();
        format!(
            "\nFeedback from earlier iterations, to avoid repeating mistakes:\n<PAST_FEEDBACK>{}</PAST_FEEDBACK>\n",
            items.join("\n")
        )
    };
    let constraint_block = if constraints.is_empty() {
        String::new()
    } else {
        let items: Vec<String> = constraints
            .iter()
            .enumerate()
            .map(|(i, c)| format!("Constraint {}: {}", i + 1, c))
            .collect();
        format!(
            "\nYou must follow these constraints:\n<CONSTRAINTS>{}</CONSTRAINTS>\n",
            items.join("\n")
        )
    };

    render(
        STEP_USER,
        &[
            ("role", role),
            ("value", value),
            ("gradients", gradients),
            ("past", &past_block),
            ("constraints", &constraint_block),
        ],
    )
}
