use std::time::Instant;

use super::types::{EntryStatus, HistoryEntry, OptimizationOutcome, OptimizationRequest};
use crate::config::OptimizationConfig;
use crate::engine::{Engine, LlmBackend};
use crate::textgrad::{BlackboxLlm, TextGradError, TextLoss, Tgd, Variable};

pub const QUESTION_ROLE: &str = "the user's question that needs to be answered";
pub const ANSWER_ROLE: &str = "an answer to the user's question that will be iteratively optimized";

const VALIDATION_ANSWER: &str = "Validation error";
const SYSTEM_ERROR_ANSWER: &str = "A system error occurred.";
const FAILED_STATUS: &str = "Failed";
const INITIAL_FEEDBACK: &str = "Initial answer generated by the model.";

/// Check the request against the configured limits.
pub fn validate_request(request: &OptimizationRequest, config: &OptimizationConfig) -> Result<(), String> {
    let question = request.question.trim();
    if question.is_empty() || question.chars().count() < config.min_question_chars {
        return Err(format!(
            "The question is required (at least {} characters).",
            config.min_question_chars
        ));
    }
    if request.criteria.trim().is_empty() {
        return Err("The improvement criteria are required.".to_string());
    }
    if request.iterations == 0 || request.iterations > config.max_iterations {
        return Err(format!(
            "Iterations must be between 1 and {}.",
            config.max_iterations
        ));
    }
    if request.model.trim().is_empty() {
        return Err("A model must be selected.".to_string());
    }
    Ok(())
}

/// Generate an answer to the question and refine it against the criteria.
pub fn run_optimization_flow(
    backend: &dyn LlmBackend,
    request: &OptimizationRequest,
    config: &OptimizationConfig,
) -> OptimizationOutcome {
    if let Err(message) = validate_request(request, config) {
        tracing::warn!(%message, "rejected optimization request");
        return OptimizationOutcome {
            final_answer: VALIDATION_ANSWER.to_string(),
            final_status: FAILED_STATUS.to_string(),
            history: vec![HistoryEntry::error(0, message, EntryStatus::ValidationFailed)],
        };
    }

    let engine = Engine::new(backend, request.model.trim());
    tracing::info!(model = engine.model(), iterations = request.iterations, "starting optimization");

    let question = Variable::new(request.question.trim(), QUESTION_ROLE, false);

    let started = Instant::now();
    let mut answer = match BlackboxLlm::new().forward(&engine, &question) {
        Ok(answer) => answer,
        Err(e) => {
            let message = format!("System error: {}", e);
            tracing::error!(error = %e, "initial generation failed");
            return OptimizationOutcome {
                final_answer: SYSTEM_ERROR_ANSWER.to_string(),
                final_status: FAILED_STATUS.to_string(),
                history: vec![HistoryEntry::error(0, message, EntryStatus::SystemError)],
            };
        }
    };
    answer.set_role_description(ANSWER_ROLE);
    tracing::info!(preview = %preview(&answer.value), "initial answer generated");

    let mut history = vec![HistoryEntry::answer(
        0,
        answer.value.clone(),
        INITIAL_FEEDBACK.to_string(),
        EntryStatus::Initial,
        started.elapsed().as_secs_f64(),
    )];

    let loss_fn = TextLoss::new(request.criteria.trim());
    let mut optimizer = Tgd::new()
        .with_constraints(request.constraints.clone())
        .with_gradient_memory(config.gradient_memory);

    let mut completed = 0;
    for i in 1..=request.iterations {
        tracing::info!("running iteration {}/{}", i, request.iterations);
        let step_started = Instant::now();
        match optimization_step(&engine, &loss_fn, &mut optimizer, &mut answer) {
            Ok(feedback) => {
                history.push(HistoryEntry::answer(
                    i,
                    answer.value.clone(),
                    feedback,
                    EntryStatus::Success,
                    step_started.elapsed().as_secs_f64(),
                ));
                completed = i;
            }
            Err(e) => {
                let message = format!("Error in iteration {}: {}", i, e);
                tracing::error!("{}", message);
                history.push(HistoryEntry::error(i, message, EntryStatus::Failed));
                break;
            }
        }
    }

    let final_answer = history
        .iter()
        .rev()
        .find_map(|e| e.answer.clone())
        .unwrap_or_default();
    let final_status = if completed == request.iterations {
        format!("Completed after {} iterations.", completed)
    } else {
        format!("Stopped after {} of {} iterations.", completed, request.iterations)
    };
    tracing::info!(completed, "optimization finished");

    OptimizationOutcome { final_answer, final_status, history }
}

/// One evaluate → backward → step → zero_grad cycle. Returns the evaluation text.
fn optimization_step(
    engine: &Engine<'_>,
    loss_fn: &TextLoss,
    optimizer: &mut Tgd,
    answer: &mut Variable,
) -> Result<String, TextGradError> {
    let loss = loss_fn.forward(engine, answer)?;
    let result = loss
        .backward(engine, answer)
        .and_then(|_| optimizer.step(engine, answer));
    // Gradients never leak into the next iteration, even after a failed step.
    optimizer.zero_grad(answer);
    result.map(|_| loss.value)
}

fn preview(text: &str) -> String {
    text.chars().take(150).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ScriptedBackend;

    fn request(iterations: usize) -> OptimizationRequest {
        OptimizationRequest {
            question: "Explain the theory of relativity.".to_string(),
            criteria: "Be critical about clarity.".to_string(),
            iterations,
            model: "qwen3:4b".to_string(),
            constraints: Vec::new(),
        }
    }

    fn improved(text: &str) -> String {
        format!("<IMPROVED_VARIABLE>{}</IMPROVED_VARIABLE>", text)
    }

    /// Replies for a full run: initial answer, then (evaluation, feedback, rewrite) per iteration.
    fn scripted_run(iterations: usize) -> ScriptedBackend {
        let backend = ScriptedBackend::new();
        backend.push_reply("v0");
        for i in 1..=iterations {
            backend.push_reply(format!("eval {}", i));
            backend.push_reply(format!("feedback {}", i));
            backend.push_reply(improved(&format!("v{}", i)));
        }
        backend
    }

    #[test]
    fn test_short_question_rejected() {
        let backend = ScriptedBackend::new();
        let mut req = request(2);
        req.question = "  Why?    ".to_string();

        let outcome = run_optimization_flow(&backend, &req, &OptimizationConfig::default());
        assert_eq!(outcome.final_answer, "Validation error");
        assert_eq!(outcome.final_status, "Failed");
        assert_eq!(outcome.history.len(), 1);
        assert_eq!(outcome.history[0].status, EntryStatus::ValidationFailed);
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_blank_criteria_rejected() {
        let mut req = request(2);
        req.criteria = "   ".to_string();
        let err = validate_request(&req, &OptimizationConfig::default()).unwrap_err();
        assert!(err.contains("criteria"));
    }

    fn assert_validation_outcome(req: &OptimizationRequest, expected: &str) {
        let backend = ScriptedBackend::new().with_replies(["unused"]);
        let outcome = run_optimization_flow(&backend, req, &OptimizationConfig::default());
        assert_eq!(outcome.final_answer, "Validation error");
        assert_eq!(outcome.final_status, "Failed");
        assert_eq!(outcome.history.len(), 1);
        let entry = &outcome.history[0];
        assert_eq!(entry.iteration, 0);
        assert_eq!(entry.status, EntryStatus::ValidationFailed);
        assert!(entry.answer.is_none());
        assert!(entry.error.as_deref().unwrap().contains(expected));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_blank_criteria_outcome() {
        let mut req = request(2);
        req.criteria = " \n ".to_string();
        assert_validation_outcome(&req, "criteria");
    }

    #[test]
    fn test_out_of_range_iterations_outcome() {
        assert_validation_outcome(&request(0), "between 1 and 5");
        assert_validation_outcome(&request(6), "between 1 and 5");
    }

    #[test]
    fn test_iteration_bounds() {
        let config = OptimizationConfig::default();
        assert!(validate_request(&request(0), &config).is_err());
        assert!(validate_request(&request(1), &config).is_ok());
        assert!(validate_request(&request(5), &config).is_ok());
        assert!(validate_request(&request(6), &config).is_err());
    }

    #[test]
    fn test_happy_path() {
        let backend = scripted_run(2);
        let outcome = run_optimization_flow(&backend, &request(2), &OptimizationConfig::default());

        assert_eq!(outcome.final_answer, "v2");
        assert_eq!(outcome.final_status, "Completed after 2 iterations.");
        assert!(outcome.is_complete());

        let h = &outcome.history;
        assert_eq!(h.len(), 3);
        assert_eq!(h[0].status, EntryStatus::Initial);
        assert_eq!(h[0].answer.as_deref(), Some("v0"));
        assert_eq!(h[1].answer.as_deref(), Some("v1"));
        assert_eq!(h[1].feedback.as_deref(), Some("eval 1"));
        assert_eq!(h[2].iteration, 2);
        assert_eq!(h[2].feedback.as_deref(), Some("eval 2"));

        // 1 initial + 3 calls per iteration
        assert_eq!(backend.calls().len(), 7);
        // Second evaluation sees the rewritten answer
        assert_eq!(backend.calls()[4].messages[1].content, "v1");
    }

    #[test]
    fn test_gradients_do_not_accumulate_across_iterations() {
        let backend = scripted_run(2);
        run_optimization_flow(&backend, &request(2), &OptimizationConfig::default());
        let second_step = &backend.calls()[6].messages[1].content;
        assert!(second_step.contains("feedback 2"));
        assert!(!second_step.contains("feedback 1"));
    }

    #[test]
    fn test_failure_mid_loop_keeps_last_answer() {
        let backend = ScriptedBackend::new();
        backend.push_reply("v0");
        backend.push_reply("eval 1");
        backend.push_reply("feedback 1");
        backend.push_reply(improved("v1"));
        backend.push_reply("eval 2");
        backend.push_failure("model crashed");

        let outcome = run_optimization_flow(&backend, &request(3), &OptimizationConfig::default());
        assert_eq!(outcome.final_answer, "v1");
        assert_eq!(outcome.final_status, "Stopped after 1 of 3 iterations.");
        assert!(!outcome.is_complete());

        let last = outcome.history.last().unwrap();
        assert_eq!(last.status, EntryStatus::Failed);
        assert_eq!(last.iteration, 2);
        assert!(last.error.as_deref().unwrap().starts_with("Error in iteration 2:"));
        assert_eq!(outcome.history.len(), 3);
    }

    #[test]
    fn test_untagged_rewrite_fails_iteration() {
        let backend = ScriptedBackend::new().with_replies(["v0", "eval", "feedback", "no tags here"]);
        let outcome = run_optimization_flow(&backend, &request(1), &OptimizationConfig::default());
        assert_eq!(outcome.final_answer, "v0");
        assert_eq!(outcome.history[1].status, EntryStatus::Failed);
    }

    #[test]
    fn test_initial_generation_failure_is_system_error() {
        let backend = ScriptedBackend::new();
        backend.push_failure("connection refused");

        let outcome = run_optimization_flow(&backend, &request(2), &OptimizationConfig::default());
        assert_eq!(outcome.final_answer, "A system error occurred.");
        assert_eq!(outcome.final_status, "Failed");
        assert_eq!(outcome.history.len(), 1);
        assert_eq!(outcome.history[0].status, EntryStatus::SystemError);
    }

    #[test]
    fn test_constraints_reach_optimizer() {
        let backend = scripted_run(1);
        let mut req = request(1);
        req.constraints = vec!["Answer in under 100 words".to_string()];
        run_optimization_flow(&backend, &req, &OptimizationConfig::default());
        assert!(backend.calls()[3].messages[1].content.contains("Answer in under 100 words"));
    }
}
