use serde::{Deserialize, Serialize};

/// What the user submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationRequest {
    pub question: String,
    /// Evaluation instructions; the "loss function".
    pub criteria: String,
    pub iterations: usize,
    pub model: String,
    #[serde(default)]
    pub constraints: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Initial,
    Success,
    Failed,
    ValidationFailed,
    SystemError,
}

/// One row of the iteration log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub iteration: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub status: EntryStatus,
    /// Wall time spent producing this entry.
    #[serde(default)]
    pub duration_secs: f64,
}

impl HistoryEntry {
    pub fn answer(iteration: usize, answer: String, feedback: String, status: EntryStatus, duration_secs: f64) -> Self {
        Self {
            iteration,
            answer: Some(answer),
            feedback: Some(feedback),
            error: None,
            status,
            duration_secs,
        }
    }

    pub fn error(iteration: usize, error: String, status: EntryStatus) -> Self {
        Self {
            iteration,
            answer: None,
            feedback: None,
            error: Some(error),
            status,
            duration_secs: 0.0,
        }
    }
}

/// What the form shows after a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationOutcome {
    pub final_answer: String,
    pub final_status: String,
    pub history: Vec<HistoryEntry>,
}

impl OptimizationOutcome {
    /// True when every requested iteration succeeded.
    pub fn is_complete(&self) -> bool {
        self.history
            .iter()
            .all(|e| matches!(e.status, EntryStatus::Initial | EntryStatus::Success))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_json_shape() {
        let entry = HistoryEntry::error(0, "bad".into(), EntryStatus::ValidationFailed);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["status"], "validation_failed");
        assert_eq!(json["error"], "bad");
        assert!(json.get("answer").is_none());
    }

    #[test]
    fn test_request_constraints_default() {
        let req: OptimizationRequest = serde_json::from_str(
            r#"{"question":"q","criteria":"c","iterations":2,"model":"m"}"#,
        )
        .unwrap();
        assert!(req.constraints.is_empty());
    }
}
