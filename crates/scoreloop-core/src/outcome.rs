use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::{Ledger, Policy};

/// How a run ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// An attempt met the threshold
    Passed,
    /// Budget spent without meeting the threshold
    Exhausted,
    /// The generator could not produce a response; the run stopped there
    GeneratorFailed { attempt: usize, error: String },
}

/// Terminal summary of a run, derived from its ledger.
///
/// `final_*` fields come from the last attempt made, `best_score` from the
/// highest-scoring one. The pass decision uses the final score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub run_id: String,
    #[serde(flatten)]
    pub status: RunStatus,
    pub final_response: Option<String>,
    pub final_score: Option<f64>,
    pub final_feedback: Option<String>,
    pub passed_threshold: bool,
    pub best_score: Option<f64>,
    pub total_attempts: usize,
    pub threshold: f64,
    pub max_attempts: usize,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub total_duration_secs: f64,
    pub attempts: Ledger,
}

impl Outcome {
    pub fn from_ledger(
        run_id: String,
        ledger: Ledger,
        policy: &Policy,
        status: RunStatus,
        duration: Duration,
    ) -> Self {
        let last = ledger.last();
        let final_response = last.and_then(|a| a.response.clone());
        let final_score = last.and_then(|a| a.score);
        let final_feedback = last.and_then(|a| a.feedback.clone());
        let passed_threshold = final_score.is_some_and(|s| policy.is_met_by(s));

        Self {
            run_id,
            status,
            final_response,
            final_score,
            final_feedback,
            passed_threshold,
            best_score: ledger.best_score(),
            total_attempts: ledger.len(),
            threshold: policy.threshold(),
            max_attempts: policy.max_attempts(),
            metadata: policy.metadata().clone(),
            total_duration_secs: duration.as_secs_f64(),
            attempts: ledger,
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self.status, RunStatus::Passed)
    }

    pub fn generator_failed(&self) -> bool {
        matches!(self.status, RunStatus::GeneratorFailed { .. })
    }

    pub fn status_label(&self) -> &'static str {
        match self.status {
            RunStatus::Passed => "passed",
            RunStatus::Exhausted => "exhausted",
            RunStatus::GeneratorFailed { .. } => "generator_failed",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.status {
            RunStatus::Passed => 0,
            RunStatus::Exhausted => 1,
            RunStatus::GeneratorFailed { .. } => 2,
        }
    }
}
