use thiserror::Error;

use crate::PolicyError;

/// Process exit code for input rejected before any external call.
/// Kept apart from the run outcomes (0 passed, 1 exhausted, 2 generator failed).
pub const REJECTED_EXIT_CODE: i32 = 3;

/// Failures that prevent a run from starting.
///
/// Failures during a run are recorded in the ledger instead; a generator
/// failure ends the run with [`crate::RunStatus::GeneratorFailed`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RunError {
    #[error("Invalid policy: {0}")]
    InvalidPolicy(#[from] PolicyError),

    #[error("Prompt is empty")]
    EmptyPrompt,
}

impl RunError {
    pub fn exit_code(&self) -> i32 {
        REJECTED_EXIT_CODE
    }
}
