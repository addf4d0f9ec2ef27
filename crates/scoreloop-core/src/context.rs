use std::time::{Duration, Instant};

use crate::{Attempt, Ledger, Policy};

/// Mutable state of one run, owned by the controller until the run ends
#[derive(Debug)]
pub(crate) struct RunContext {
    pub run_id: String,
    pub policy: Policy,
    pub ledger: Ledger,
    started_at: Instant,
}

impl RunContext {
    pub fn new(policy: Policy) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            policy,
            ledger: Ledger::new(),
            started_at: Instant::now(),
        }
    }

    /// Number the next attempt will carry
    pub fn next_attempt_number(&self) -> usize {
        self.ledger.len() + 1
    }

    pub fn has_budget(&self) -> bool {
        self.ledger.len() < self.policy.max_attempts()
    }

    /// Feedback of the immediately preceding attempt
    pub fn prior_feedback(&self) -> Option<&str> {
        self.ledger.last().and_then(|a| a.feedback.as_deref())
    }

    pub fn record(&mut self, attempt: Attempt) {
        self.ledger.push(attempt);
    }

    pub fn total_duration(&self) -> Duration {
        self.started_at.elapsed()
    }
}
