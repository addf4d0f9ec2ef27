use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which collaborator failed during an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Generation,
    Scoring,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// Record of one generate-then-score cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    /// 1-based, strictly increasing within a run
    pub attempt_number: usize,
    /// Absent when generation failed
    pub response: Option<String>,
    /// Absent when generation or scoring failed
    pub score: Option<f64>,
    pub feedback: Option<String>,
    pub failure: Option<AttemptFailure>,
    pub duration_secs: f64,
    pub timestamp: DateTime<Utc>,
}

impl Attempt {
    pub fn scored(
        attempt_number: usize,
        response: String,
        score: f64,
        feedback: Option<String>,
        duration: Duration,
    ) -> Self {
        Self {
            attempt_number,
            response: Some(response),
            score: Some(score),
            feedback,
            failure: None,
            duration_secs: duration.as_secs_f64(),
            timestamp: Utc::now(),
        }
    }

    /// Response produced but the scorer could not judge it
    pub fn unscored(
        attempt_number: usize,
        response: String,
        error: String,
        duration: Duration,
    ) -> Self {
        Self {
            attempt_number,
            response: Some(response),
            score: None,
            feedback: None,
            failure: Some(AttemptFailure {
                kind: FailureKind::Scoring,
                message: error,
            }),
            duration_secs: duration.as_secs_f64(),
            timestamp: Utc::now(),
        }
    }

    pub fn generation_failed(attempt_number: usize, error: String, duration: Duration) -> Self {
        Self {
            attempt_number,
            response: None,
            score: None,
            feedback: None,
            failure: Some(AttemptFailure {
                kind: FailureKind::Generation,
                message: error,
            }),
            duration_secs: duration.as_secs_f64(),
            timestamp: Utc::now(),
        }
    }

    pub fn is_scored(&self) -> bool {
        self.score.is_some()
    }

    pub fn failed_with(&self, kind: FailureKind) -> bool {
        self.failure.as_ref().is_some_and(|f| f.kind == kind)
    }
}

/// Ordered attempts of one run. Only the controller appends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    attempts: Vec<Attempt>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, attempt: Attempt) {
        debug_assert_eq!(attempt.attempt_number, self.attempts.len() + 1);
        self.attempts.push(attempt);
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attempt> {
        self.attempts.iter()
    }

    pub fn get(&self, attempt_number: usize) -> Option<&Attempt> {
        attempt_number
            .checked_sub(1)
            .and_then(|i| self.attempts.get(i))
    }

    pub fn last(&self) -> Option<&Attempt> {
        self.attempts.last()
    }

    /// Recorded scores in attempt order
    pub fn scores(&self) -> impl Iterator<Item = f64> + '_ {
        self.attempts.iter().filter_map(|a| a.score)
    }

    /// Highest recorded score, absent if no attempt was scored
    pub fn best_score(&self) -> Option<f64> {
        self.scores().reduce(f64::max)
    }
}

impl<'a> IntoIterator for &'a Ledger {
    type Item = &'a Attempt;
    type IntoIter = std::slice::Iter<'a, Attempt>;

    fn into_iter(self) -> Self::IntoIter {
        self.attempts.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(entries: &[Option<f64>]) -> Ledger {
        let mut ledger = Ledger::new();
        for (i, score) in entries.iter().enumerate() {
            let n = i + 1;
            let attempt = match score {
                Some(s) => Attempt::scored(n, format!("r{}", n), *s, None, Duration::ZERO),
                None => Attempt::unscored(n, format!("r{}", n), "judge down".into(), Duration::ZERO),
            };
            ledger.push(attempt);
        }
        ledger
    }

    #[test]
    fn test_best_score_skips_unscored() {
        let ledger = ledger(&[Some(0.4), None, Some(0.9), Some(0.6)]);
        assert_eq!(ledger.best_score(), Some(0.9));
        assert_eq!(ledger.scores().collect::<Vec<_>>(), vec![0.4, 0.9, 0.6]);
    }

    #[test]
    fn test_best_score_absent_when_nothing_scored() {
        assert_eq!(ledger(&[None, None]).best_score(), None);
        assert_eq!(Ledger::new().best_score(), None);
    }

    #[test]
    fn test_get_is_one_based() {
        let ledger = ledger(&[Some(0.1), Some(0.2)]);
        assert_eq!(ledger.get(1).unwrap().score, Some(0.1));
        assert_eq!(ledger.get(2).unwrap().score, Some(0.2));
        assert!(ledger.get(0).is_none());
        assert!(ledger.get(3).is_none());
    }

    #[test]
    fn test_failure_kinds() {
        let failed = Attempt::generation_failed(1, "model offline".into(), Duration::ZERO);
        assert!(failed.failed_with(FailureKind::Generation));
        assert!(failed.response.is_none());
        assert!(!failed.is_scored());

        let unscored = Attempt::unscored(1, "text".into(), "timeout".into(), Duration::ZERO);
        assert!(unscored.failed_with(FailureKind::Scoring));
        assert_eq!(unscored.response.as_deref(), Some("text"));
    }
}
