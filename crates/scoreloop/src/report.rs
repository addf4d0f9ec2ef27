use colored::Colorize;

use scoreloop_core::{FailureKind, Outcome, RunStatus};

use crate::cases::CaseReport;

fn fmt_score(score: Option<f64>) -> String {
    score
        .map(|s| format!("{:.3}", s))
        .unwrap_or_else(|| "n/a".to_string())
}

/// Print the final response to stdout and the quality summary to stderr
pub fn print_outcome(outcome: &Outcome) {
    eprintln!();
    match &outcome.status {
        RunStatus::Passed => eprintln!("{}", "=== PASSED ===".bright_green().bold()),
        RunStatus::Exhausted => eprintln!("{}", "=== BELOW THRESHOLD ===".bright_yellow().bold()),
        RunStatus::GeneratorFailed { attempt, error } => {
            eprintln!("{}", "=== GENERATION FAILED ===".bright_red().bold());
            eprintln!("Attempt {}: {}", attempt, error);
        }
    }

    eprintln!("Final score:      {}", fmt_score(outcome.final_score));
    eprintln!("Best score:       {}", fmt_score(outcome.best_score));
    eprintln!(
        "Passed threshold: {} ({:.2})",
        if outcome.passed_threshold { "yes" } else { "no" },
        outcome.threshold
    );
    eprintln!(
        "Attempts:         {}/{}",
        outcome.total_attempts, outcome.max_attempts
    );
    eprintln!("Duration:         {:.1}s", outcome.total_duration_secs);
    if let Some(feedback) = &outcome.final_feedback {
        eprintln!("Feedback:         {}", feedback);
    }

    if outcome.attempts.len() > 1 {
        eprintln!();
        eprintln!("{:>7}  {:>6}  {:<10}  Feedback", "Attempt", "Score", "Status");
        for attempt in &outcome.attempts {
            let status = match (&attempt.failure, attempt.score) {
                (Some(f), _) if f.kind == FailureKind::Generation => "gen failed",
                (Some(_), _) => "unscored",
                (None, Some(s)) if s >= outcome.threshold => "passed",
                (None, _) => "retry",
            };
            let note = attempt
                .feedback
                .as_deref()
                .or(attempt.failure.as_ref().map(|f| f.message.as_str()))
                .unwrap_or("");
            let note: String = note.lines().next().unwrap_or("").chars().take(60).collect();
            eprintln!(
                "{:>7}  {:>6}  {:<10}  {}",
                attempt.attempt_number,
                fmt_score(attempt.score),
                status,
                note.dimmed()
            );
        }
    }
    eprintln!();

    if let Some(response) = &outcome.final_response {
        println!("{}", response);
    }
}

/// Mean final score over the cases that produced a scored outcome
pub fn average_final_score(reports: &[CaseReport]) -> Option<f64> {
    let scores: Vec<f64> = reports
        .iter()
        .filter_map(|r| r.outcome.as_ref()?.final_score)
        .collect();
    if scores.is_empty() {
        return None;
    }
    Some(scores.iter().sum::<f64>() / scores.len() as f64)
}

/// One line per case after a batch
pub fn print_batch_summary(reports: &[CaseReport]) {
    eprintln!();
    eprintln!("{}", "=== SUMMARY ===".bold());
    eprintln!(
        "{:<12}  {:<17}  {:>6}  {:>6}  {:>8}",
        "Case", "Status", "Final", "Best", "Attempts"
    );

    for report in reports {
        match &report.outcome {
            Some(outcome) => {
                let status = if outcome.passed_threshold {
                    outcome.status_label().bright_green()
                } else {
                    outcome.status_label().bright_yellow()
                };
                eprintln!(
                    "{:<12}  {:<17}  {:>6}  {:>6}  {:>8}",
                    report.case_id,
                    status,
                    fmt_score(outcome.final_score),
                    fmt_score(outcome.best_score),
                    outcome.total_attempts
                );
            }
            None => {
                eprintln!(
                    "{:<12}  {:<17}  {}",
                    report.case_id,
                    "error".bright_red(),
                    report.error.as_deref().unwrap_or("")
                );
            }
        }
    }

    let passed = reports
        .iter()
        .filter(|r| r.outcome.as_ref().is_some_and(|o| o.passed_threshold))
        .count();
    let attempts: usize = reports
        .iter()
        .filter_map(|r| r.outcome.as_ref())
        .map(|o| o.total_attempts)
        .sum();
    eprintln!();
    eprintln!(
        "{}/{} cases passed, average final score {}, {} attempts in total",
        passed,
        reports.len(),
        fmt_score(average_final_score(reports)),
        attempts
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoreloop_core::{Ledger, Policy};
    use std::time::Duration;

    fn report(case_id: &str, final_score: Option<f64>) -> CaseReport {
        let policy = Policy::new(0.8, 3).unwrap();
        let mut outcome = Outcome::from_ledger(
            format!("run-{}", case_id),
            Ledger::default(),
            &policy,
            RunStatus::Exhausted,
            Duration::ZERO,
        );
        outcome.final_score = final_score;
        CaseReport {
            case_id: case_id.into(),
            outcome: Some(outcome),
            error: None,
        }
    }

    #[test]
    fn test_average_final_score_skips_unscored_and_rejected() {
        let reports = vec![
            report("CASE-001", Some(0.9)),
            report("CASE-002", Some(0.6)),
            report("CASE-003", None),
            CaseReport {
                case_id: "CASE-004".into(),
                outcome: None,
                error: Some("Unknown complexity tier: very_high".into()),
            },
        ];
        let avg = average_final_score(&reports).unwrap();
        assert!((avg - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_average_final_score_empty() {
        assert_eq!(average_final_score(&[]), None);
        assert_eq!(average_final_score(&[report("CASE-001", None)]), None);
    }
}
