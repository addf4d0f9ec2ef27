use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use scoreloop_agent::{GenerationError, GenerationRequest, Generator, Prompt};
use scoreloop_critic::{Scorer, ScoringError, ScoringInput};
use scoreloop_logging::{LogEvent, Logger};

use crate::context::RunContext;
use crate::error::RunError;
use crate::outcome::{Outcome, RunStatus};
use crate::{Attempt, Policy};

/// Per-call limits for the two external collaborators (None = no limit)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallTimeouts {
    pub generation: Option<Duration>,
    pub scoring: Option<Duration>,
}

/// Drives generate-then-score cycles until the policy is satisfied.
///
/// Holds no per-run state: every [`RetryController::run`] owns its own
/// policy and ledger, so one controller can serve many runs.
pub struct RetryController<'a> {
    generator: &'a dyn Generator,
    scorer: &'a dyn Scorer,
    logger: Arc<Logger>,
    timeouts: CallTimeouts,
}

impl<'a> RetryController<'a> {
    pub fn new(generator: &'a dyn Generator, scorer: &'a dyn Scorer, logger: Arc<Logger>) -> Self {
        Self {
            generator,
            scorer,
            logger,
            timeouts: CallTimeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: CallTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Run the loop for one prompt under `policy`.
    ///
    /// Invalid input is rejected before any external call. Everything that
    /// happens after that, including a generator failure, is reported
    /// through the returned [`Outcome`] together with the attempts made.
    pub async fn run(&self, prompt: &Prompt, policy: Policy) -> Result<Outcome, RunError> {
        if prompt.is_empty() {
            return Err(RunError::EmptyPrompt);
        }
        policy.validate()?;

        let mut context = RunContext::new(policy);

        self.logger.log(&LogEvent::RunStarted {
            run_id: context.run_id.clone(),
            prompt_preview: prompt.preview(100),
            threshold: context.policy.threshold(),
            max_attempts: context.policy.max_attempts(),
            metadata: context.policy.metadata().clone(),
        });

        while context.has_budget() {
            if let Some(status) = self.run_attempt(prompt, &mut context).await {
                return Ok(Self::finish(context, status));
            }
        }

        let best_score = context.ledger.best_score();
        self.logger.log(&LogEvent::AttemptsExhausted {
            attempts: context.ledger.len(),
            best_score,
            duration_secs: context.total_duration().as_secs_f64(),
        });
        info!(
            attempts = context.ledger.len(),
            best_score = ?best_score,
            "Attempt budget spent without meeting threshold"
        );

        Ok(Self::finish(context, RunStatus::Exhausted))
    }

    fn finish(context: RunContext, status: RunStatus) -> Outcome {
        let duration = context.total_duration();
        Outcome::from_ledger(
            context.run_id,
            context.ledger,
            &context.policy,
            status,
            duration,
        )
    }

    /// Run a single attempt and record it.
    /// Returns Some(status) if the run should terminate, None to continue
    async fn run_attempt(&self, prompt: &Prompt, context: &mut RunContext) -> Option<RunStatus> {
        let attempt_number = context.next_attempt_number();
        let max_attempts = context.policy.max_attempts();
        let started = Instant::now();

        let prior_feedback = context.prior_feedback().map(str::to_owned);
        let request = GenerationRequest {
            prompt,
            prior_feedback: prior_feedback.as_deref(),
            attempt_number,
        };

        self.logger.log(&LogEvent::GenerationStarted {
            attempt: attempt_number,
            max_attempts,
            with_feedback: request.prior_feedback.is_some(),
        });

        debug!(attempt = attempt_number, generator = self.generator.name(), "Generating");
        let generated = with_timeout(
            self.timeouts.generation,
            self.generator.generate(request),
            GenerationError::Timeout,
        )
        .await;

        let response = match generated {
            Ok(response) => response,
            Err(e) => {
                let error = e.to_string();
                warn!(attempt = attempt_number, error = %error, "Generation failed, stopping run");
                self.logger.log(&LogEvent::GenerationFailed {
                    attempt: attempt_number,
                    error: error.clone(),
                });
                context.record(Attempt::generation_failed(
                    attempt_number,
                    error.clone(),
                    started.elapsed(),
                ));
                return Some(RunStatus::GeneratorFailed {
                    attempt: attempt_number,
                    error,
                });
            }
        };

        self.logger.log(&LogEvent::GenerationCompleted {
            attempt: attempt_number,
            response_chars: response.chars().count(),
            duration_secs: started.elapsed().as_secs_f64(),
        });

        self.logger.log(&LogEvent::ScoringStarted {
            attempt: attempt_number,
        });

        debug!(attempt = attempt_number, scorer = self.scorer.name(), "Scoring");
        let input = ScoringInput {
            prompt,
            response: &response,
            attempt_number,
        };
        let judged = with_timeout(
            self.timeouts.scoring,
            self.scorer.score(input),
            ScoringError::Timeout,
        )
        .await;

        let judgment = match judged {
            Ok(judgment) => judgment,
            Err(e) => {
                let error = e.to_string();
                warn!(attempt = attempt_number, error = %error, "Scoring failed, continuing");
                self.logger.log(&LogEvent::ScoringFailed {
                    attempt: attempt_number,
                    error: error.clone(),
                });
                context.record(Attempt::unscored(
                    attempt_number,
                    response,
                    error,
                    started.elapsed(),
                ));
                return None;
            }
        };

        let (score, feedback) = judgment.into_parts();
        let threshold = context.policy.threshold();

        self.logger.log(&LogEvent::ScoringCompleted {
            attempt: attempt_number,
            score,
            threshold,
            feedback: feedback.clone(),
        });

        context.record(Attempt::scored(
            attempt_number,
            response,
            score,
            feedback,
            started.elapsed(),
        ));

        if context.policy.is_met_by(score) {
            self.logger.log(&LogEvent::ThresholdMet {
                attempt: attempt_number,
                score,
                duration_secs: context.total_duration().as_secs_f64(),
            });
            info!(attempt = attempt_number, score, threshold, "Threshold met");
            return Some(RunStatus::Passed);
        }

        info!(
            attempt = attempt_number,
            score, threshold, "Below threshold, retrying if budget allows"
        );
        None
    }
}

/// Await `fut`, mapping an elapsed limit to the collaborator's own timeout error
async fn with_timeout<T, E, F>(
    limit: Option<Duration>,
    fut: F,
    on_timeout: impl FnOnce(Duration) -> E,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    match limit {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(on_timeout(limit)),
        },
        None => fut.await,
    }
}
