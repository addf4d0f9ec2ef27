use async_trait::async_trait;
use scoreloop_agent::{build_command_args, CommandConfig, GenerationError, ProcessSpawner, Prompt};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::{CriticPrompts, Judgment, JudgmentParseError};

/// Inputs required to score one response.
#[derive(Debug, Clone, Copy)]
pub struct ScoringInput<'a> {
    pub prompt: &'a Prompt,
    pub response: &'a str,
    pub attempt_number: usize,
}

/// Judges candidate responses
#[async_trait]
pub trait Scorer: Send + Sync {
    /// Human-readable name of the scorer
    fn name(&self) -> &str;

    /// Score one response
    async fn score(&self, input: ScoringInput<'_>) -> Result<Judgment, ScoringError>;
}

/// Scorer that runs an external judge command and parses its verdict
pub struct CommandScorer {
    name: String,
    binary_path: PathBuf,
    args: Vec<String>,
    rubric: Option<String>,
    config: CommandConfig,
}

impl CommandScorer {
    pub fn new(binary_path: PathBuf, args: Vec<String>, config: CommandConfig) -> Self {
        let name = binary_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| binary_path.display().to_string());
        Self {
            name,
            binary_path,
            args,
            rubric: None,
            config,
        }
    }

    pub fn with_rubric(mut self, rubric: String) -> Self {
        self.rubric = Some(rubric);
        self
    }
}

#[async_trait]
impl Scorer for CommandScorer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn score(&self, input: ScoringInput<'_>) -> Result<Judgment, ScoringError> {
        let prompt = CriticPrompts::build_scoring_prompt(
            &input.prompt.render(None),
            input.response,
            self.rubric.as_deref(),
            input.attempt_number,
        );

        debug!(
            prompt_len = prompt.len(),
            attempt = input.attempt_number,
            "Running judge"
        );

        let args = build_command_args(&self.args, &prompt);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

        let output = ProcessSpawner::spawn(&self.binary_path, &arg_refs, &self.config)
            .await
            .map_err(|e| match e {
                GenerationError::Timeout(limit) => ScoringError::Timeout(limit),
                other => ScoringError::AgentError(other.to_string()),
            })?;

        info!(
            exit_code = output.exit_code,
            duration_secs = output.duration.as_secs_f64(),
            "Judge completed"
        );

        if !output.success() {
            return Err(ScoringError::AgentError(format!(
                "Judge {}",
                output.failure_summary()
            )));
        }

        Judgment::parse(&output.stdout).map_err(ScoringError::ParseError)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("Judge execution error: {0}")]
    AgentError(String),

    #[error("Scoring timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to parse judgment: {0}")]
    ParseError(#[from] JudgmentParseError),
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell_scorer(script: &str) -> CommandScorer {
        CommandScorer::new(
            PathBuf::from("sh"),
            vec!["-c".into(), script.into()],
            CommandConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_command_scorer_parses_judgment() {
        let scorer = shell_scorer(r#"echo '<judgment>{"score": 0.9, "feedback": "ok"}</judgment>'"#);
        let prompt = Prompt::new("task");
        let judgment = scorer
            .score(ScoringInput {
                prompt: &prompt,
                response: "answer",
                attempt_number: 1,
            })
            .await
            .unwrap();
        assert!((judgment.score() - 0.9).abs() < 1e-9);
        assert_eq!(judgment.feedback(), Some("ok"));
    }

    #[tokio::test]
    async fn test_command_scorer_substitutes_prompt_placeholder() {
        let scorer = CommandScorer::new(
            PathBuf::from("sh"),
            vec![
                "-c".into(),
                r#"echo "SCORE: 0.8"; echo "FEEDBACK: args=$#""#.into(),
                "sh".into(),
                "{prompt}".into(),
            ],
            CommandConfig::default(),
        );
        let prompt = Prompt::new("task");
        let judgment = scorer
            .score(ScoringInput {
                prompt: &prompt,
                response: "answer",
                attempt_number: 1,
            })
            .await
            .unwrap();
        // Only the substituted prompt, no trailing `--` pair
        assert_eq!(judgment.feedback(), Some("args=1"));
    }

    #[tokio::test]
    async fn test_command_scorer_receives_judge_prompt() {
        let scorer = CommandScorer::new(
            PathBuf::from("sh"),
            vec![
                "-c".into(),
                r###"case "$1" in *"## Rubric"*) echo "SCORE: 1.0";; *) echo "SCORE: 0.0";; esac"###
                    .into(),
                "sh".into(),
                "{prompt}".into(),
            ],
            CommandConfig::default(),
        );
        let prompt = Prompt::new("task");
        let judgment = scorer
            .score(ScoringInput {
                prompt: &prompt,
                response: "answer",
                attempt_number: 1,
            })
            .await
            .unwrap();
        assert_eq!(judgment.score(), 1.0);
    }

    #[tokio::test]
    async fn test_command_scorer_unparseable_output() {
        let scorer = shell_scorer("echo looks fine to me");
        let prompt = Prompt::new("task");
        let result = scorer
            .score(ScoringInput {
                prompt: &prompt,
                response: "answer",
                attempt_number: 1,
            })
            .await;
        assert!(matches!(result, Err(ScoringError::ParseError(_))));
    }

    #[tokio::test]
    async fn test_command_scorer_non_zero_exit() {
        let scorer = shell_scorer("exit 4");
        let prompt = Prompt::new("task");
        let result = scorer
            .score(ScoringInput {
                prompt: &prompt,
                response: "answer",
                attempt_number: 1,
            })
            .await;
        assert!(matches!(result, Err(ScoringError::AgentError(_))));
    }
}
