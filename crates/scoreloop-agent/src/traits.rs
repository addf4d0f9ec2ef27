use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::Prompt;

/// Errors that can occur while producing a candidate response
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Failed to spawn generator process: {0}")]
    SpawnFailed(#[from] std::io::Error),

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Generation failed: {0}")]
    ExecutionFailed(String),

    #[error("Generator returned an empty response")]
    EmptyResponse,
}

/// Configuration for running an external command
#[derive(Debug, Clone)]
pub struct CommandConfig {
    /// Working directory for the process
    pub working_dir: PathBuf,
    /// Optional timeout (None = no limit)
    pub timeout: Option<Duration>,
    /// Additional environment variables
    pub env_vars: HashMap<String, String>,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            timeout: None,
            env_vars: HashMap::new(),
        }
    }
}

impl CommandConfig {
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            working_dir,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_env(mut self, key: String, value: String) -> Self {
        self.env_vars.insert(key, value);
        self
    }
}

/// Everything a generator sees for one attempt
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub prompt: &'a Prompt,
    /// Feedback from the immediately preceding attempt, if it had any
    pub prior_feedback: Option<&'a str>,
    /// 1-based attempt number within the run
    pub attempt_number: usize,
}

impl GenerationRequest<'_> {
    /// Text to send to the model for this attempt
    pub fn rendered_prompt(&self) -> String {
        self.prompt.render(self.prior_feedback)
    }
}

/// Produces candidate responses for a prompt
#[async_trait]
pub trait Generator: Send + Sync {
    /// Human-readable name of the generator
    fn name(&self) -> &str;

    /// Produce one candidate response
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, GenerationError>;
}
