use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use crate::{CommandConfig, GenerationError, GenerationRequest, Generator, ProcessSpawner};

/// Placeholder in configured arguments that is replaced by the rendered prompt
const PROMPT_PLACEHOLDER: &str = "{prompt}";

/// Arguments for a collaborator command carrying `prompt`.
///
/// Every `{prompt}` placeholder is replaced by the prompt. Without a placeholder
/// the prompt is appended as the last positional argument after `--`.
pub fn build_command_args(configured: &[String], prompt: &str) -> Vec<String> {
    let has_placeholder = configured.iter().any(|a| a.contains(PROMPT_PLACEHOLDER));
    let mut args: Vec<String> = configured
        .iter()
        .map(|a| a.replace(PROMPT_PLACEHOLDER, prompt))
        .collect();

    if !has_placeholder {
        // `--` keeps prompts starting with '-' from being read as options
        args.push("--".to_string());
        args.push(prompt.to_string());
    }
    args
}

/// Generator backed by an external command (a model CLI or a wrapper script).
///
/// The rendered prompt is passed as described in [`build_command_args`].
pub struct CommandGenerator {
    name: String,
    binary_path: PathBuf,
    args: Vec<String>,
    config: CommandConfig,
}

impl CommandGenerator {
    pub fn new(binary_path: PathBuf, args: Vec<String>, config: CommandConfig) -> Self {
        let name = binary_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| binary_path.display().to_string());
        Self {
            name,
            binary_path,
            args,
            config,
        }
    }

}

#[async_trait]
impl Generator for CommandGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, GenerationError> {
        let prompt = request.rendered_prompt();
        debug!(
            generator = self.name(),
            attempt = request.attempt_number,
            prompt_len = prompt.len(),
            "Executing generator"
        );

        let args = build_command_args(&self.args, &prompt);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = ProcessSpawner::spawn(&self.binary_path, &arg_refs, &self.config).await?;

        if !output.success() {
            return Err(GenerationError::ExecutionFailed(output.failure_summary()));
        }

        let response = output.stdout.trim();
        if response.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(response.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Prompt;

    fn generator(args: &[&str]) -> CommandGenerator {
        CommandGenerator::new(
            PathBuf::from("echo"),
            owned(args),
            CommandConfig::default(),
        )
    }

    fn owned(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_build_args_replaces_placeholder() {
        let args = build_command_args(&owned(&["--model", "m", "--input={prompt}"]), "hello");
        assert_eq!(args, vec!["--model", "m", "--input=hello"]);
    }

    #[test]
    fn test_build_args_appends_prompt_without_placeholder() {
        let args = build_command_args(&owned(&["--print"]), "-hello");
        assert_eq!(args, vec!["--print", "--", "-hello"]);
    }

    #[test]
    fn test_name_from_binary() {
        let generator = CommandGenerator::new(
            PathBuf::from("/usr/local/bin/llm"),
            vec![],
            CommandConfig::default(),
        );
        assert_eq!(generator.name(), "llm");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_generate_returns_trimmed_stdout() {
        let generator = generator(&["{prompt}"]);
        let prompt = Prompt::new("describe the plan");
        let response = generator
            .generate(GenerationRequest {
                prompt: &prompt,
                prior_feedback: None,
                attempt_number: 1,
            })
            .await
            .unwrap();
        assert_eq!(response, "describe the plan");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_generate_non_zero_exit_is_failure() {
        let generator = CommandGenerator::new(
            PathBuf::from("sh"),
            vec!["-c".into(), "echo broken >&2; exit 1".into()],
            CommandConfig::default(),
        );
        let prompt = Prompt::new("x");
        let result = generator
            .generate(GenerationRequest {
                prompt: &prompt,
                prior_feedback: None,
                attempt_number: 1,
            })
            .await;
        match result {
            Err(GenerationError::ExecutionFailed(msg)) => assert!(msg.contains("broken")),
            other => panic!("expected ExecutionFailed, got {:?}", other),
        }
    }
}
