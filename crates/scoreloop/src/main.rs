mod cases;
mod config;
mod report;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use scoreloop_agent::{CommandConfig, CommandGenerator};
use scoreloop_core::{
    CallTimeouts, ComplexityTier, Policy, PolicyError, Prompt, RetryController, RunError,
    REJECTED_EXIT_CODE,
};
use scoreloop_critic::CommandScorer;
use scoreloop_logging::{LogFormat, Logger};

use crate::cases::{CaseFile, CaseReport};
use crate::config::{ProjectConfig, DEFAULT_MAX_ATTEMPTS};

#[derive(Parser, Debug)]
#[command(
    name = "scoreloop",
    about = "Generate, score, retry until the answer is good enough",
    version,
    author
)]
struct Cli {
    /// Task prompt (or reads from prompt.md if not provided)
    #[arg(short, long)]
    prompt: Option<String>,

    /// Path to prompt file (default: ./prompt.md)
    #[arg(long, default_value = "prompt.md")]
    prompt_file: PathBuf,

    /// Structured context for the prompt, as key=value (repeatable)
    #[arg(short, long = "context", value_parser = parse_key_val)]
    context: Vec<(String, String)>,

    /// Complexity tier deciding the pass threshold
    #[arg(long, value_enum, conflicts_with = "threshold")]
    tier: Option<TierChoice>,

    /// Explicit pass threshold in [0, 1]
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Maximum attempts per run
    #[arg(short = 'n', long)]
    max_attempts: Option<usize>,

    /// Annotation carried into the outcome, as key=value (repeatable)
    #[arg(long = "metadata", value_parser = parse_key_val)]
    metadata: Vec<(String, String)>,

    /// Run every case in a TOML cases file instead of a single prompt
    #[arg(long, conflicts_with_all = ["prompt", "tier", "threshold"])]
    cases: Option<PathBuf>,

    /// Generator program (replaces [generator] command and args from scoreloop.toml)
    #[arg(long)]
    generator_cmd: Option<PathBuf>,

    /// Judge program (replaces [scorer] command and args from scoreloop.toml)
    #[arg(long)]
    scorer_cmd: Option<PathBuf>,

    /// Rubric text handed to the judge
    #[arg(long)]
    rubric: Option<String>,

    /// Working directory (default: current directory)
    #[arg(short = 'd', long)]
    working_dir: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormatChoice,

    /// Tracing level for diagnostics (RUST_LOG overrides)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Also append run events as JSON lines to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Suppress run events on the console
    #[arg(short, long)]
    quiet: bool,

    /// Output final result as JSON
    #[arg(long)]
    json_output: bool,

    /// Dry run: show what would happen without executing
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TierChoice {
    Low,
    Medium,
    High,
}

impl From<TierChoice> for ComplexityTier {
    fn from(choice: TierChoice) -> Self {
        match choice {
            TierChoice::Low => ComplexityTier::Low,
            TierChoice::Medium => ComplexityTier::Medium,
            TierChoice::High => ComplexityTier::High,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// What this invocation runs
enum RunMode {
    Single(Prompt, Policy),
    Batch(CaseFile),
}

/// Program and arguments for one collaborator
struct CommandSpec {
    program: Option<PathBuf>,
    args: Vec<String>,
}

impl CommandSpec {
    fn resolve(cli: Option<&PathBuf>, file_command: Option<&str>, file_args: &[String]) -> Self {
        match cli {
            Some(program) => Self {
                program: Some(program.clone()),
                args: Vec::new(),
            },
            None => Self {
                program: file_command.map(PathBuf::from),
                args: file_args.to_vec(),
            },
        }
    }

    fn describe(&self) -> String {
        match &self.program {
            Some(program) if self.args.is_empty() => program.display().to_string(),
            Some(program) => format!("{} {}", program.display(), self.args.join(" ")),
            None => "<not configured>".to_string(),
        }
    }

    fn require(&self, role: &str, section: &str) -> Result<PathBuf> {
        self.program.clone().with_context(|| {
            format!(
                "No {} command configured. Use --{}-cmd or set [{}] command in scoreloop.toml",
                role, role, section
            )
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => match rejection_exit_code(&e) {
            Some(exit_code) => {
                eprintln!("Error: {:#}", e);
                std::process::exit(exit_code);
            }
            None => Err(e),
        },
    }
}

/// Exit code for errors that reject the run's input, as opposed to
/// environment failures (missing files, bad config) which exit with 1
fn rejection_exit_code(err: &anyhow::Error) -> Option<i32> {
    let rejected =
        err.downcast_ref::<PolicyError>().is_some() || err.downcast_ref::<RunError>().is_some();
    rejected.then_some(REJECTED_EXIT_CODE)
}

async fn run(cli: Cli) -> Result<i32> {
    let log_format: LogFormat = cli.log_format.into();
    scoreloop_logging::init_tracing(&cli.log_level, log_format);

    let working_dir = match cli.working_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let config = ProjectConfig::load(&working_dir)?.unwrap_or_default();

    let generator_spec = CommandSpec::resolve(
        cli.generator_cmd.as_ref(),
        config.generator.command.as_deref(),
        &config.generator.args,
    );
    let scorer_spec = CommandSpec::resolve(
        cli.scorer_cmd.as_ref(),
        config.scorer.command.as_deref(),
        &config.scorer.args,
    );
    let timeouts = CallTimeouts {
        generation: config.generator.timeout,
        scoring: config.scorer.timeout,
    };

    let mode = match cli.cases.as_deref() {
        Some(path) => RunMode::Batch(CaseFile::load(path)?),
        None => {
            let (prompt, policy) = build_single_run(&cli, &config, &working_dir)?;
            RunMode::Single(prompt, policy)
        }
    };
    let default_max_attempts = cli
        .max_attempts
        .or(config.policy.max_attempts)
        .unwrap_or(DEFAULT_MAX_ATTEMPTS);

    if cli.dry_run {
        println!("=== Dry Run ===");
        println!("Working dir: {}", working_dir.display());
        println!("Generator: {}", generator_spec.describe());
        println!("Scorer: {}", scorer_spec.describe());
        match &mode {
            RunMode::Single(prompt, policy) => {
                println!("Prompt: {}", prompt.preview(100));
                println!(
                    "Policy: threshold {:.2}, max attempts {}",
                    policy.threshold(),
                    policy.max_attempts()
                );
            }
            RunMode::Batch(file) => {
                for case in &file.cases {
                    match case.policy(default_max_attempts) {
                        Ok(policy) => println!(
                            "Case {}: threshold {:.2}, max attempts {}",
                            case.id,
                            policy.threshold(),
                            policy.max_attempts()
                        ),
                        Err(e) => println!("Case {}: {}", case.id, e),
                    }
                }
            }
        }
        return Ok(0);
    }

    let mut generator_config = CommandConfig::new(working_dir.clone());
    let mut scorer_config = CommandConfig::new(working_dir.clone());
    if let Some(limit) = timeouts.generation {
        generator_config = generator_config.with_timeout(limit);
    }
    if let Some(limit) = timeouts.scoring {
        scorer_config = scorer_config.with_timeout(limit);
    }

    let generator = CommandGenerator::new(
        generator_spec.require("generator", "generator")?,
        generator_spec.args.clone(),
        generator_config,
    );
    let mut scorer = CommandScorer::new(
        scorer_spec.require("scorer", "scorer")?,
        scorer_spec.args.clone(),
        scorer_config,
    );
    if let Some(rubric) = cli.rubric.clone().or(config.scorer.rubric.clone()) {
        scorer = scorer.with_rubric(rubric);
    }

    let logger = Arc::new(build_logger(&cli, log_format)?);
    let controller = RetryController::new(&generator, &scorer, logger).with_timeouts(timeouts);

    let exit_code = match mode {
        RunMode::Single(prompt, policy) => {
            let outcome = controller.run(&prompt, policy).await?;
            if cli.json_output {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                report::print_outcome(&outcome);
            }
            outcome.exit_code()
        }
        RunMode::Batch(file) => {
            let reports = run_cases(&controller, &file, default_max_attempts, &cli).await;
            if cli.json_output {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                report::print_batch_summary(&reports);
            }
            reports.iter().map(CaseReport::exit_code).max().unwrap_or(0)
        }
    };

    Ok(exit_code)
}

fn build_logger(cli: &Cli, format: LogFormat) -> Result<Logger> {
    let logger = match &cli.log_file {
        Some(path) => Logger::with_file(format, path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?,
        None => Logger::new(format),
    };
    Ok(if cli.quiet {
        logger.without_console()
    } else {
        logger
    })
}

fn build_single_run(cli: &Cli, config: &ProjectConfig, working_dir: &Path) -> Result<(Prompt, Policy)> {
    let mut prompt = Prompt::new(get_prompt(cli, working_dir)?);
    for (key, value) in &cli.context {
        prompt = prompt.with_context(key.clone(), value.clone());
    }

    let mut policy = config
        .policy
        .resolve(cli.threshold, cli.tier.map(Into::into), cli.max_attempts)
        .context("Invalid policy")?;
    for (key, value) in &cli.metadata {
        policy = policy.with_metadata(key.clone(), value.clone());
    }

    Ok((prompt, policy))
}

async fn run_cases(
    controller: &RetryController<'_>,
    file: &CaseFile,
    default_max_attempts: usize,
    cli: &Cli,
) -> Vec<CaseReport> {
    let mut reports = Vec::with_capacity(file.cases.len());

    for (i, case) in file.cases.iter().enumerate() {
        if !cli.quiet && !cli.json_output {
            eprintln!();
            eprintln!("=== CASE {}/{}: {} ({}) ===", i + 1, file.cases.len(), case.id, case.tier);
        }

        let policy = match case.policy(default_max_attempts) {
            Ok(policy) => cli
                .metadata
                .iter()
                .fold(policy, |p, (k, v)| p.with_metadata(k.clone(), v.clone())),
            Err(e) => {
                eprintln!("Skipping {}: {}", case.id, e);
                reports.push(CaseReport {
                    case_id: case.id.clone(),
                    outcome: None,
                    error: Some(e.to_string()),
                });
                continue;
            }
        };

        let report = match controller.run(&case.prompt(), policy).await {
            Ok(outcome) => {
                if !cli.json_output {
                    report::print_outcome(&outcome);
                }
                CaseReport {
                    case_id: case.id.clone(),
                    outcome: Some(outcome),
                    error: None,
                }
            }
            Err(e) => CaseReport {
                case_id: case.id.clone(),
                outcome: None,
                error: Some(e.to_string()),
            },
        };
        reports.push(report);
    }

    reports
}

fn get_prompt(cli: &Cli, working_dir: &Path) -> Result<String> {
    // Prefer --prompt flag
    if let Some(ref prompt) = cli.prompt {
        return Ok(prompt.clone());
    }

    let prompt_path = if cli.prompt_file.is_absolute() {
        cli.prompt_file.clone()
    } else {
        working_dir.join(&cli.prompt_file)
    };

    if prompt_path.exists() {
        let content =
            std::fs::read_to_string(&prompt_path).context("Failed to read prompt file")?;
        Ok(content.trim().to_string())
    } else {
        anyhow::bail!(
            "No prompt provided. Use --prompt or create a {} file",
            cli.prompt_file.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("symptoms=fever, cough").unwrap(),
            ("symptoms".to_string(), "fever, cough".to_string())
        );
        assert_eq!(
            parse_key_val("url=a=b").unwrap(),
            ("url".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_cli_parses_tier_and_metadata() {
        let cli = Cli::try_parse_from([
            "scoreloop",
            "--prompt",
            "hi",
            "--tier",
            "high",
            "--metadata",
            "case_id=CASE-1",
            "-n",
            "4",
        ])
        .unwrap();
        let (prompt, policy) =
            build_single_run(&cli, &ProjectConfig::default(), Path::new(".")).unwrap();
        assert_eq!(prompt.text, "hi");
        assert_eq!(policy.threshold(), 0.9);
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.metadata()["case_id"], "CASE-1");
    }

    #[test]
    fn test_cli_rejects_tier_with_threshold() {
        let result = Cli::try_parse_from([
            "scoreloop", "--prompt", "hi", "--tier", "low", "--threshold", "0.5",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_rejects_unknown_tier() {
        let result = Cli::try_parse_from(["scoreloop", "--prompt", "hi", "--tier", "extreme"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_threshold_is_error() {
        let cli = Cli::try_parse_from(["scoreloop", "--prompt", "hi", "--threshold", "1.5"]).unwrap();
        assert!(build_single_run(&cli, &ProjectConfig::default(), Path::new(".")).is_err());
    }

    #[test]
    fn test_rejected_input_has_its_own_exit_code() {
        let cli = Cli::try_parse_from(["scoreloop", "--prompt", "hi", "--threshold", "1.5"]).unwrap();
        let err = build_single_run(&cli, &ProjectConfig::default(), Path::new(".")).unwrap_err();
        assert_eq!(rejection_exit_code(&err), Some(REJECTED_EXIT_CODE));

        let err = anyhow::Error::from(RunError::EmptyPrompt);
        assert_eq!(rejection_exit_code(&err), Some(REJECTED_EXIT_CODE));
    }

    #[test]
    fn test_missing_prompt_file_is_not_a_rejection() {
        let cli = Cli::try_parse_from(["scoreloop"]).unwrap();
        let err = build_single_run(
            &cli,
            &ProjectConfig::default(),
            Path::new("/nonexistent/scoreloop-dir"),
        )
        .unwrap_err();
        assert_eq!(rejection_exit_code(&err), None);
    }

    #[test]
    fn test_cli_command_overrides_file() {
        let file_args = vec!["-m".to_string(), "x".to_string()];
        let cli_program = PathBuf::from("my-llm");
        let spec = CommandSpec::resolve(Some(&cli_program), Some("llm"), &file_args);
        assert_eq!(spec.describe(), "my-llm");

        let spec = CommandSpec::resolve(None, Some("llm"), &file_args);
        assert_eq!(spec.describe(), "llm -m x");

        let spec = CommandSpec::resolve(None, None, &[]);
        assert!(spec.require("generator", "generator").is_err());
    }
}
