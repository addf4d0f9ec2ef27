use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Structured log events for a generate-and-score run.
///
/// Attempt numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    RunStarted {
        run_id: String,
        prompt_preview: String,
        threshold: f64,
        max_attempts: usize,
        #[serde(default)]
        metadata: BTreeMap<String, String>,
    },
    GenerationStarted {
        attempt: usize,
        max_attempts: usize,
        with_feedback: bool,
    },
    GenerationCompleted {
        attempt: usize,
        response_chars: usize,
        duration_secs: f64,
    },
    GenerationFailed {
        attempt: usize,
        error: String,
    },
    ScoringStarted {
        attempt: usize,
    },
    ScoringCompleted {
        attempt: usize,
        score: f64,
        threshold: f64,
        feedback: Option<String>,
    },
    ScoringFailed {
        attempt: usize,
        error: String,
    },
    ThresholdMet {
        attempt: usize,
        score: f64,
        duration_secs: f64,
    },
    AttemptsExhausted {
        attempts: usize,
        best_score: Option<f64>,
        duration_secs: f64,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors and visual structure
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for run events - handles both console output and file logging
pub struct Logger {
    format: LogFormat,
    console: bool,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            console: true,
            file_writer: None,
        }
    }

    /// Logger that writes nothing to the console
    pub fn quiet() -> Self {
        Self {
            format: LogFormat::Json,
            console: false,
            file_writer: None,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            console: true,
            file_writer: Some(Mutex::new(file)),
        })
    }

    /// Keep the file mirror but stop console output
    pub fn without_console(mut self) -> Self {
        self.console = false;
        self
    }

    pub fn log(&self, event: &LogEvent) {
        // File output is always JSON
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        if !self.console {
            return;
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &LogEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &LogEvent) {
        Self::write_pretty(&mut std::io::stderr(), event);
    }

    fn close_attempt_box(out: &mut impl Write) {
        let _ = writeln!(
            out,
            "{}",
            "└─────────────────────────────────────────────────────────────────────┘".bright_blue()
        );
        let _ = writeln!(out);
    }

    fn write_pretty(out: &mut impl Write, event: &LogEvent) {
        match event {
            LogEvent::RunStarted {
                run_id,
                prompt_preview,
                threshold,
                max_attempts,
                metadata,
            } => {
                let _ = writeln!(out);
                let _ = writeln!(
                    out,
                    "{}",
                    "╭─────────────────────────────────────────────────────────────────────╮"
                        .bright_blue()
                );
                let _ = writeln!(
                    out,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "scoreloop".bold().bright_white(),
                    Self::truncate_with_padding(run_id, 56, 58).dimmed()
                );
                let _ = writeln!(
                    out,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Prompt:".dimmed(),
                    Self::truncate_with_padding(prompt_preview, 60, 60).dimmed()
                );
                let policy = format!("threshold {:.2}, up to {} attempts", threshold, max_attempts);
                let _ = writeln!(
                    out,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Policy:".dimmed(),
                    Self::truncate_with_padding(&policy, 60, 60).dimmed()
                );
                if !metadata.is_empty() {
                    let meta = metadata
                        .iter()
                        .map(|(k, v)| format!("{}={}", k, v))
                        .collect::<Vec<_>>()
                        .join(" ");
                    let _ = writeln!(
                        out,
                        "{}  {} {}",
                        "│".bright_blue(),
                        "Meta:".dimmed(),
                        Self::truncate_with_padding(&meta, 62, 62).dimmed()
                    );
                }
                let _ = writeln!(
                    out,
                    "{}",
                    "╰─────────────────────────────────────────────────────────────────────╯"
                        .bright_blue()
                );
                let _ = writeln!(out);
            }
            LogEvent::GenerationStarted {
                attempt,
                max_attempts,
                with_feedback,
            } => {
                let header = format!("─ Attempt {}/{} ", attempt, max_attempts);
                let padding = "─".repeat(67usize.saturating_sub(header.chars().count()));
                let _ = writeln!(
                    out,
                    "{}{}{}",
                    "┌".bright_blue(),
                    header.bright_blue().bold(),
                    padding.bright_blue()
                );
                let _ = writeln!(out);
                let note = if *with_feedback {
                    " (with feedback)".dimmed().to_string()
                } else {
                    String::new()
                };
                let _ = writeln!(
                    out,
                    "  {} {}{}",
                    "▶".bright_cyan(),
                    "GENERATE".bright_cyan().bold(),
                    note
                );
            }
            LogEvent::GenerationCompleted {
                response_chars,
                duration_secs,
                ..
            } => {
                let _ = writeln!(
                    out,
                    "    {} {} chars ({:.1}s)",
                    "✓".bright_green(),
                    response_chars,
                    duration_secs
                );
                let _ = writeln!(out);
            }
            LogEvent::GenerationFailed { attempt, error } => {
                let _ = writeln!(
                    out,
                    "    {} Generation failed on attempt {}: {}",
                    "✗".bright_red(),
                    attempt,
                    error.bright_red()
                );
                let _ = writeln!(out);
                Self::close_attempt_box(out);
            }
            LogEvent::ScoringStarted { .. } => {
                let _ = writeln!(
                    out,
                    "  {} {}",
                    "▶".bright_magenta(),
                    "SCORE".bright_magenta().bold()
                );
            }
            LogEvent::ScoringCompleted {
                score,
                threshold,
                feedback,
                ..
            } => {
                let line = format!("Score {:.3} (threshold {:.2})", score, threshold);
                let styled = if score >= threshold {
                    format!("✓ {}", line).bright_green().to_string()
                } else {
                    format!("→ {}", line).bright_yellow().to_string()
                };
                let _ = writeln!(out, "    {}", styled);
                if let Some(feedback) = feedback {
                    let _ = writeln!(
                        out,
                        "    {} {}",
                        "│".dimmed(),
                        Self::truncate(feedback, 200).dimmed()
                    );
                }
                let _ = writeln!(out);
                Self::close_attempt_box(out);
            }
            LogEvent::ScoringFailed { attempt, error } => {
                let _ = writeln!(
                    out,
                    "    {} Scoring failed on attempt {}: {}",
                    "⚠".bright_yellow(),
                    attempt,
                    error
                );
                let _ = writeln!(out);
                Self::close_attempt_box(out);
            }
            LogEvent::ThresholdMet { .. } => {
                // Printed by the caller with the final outcome
            }
            LogEvent::AttemptsExhausted {
                attempts,
                best_score,
                ..
            } => {
                let best = best_score
                    .map(|s| format!("{:.3}", s))
                    .unwrap_or_else(|| "n/a".to_string());
                let _ = writeln!(
                    out,
                    "{} Attempt budget spent ({}), best score {}",
                    "⚠".bright_yellow(),
                    attempts,
                    best
                );
            }
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            LogEvent::RunStarted {
                run_id,
                threshold,
                max_attempts,
                ..
            } => format!(
                "[{}] run:start {} t={:.2} n={}",
                timestamp, run_id, threshold, max_attempts
            ),
            LogEvent::GenerationStarted { attempt, .. } => {
                format!("[{}] gen:start:{}", timestamp, attempt)
            }
            LogEvent::GenerationCompleted {
                attempt,
                response_chars,
                duration_secs,
            } => format!(
                "[{}] gen:done:{} {}c {:.1}s",
                timestamp, attempt, response_chars, duration_secs
            ),
            LogEvent::GenerationFailed { attempt, error } => {
                format!("[{}] gen:fail:{} {}", timestamp, attempt, error)
            }
            LogEvent::ScoringStarted { attempt } => {
                format!("[{}] score:start:{}", timestamp, attempt)
            }
            LogEvent::ScoringCompleted { attempt, score, .. } => {
                format!("[{}] score:done:{} {:.3}", timestamp, attempt, score)
            }
            LogEvent::ScoringFailed { attempt, error } => {
                format!("[{}] score:fail:{} {}", timestamp, attempt, error)
            }
            LogEvent::ThresholdMet {
                attempt,
                score,
                duration_secs,
            } => format!(
                "[{}] run:passed:{} {:.3} {:.1}s",
                timestamp, attempt, score, duration_secs
            ),
            LogEvent::AttemptsExhausted {
                attempts,
                duration_secs,
                ..
            } => format!(
                "[{}] run:exhausted:{} {:.1}s",
                timestamp, attempts, duration_secs
            ),
        };
        let _ = writeln!(stderr, "{}", msg);
    }

    fn truncate(s: &str, max_chars: usize) -> String {
        if s.chars().count() > max_chars {
            let cut: String = s.chars().take(max_chars.saturating_sub(3)).collect();
            format!("{}...", cut)
        } else {
            s.to_string()
        }
    }

    /// Truncate a string and pad to exact width
    fn truncate_with_padding(s: &str, max_len: usize, total_width: usize) -> String {
        let truncated = Self::truncate(s, max_len);
        let padding_needed = total_width.saturating_sub(truncated.chars().count() + 1);
        format!("{}{}│", truncated, " ".repeat(padding_needed))
    }
}
