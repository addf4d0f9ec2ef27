use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Output captured from an external command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code from the process (-1 if killed by a signal)
    pub exit_code: i32,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
}

impl CommandOutput {
    pub fn new(stdout: String, stderr: String, exit_code: i32, duration: Duration) -> Self {
        Self {
            stdout,
            stderr,
            exit_code,
            duration,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Short description of a failed run, preferring stderr
    pub fn failure_summary(&self) -> String {
        let detail = if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        };
        let detail: String = detail.chars().take(300).collect();
        if detail.is_empty() {
            format!("exited with code {}", self.exit_code)
        } else {
            format!("exited with code {}: {}", self.exit_code, detail)
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs))
    }
}
