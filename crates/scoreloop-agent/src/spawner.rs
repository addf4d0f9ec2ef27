use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, trace, warn};

use crate::{CommandConfig, CommandOutput, GenerationError};

/// Utility for spawning generator and judge processes
pub struct ProcessSpawner;

impl ProcessSpawner {
    /// Spawn a process and capture its output, honouring `config.timeout`
    pub async fn spawn(
        binary: &Path,
        args: &[&str],
        config: &CommandConfig,
    ) -> Result<CommandOutput, GenerationError> {
        let start = Instant::now();

        debug!(
            binary = %binary.display(),
            args = args.len(),
            working_dir = %config.working_dir.display(),
            "Spawning process"
        );

        let mut cmd = Command::new(binary);
        cmd.args(args)
            .current_dir(&config.working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null()) // Non-interactive
            .kill_on_drop(true);

        for (key, value) in &config.env_vars {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn()?;

        let stdout_handle = child.stdout.take().ok_or_else(|| {
            GenerationError::ExecutionFailed("stdout not captured".to_string())
        })?;
        let stderr_handle = child.stderr.take().ok_or_else(|| {
            GenerationError::ExecutionFailed("stderr not captured".to_string())
        })?;

        let collect = async {
            // Read both streams concurrently so neither pipe fills up
            let (stdout, stderr) = tokio::join!(
                read_lines(stdout_handle, "stdout"),
                read_lines(stderr_handle, "stderr")
            );
            let status = child.wait().await?;
            Ok::<_, GenerationError>((stdout?, stderr?, status))
        };

        let (stdout, stderr, status) = match config.timeout {
            Some(limit) => match tokio::time::timeout(limit, collect).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!(binary = %binary.display(), ?limit, "Process timed out, killing");
                    let _ = child.start_kill();
                    return Err(GenerationError::Timeout(limit));
                }
            },
            None => collect.await?,
        };

        let duration = start.elapsed();

        debug!(
            exit_code = status.code().unwrap_or(-1),
            duration_ms = duration.as_millis(),
            "Process completed"
        );

        Ok(CommandOutput::new(
            stdout,
            stderr,
            status.code().unwrap_or(-1),
            duration,
        ))
    }
}

async fn read_lines<R>(handle: R, stream: &'static str) -> Result<String, GenerationError>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(handle).lines();
    let mut collected = String::new();

    loop {
        match reader.next_line().await {
            Ok(Some(line)) => {
                trace!(stream, line = %line, "process output");
                if !collected.is_empty() {
                    collected.push('\n');
                }
                collected.push_str(&line);
            }
            Ok(None) => break,
            Err(e) => {
                return Err(GenerationError::ExecutionFailed(format!(
                    "Failed to read {}: {}",
                    stream, e
                )));
            }
        }
    }

    Ok(collected)
}
