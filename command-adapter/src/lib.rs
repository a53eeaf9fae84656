#![warn(clippy::pedantic)]
//! Runs a local model CLI (by default `ollama run <model>`) as a one-shot
//! completion backend.

pub mod cmd;
pub mod discovery;
pub mod error;
pub mod process;
pub mod types;

use serde_json::Value;
use tokio::process::Command;

pub use discovery::{discover_command, COMMAND_BIN_ENV_VAR};
pub use error::CommandError;
pub use process::run_command;
pub use types::*;

#[derive(Debug, Clone)]
pub struct CommandRunner {
    pub path: std::path::PathBuf,
}

impl CommandRunner {
    pub const fn new(path: std::path::PathBuf) -> Self {
        Self { path }
    }

    /// Checks that the CLI starts and answers `--version`.
    ///
    /// # Errors
    /// Returns an error if the binary cannot be executed or exits non-zero.
    pub async fn check_health(&self) -> Result<String, CommandError> {
        let output = Command::new(&self.path)
            .arg("--version")
            .output()
            .await
            .map_err(|e| CommandError::SpawnFailed {
                stage: "spawn".to_string(),
                source: e,
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(CommandError::HealthCheck(format!(
                "{} --version exited with {}: {}",
                self.path.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }

    /// Runs one prompt and returns the collected output.
    ///
    /// # Errors
    /// Spawn failures, timeouts, oversized output and non-zero exits.
    pub async fn run(
        &self,
        prompt: &str,
        schema: Option<&Value>,
        config: &CommandConfig,
    ) -> Result<RunResult, CommandError> {
        let invocation = cmd::build_invocation(prompt, schema, config);
        let result = run_command(&self.path, &invocation, config).await?;

        if result.exit_code != 0 {
            return Err(CommandError::NonZeroExit {
                exit_code: result.exit_code,
                stdout: result.stdout,
                stderr: result.stderr,
            });
        }
        Ok(result)
    }
}
