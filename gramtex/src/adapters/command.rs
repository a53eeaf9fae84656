use async_trait::async_trait;
use gramtex_command::{CommandConfig, CommandError, CommandRunner};
use gramtex_core::completion::{CompletionError, CompletionRequest, CompletionService};

const BACKEND: &str = "command";

/// [`CompletionService`] that runs a local model CLI once per request.
#[derive(Debug, Clone)]
pub struct CommandService {
    /// The underlying CLI runner.
    pub runner: CommandRunner,
    /// Invocation settings shared by every request.
    pub config: CommandConfig,
}

impl CommandService {
    /// Creates a service running `runner` with `config`.
    #[must_use]
    pub const fn new(runner: CommandRunner, config: CommandConfig) -> Self {
        Self { runner, config }
    }
}

#[async_trait]
impl CompletionService for CommandService {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let result = self
            .runner
            .run(&request.prompt, request.schema.as_ref(), &self.config)
            .await
            .map_err(into_completion_error)?;

        tracing::trace!(kind = %request.kind, duration_ms = result.duration_ms, "command finished");

        // Empty stdout is an empty answer; the loops retry it.
        if result.stdout.trim().is_empty() {
            tracing::warn!(
                event = "command_empty_output",
                backend = BACKEND,
                kind = %request.kind,
                stderr = %result.stderr,
                "command_empty_output"
            );
            return Ok(String::new());
        }
        Ok(result.stdout)
    }
}

fn into_completion_error(error: CommandError) -> CompletionError {
    match error {
        CommandError::Timeout { elapsed, .. } => CompletionError::Timeout(elapsed),
        CommandError::SpawnFailed { .. }
        | CommandError::StreamFailed { .. }
        | CommandError::MissingPipe(_)
        | CommandError::NoPid
        | CommandError::SignalFailed { .. } => CompletionError::Transport(error.to_string()),
        other => CompletionError::Backend(other.to_string()),
    }
}
