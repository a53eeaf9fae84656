use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Model command not found: {0}")]
    ExecutableNotFound(String),

    #[error("Failed to {stage} process: {source}")]
    SpawnFailed {
        stage: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to join output reader ({stage}): {source}")]
    StreamFailed {
        stage: String,
        #[source]
        source: tokio::task::JoinError,
    },

    #[error("Child process has no {0} handle")]
    MissingPipe(&'static str),

    #[error("Child process exited before reporting a PID")]
    NoPid,

    #[error("Output exceeded {limit_bytes} bytes (captured {captured_bytes})")]
    OutputTruncated {
        captured_bytes: usize,
        limit_bytes: usize,
    },

    #[error("Process {pid} timed out after {elapsed:?}")]
    Timeout { elapsed: Duration, pid: u32 },

    #[error("Failed to send {signal} to {pid}: {reason}")]
    SignalFailed {
        signal: String,
        pid: u32,
        reason: String,
    },

    #[error(
        "Process exited with non-zero status: {exit_code}\nSTDOUT: {stdout}\nSTDERR: {stderr}"
    )]
    NonZeroExit {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("Health check failed: {0}")]
    HealthCheck(String),
}
