//! Subprocess execution and lifecycle management for the model CLI.

use crate::error::CommandError;
use crate::types::{CommandConfig, Invocation, RunResult};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};
use tokio::task::JoinSet;
use tokio::time::timeout;

const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024; // 10 MB
const GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Collected output lines, total byte count, and whether truncation occurred.
type StreamOutput = (Vec<String>, usize, bool);

/// Stdout lines, stderr lines, and exit status.
type CollectedOutput = (Vec<String>, Vec<String>, std::process::ExitStatus);

type TimedCollectionResult =
    Result<Result<CollectedOutput, CommandError>, tokio::time::error::Elapsed>;

/// Which pipe a reader task drains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pipe {
    Stdout,
    Stderr,
}

/// Spawns the model CLI for one prompt and collects its output.
///
/// A non-zero exit is reported in [`RunResult::exit_code`], not as an error.
///
/// # Errors
/// Returns a [`CommandError`] if the process cannot be spawned, times out,
/// produces truncated output, or encounters an I/O failure.
pub async fn run_command(
    path: &std::path::Path,
    invocation: &Invocation,
    config: &CommandConfig,
) -> Result<RunResult, CommandError> {
    let start_time = Instant::now();

    let mut child = spawn_child(path, invocation, config)?;

    let stdin = match invocation.stdin {
        Some(_) => Some(child.stdin.take().ok_or(CommandError::MissingPipe("stdin"))?),
        None => None,
    };
    let stdout = child.stdout.take().ok_or(CommandError::MissingPipe("stdout"))?;
    let stderr = child.stderr.take().ok_or(CommandError::MissingPipe("stderr"))?;
    let pid = child.id().ok_or(CommandError::NoPid)?;
    tracing::debug!(pid, program = %path.display(), "Spawned model command");

    // Readers must be running before the prompt is written.
    let mut tasks = JoinSet::new();
    tasks.spawn(async move { (Pipe::Stdout, drain_stream_bounded(stdout).await) });
    tasks.spawn(async move { (Pipe::Stderr, drain_stream_bounded(stderr).await) });

    let payload = invocation.stdin.as_deref();
    let process_result = timeout(config.timeout, async {
        if let (Some(pipe), Some(payload)) = (stdin, payload) {
            write_prompt(pipe, payload).await?;
        }
        collect_output(&mut child, &mut tasks).await
    })
    .await;
    let duration = start_time.elapsed();

    build_run_result(process_result, &mut child, pid, &mut tasks, duration).await
}

fn spawn_child(
    path: &std::path::Path,
    invocation: &Invocation,
    config: &CommandConfig,
) -> Result<tokio::process::Child, CommandError> {
    let mut cmd = Command::new(path);
    cmd.args(&invocation.args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if invocation.stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }

    if let Some(ref dir) = config.cwd {
        cmd.current_dir(dir);
    }

    for (k, v) in &config.env_vars {
        cmd.env(k, v);
    }

    cmd.spawn().map_err(|e| CommandError::SpawnFailed {
        stage: "spawn".to_string(),
        source: e,
    })
}

/// Writes the prompt and closes the pipe so the child sees EOF.
///
/// A child that exits without reading its input is not an error here; its
/// exit status and output are still collected.
async fn write_prompt(mut pipe: ChildStdin, payload: &str) -> Result<(), CommandError> {
    match pipe.write_all(payload.as_bytes()).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
            tracing::debug!("Model command closed stdin before reading the whole prompt");
            Ok(())
        }
        Err(e) => Err(CommandError::SpawnFailed {
            stage: "write stdin of".to_string(),
            source: e,
        }),
    }
}

async fn collect_output(
    child: &mut tokio::process::Child,
    tasks: &mut JoinSet<(Pipe, StreamOutput)>,
) -> Result<CollectedOutput, CommandError> {
    let mut stdout_lines = Vec::new();
    let mut stderr_lines = Vec::new();

    while let Some(result) = tasks.join_next().await {
        let (pipe, (lines, bytes, truncated)) =
            result.map_err(|e| CommandError::StreamFailed {
                stage: "join".to_string(),
                source: e,
            })?;

        if truncated {
            return Err(CommandError::OutputTruncated {
                captured_bytes: bytes,
                limit_bytes: MAX_OUTPUT_BYTES,
            });
        }

        match pipe {
            Pipe::Stdout => stdout_lines = lines,
            Pipe::Stderr => stderr_lines = lines,
        }
    }

    let status = child.wait().await.map_err(|e| CommandError::SpawnFailed {
        stage: "wait for".to_string(),
        source: e,
    })?;

    Ok((stdout_lines, stderr_lines, status))
}

async fn build_run_result(
    process_result: TimedCollectionResult,
    child: &mut tokio::process::Child,
    pid: u32,
    tasks: &mut JoinSet<(Pipe, StreamOutput)>,
    duration: Duration,
) -> Result<RunResult, CommandError> {
    let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);

    match process_result {
        Ok(Ok((stdout_lines, stderr_lines, status))) => Ok(RunResult {
            stdout: stdout_lines.join("\n"),
            stderr: stderr_lines.join("\n"),
            exit_code: status.code().unwrap_or(-1),
            duration_ms,
        }),
        Ok(Err(e)) => Err(e),
        Err(_) => {
            if let Err(e) = graceful_shutdown(child, pid, tasks).await {
                tracing::warn!(event = "shutdown_failed", pid, error = %e, "shutdown_failed");
            }
            Err(CommandError::Timeout {
                elapsed: duration,
                pid,
            })
        }
    }
}

/// Drains a stream line by line, keeping at most [`MAX_OUTPUT_BYTES`].
async fn drain_stream_bounded(stream: impl tokio::io::AsyncRead + Unpin) -> StreamOutput {
    let mut reader = BufReader::new(stream).lines();
    let mut lines = Vec::new();
    let mut total_bytes = 0usize;
    let mut truncated = false;

    while let Ok(Some(line)) = reader.next_line().await {
        let line_bytes = line.len();
        if total_bytes + line_bytes <= MAX_OUTPUT_BYTES {
            lines.push(line);
            total_bytes += line_bytes;
        } else {
            truncated = true;
        }
    }

    (lines, total_bytes, truncated)
}

/// Graceful shutdown: `SIGTERM`, wait grace period, then `SIGKILL`.
#[cfg(unix)]
async fn graceful_shutdown(
    child: &mut tokio::process::Child,
    pid: u32,
    tasks: &mut JoinSet<(Pipe, StreamOutput)>,
) -> Result<(), CommandError> {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let raw_pid = i32::try_from(pid).map_err(|_| CommandError::SignalFailed {
        signal: "SIGTERM".to_string(),
        pid,
        reason: "PID value exceeds i32::MAX".to_string(),
    })?;

    signal::kill(Pid::from_raw(raw_pid), Signal::SIGTERM).map_err(|e| {
        CommandError::SignalFailed {
            signal: "SIGTERM".to_string(),
            pid,
            reason: e.to_string(),
        }
    })?;

    match timeout(GRACE_PERIOD, child.wait()).await {
        Ok(Ok(_status)) => {}
        Ok(Err(e)) => {
            return Err(CommandError::SpawnFailed {
                stage: "wait for terminated".to_string(),
                source: e,
            });
        }
        Err(_) => {
            child.kill().await.map_err(|e| CommandError::SpawnFailed {
                stage: "kill".to_string(),
                source: e,
            })?;
        }
    }

    tasks.abort_all();
    Ok(())
}

#[cfg(windows)]
async fn graceful_shutdown(
    child: &mut tokio::process::Child,
    _pid: u32,
    tasks: &mut JoinSet<(Pipe, StreamOutput)>,
) -> Result<(), CommandError> {
    child.kill().await.map_err(|e| CommandError::SpawnFailed {
        stage: "terminate".to_string(),
        source: e,
    })?;
    tasks.abort_all();
    Ok(())
}

#[cfg(all(test, unix))]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::path::Path;

    fn sh(script: &str, stdin: Option<&str>) -> Invocation {
        Invocation {
            args: vec![OsString::from("-c"), OsString::from(script)],
            stdin: stdin.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_stdin_is_echoed() {
        let result = run_command(
            Path::new("/bin/sh"),
            &sh("cat", Some("line one\nline two")),
            &CommandConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "line one\nline two");
    }

    #[tokio::test]
    async fn test_large_prompt_with_chatty_child_does_not_deadlock() {
        let prompt = "x".repeat(256 * 1024);
        let config = CommandConfig::default().with_timeout(Duration::from_secs(20));

        let result = run_command(
            Path::new("/bin/sh"),
            &sh("yes chatter | head -n 40000; cat > /dev/null; echo done", Some(&prompt)),
            &config,
        )
        .await
        .unwrap();

        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout.lines().count(), 40001);
        assert!(result.stdout.ends_with("done"));
    }

    #[tokio::test]
    async fn test_child_ignoring_stdin_still_reports_output() {
        let prompt = "y".repeat(256 * 1024);

        let result = run_command(
            Path::new("/bin/sh"),
            &sh("echo ignored", Some(&prompt)),
            &CommandConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(result.stdout, "ignored");
    }

    #[tokio::test]
    async fn test_stderr_and_exit_code_are_captured() {
        let result = run_command(
            Path::new("/bin/sh"),
            &sh("echo oops >&2; exit 3", None),
            &CommandConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(result.exit_code, 3);
        assert_eq!(result.stderr, "oops");
        assert!(result.stdout.is_empty());
    }

    #[tokio::test]
    async fn test_env_and_cwd_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let config = CommandConfig {
            cwd: Some(dir.path().to_path_buf()),
            ..CommandConfig::default()
        }
        .with_env("GRAMTEX_TEST_VALUE", "42");

        let result = run_command(
            Path::new("/bin/sh"),
            &sh("echo \"$GRAMTEX_TEST_VALUE\"; pwd", None),
            &config,
        )
        .await
        .unwrap();

        let lines: Vec<&str> = result.stdout.lines().collect();
        assert_eq!(lines[0], "42");
        assert!(lines[1].ends_with(dir.path().file_name().unwrap().to_str().unwrap()));
    }

    #[tokio::test]
    async fn test_hung_process_times_out() {
        let config = CommandConfig::default().with_timeout(Duration::from_millis(200));

        let err = run_command(Path::new("/bin/sh"), &sh("sleep 30", None), &config)
            .await
            .unwrap_err();

        assert!(matches!(err, CommandError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_missing_binary_fails_to_spawn() {
        let err = run_command(
            Path::new("/definitely/not/a/binary"),
            &sh("true", None),
            &CommandConfig::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CommandError::SpawnFailed { .. }));
    }
}
