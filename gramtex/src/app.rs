use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gramtex_command::{discover_command, CommandRunner};
use gramtex_core::audit::MultiSink;
use gramtex_core::completion::CompletionService;
use gramtex_core::driver::{DocumentDriver, DocumentReport, SegmentReport};
use gramtex_ollama::OllamaClient;

use crate::adapters::{CommandService, OllamaService};
use crate::cli::{Backend, BackendArgs, CorrectArgs, SegmentArgs};
use crate::errors::AppError;
use crate::output;

/// Files written by a `correct` run.
#[derive(Debug)]
pub struct CorrectOutcome {
    /// The pipeline report.
    pub report: DocumentReport,
    /// Corrected document.
    pub output_path: PathBuf,
    /// Human-readable change log.
    pub change_log_path: PathBuf,
    /// JSON report, when requested.
    pub report_path: Option<PathBuf>,
    /// JSON-lines event log, when requested.
    pub events_path: Option<PathBuf>,
}

/// Builds the completion backend selected on the command line.
///
/// # Errors
/// Returns an error if the backend cannot be configured or located.
pub fn build_service(args: &BackendArgs) -> Result<Arc<dyn CompletionService>, AppError> {
    match args.backend {
        Backend::Ollama => {
            let client = OllamaClient::new(args.ollama_config())?;
            tracing::info!(host = %client.config().host, model = %client.config().model, "Using Ollama backend");
            Ok(Arc::new(OllamaService::new(client)))
        }
        Backend::Command => {
            let path = discover_command(args.command.clone())?;
            let config = args.command_config();
            tracing::info!(command = %path.display(), args = ?config.args, "Using command backend");
            Ok(Arc::new(CommandService::new(CommandRunner::new(path), config)))
        }
    }
}

/// Runs `gramtex correct`.
///
/// # Errors
/// Returns an error if the input cannot be read, the backend fails, or an
/// output file cannot be written.
pub async fn correct(args: &CorrectArgs) -> Result<CorrectOutcome, AppError> {
    let document = read_input(&args.input)?;
    let service = build_service(&args.backend)?;

    let (change_log_path, change_log) = output::open_change_log(&args.progress_dir)?;
    tracing::info!(path = %change_log_path.display(), "Writing change log");

    let mut sinks = MultiSink::new().with(Box::new(change_log));
    if let Some(ref path) = args.events {
        sinks = sinks.with(Box::new(output::open_events(path)?));
        tracing::info!(path = %path.display(), "Writing event log");
    }

    let mut driver =
        DocumentDriver::new(service, args.pipeline.pipeline_config()).with_sink(Box::new(sinks));
    let report = driver.run(&document).await?;

    let corrected = if args.preserve_layout {
        report.assemble_preserving_layout()
    } else {
        report.assemble()
    };

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| output::default_output_path(&args.input));
    output::write_document(&output_path, &corrected)?;
    tracing::info!(path = %output_path.display(), "Corrected document written");

    if let Some(ref path) = args.report {
        output::write_report(path, &report)?;
        tracing::info!(path = %path.display(), "Run report written");
    }

    Ok(CorrectOutcome {
        report,
        output_path,
        change_log_path,
        report_path: args.report.clone(),
        events_path: args.events.clone(),
    })
}

/// Runs `gramtex segment`, writing one JSON object per sentence to `out`.
///
/// # Errors
/// Returns an error if the input cannot be read, the backend fails, or `out`
/// cannot be written.
pub async fn segment<W: Write>(
    args: &SegmentArgs,
    out: &mut W,
) -> Result<Vec<SegmentReport>, AppError> {
    let document = read_input(&args.input)?;
    let service = build_service(&args.backend)?;

    let driver = DocumentDriver::new(service, args.pipeline.pipeline_config());
    let segments = driver.segment_document(&document).await?;

    for segment in &segments {
        serde_json::to_writer(&mut *out, segment)?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(segments)
}

/// Runs `gramtex check` and returns a one-line description of the backend.
///
/// # Errors
/// Returns an error if the backend is unreachable or misconfigured.
pub async fn check(args: &BackendArgs) -> Result<String, AppError> {
    match args.backend {
        Backend::Ollama => {
            let client = OllamaClient::new(args.ollama_config())?;
            let info = client.check_health().await?;
            Ok(format!(
                "Ollama {} at {} (structured outputs: {})",
                info.version,
                client.config().host,
                if info.structured_outputs { "yes" } else { "no" }
            ))
        }
        Backend::Command => {
            let path = discover_command(args.command.clone())?;
            let version = CommandRunner::new(path.clone()).check_health().await?;
            Ok(format!("{} ({version})", path.display()))
        }
    }
}

fn read_input(path: &Path) -> Result<String, AppError> {
    std::fs::read_to_string(path).map_err(|source| AppError::Read {
        path: path.to_path_buf(),
        source,
    })
}
