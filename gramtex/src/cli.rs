use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use gramtex_command::{CommandConfig, COMMAND_BIN_ENV_VAR};
use gramtex_core::config::{CorrectionConfig, PipelineConfig, SegmentationConfig};
use gramtex_ollama::OllamaConfig;

/// Command-line interface of the `gramtex` binary.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Console log level (`RUST_LOG` takes precedence when set).
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Directory for a per-run debug log file `gramtex_<timestamp>.log`.
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Correct the grammar of a LaTeX document sentence by sentence.
    Correct(CorrectArgs),
    /// Only split a document into sentences and print them as JSON lines.
    Segment(SegmentArgs),
    /// Check that the selected backend is reachable.
    Check(BackendArgs),
}

/// Arguments of `gramtex correct`.
#[derive(Debug, Args)]
pub struct CorrectArgs {
    /// LaTeX document to correct.
    pub input: PathBuf,

    /// Output path (default: `<input stem>.corrected.tex` next to the input).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory receiving the change log.
    #[arg(long, default_value = "progress")]
    pub progress_dir: PathBuf,

    /// Also write the full run report as JSON.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Stream begin/sentence/finish events as JSON lines while the run progresses.
    #[arg(long)]
    pub events: Option<PathBuf>,

    /// Keep the source whitespace layout instead of joining sentences with spaces.
    #[arg(long)]
    pub preserve_layout: bool,

    /// Backend selection.
    #[command(flatten)]
    pub backend: BackendArgs,

    /// Retry budgets.
    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

/// Arguments of `gramtex segment`.
#[derive(Debug, Args)]
pub struct SegmentArgs {
    /// LaTeX document to segment.
    pub input: PathBuf,

    /// Backend selection.
    #[command(flatten)]
    pub backend: BackendArgs,

    /// Retry budgets.
    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

/// Which completion backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Ollama HTTP API.
    Ollama,
    /// A local model CLI run once per request.
    Command,
}

/// Backend options shared by every subcommand.
#[derive(Debug, Args)]
pub struct BackendArgs {
    /// Completion backend.
    #[arg(long, value_enum, default_value_t = Backend::Ollama)]
    pub backend: Backend,

    /// Model name.
    #[arg(long, default_value = gramtex_ollama::DEFAULT_MODEL)]
    pub model: String,

    /// Ollama server URL.
    #[arg(long, env = "OLLAMA_HOST", default_value = gramtex_ollama::DEFAULT_HOST)]
    pub host: String,

    /// Model CLI for the command backend (default: `ollama` on PATH).
    #[arg(long, env = COMMAND_BIN_ENV_VAR)]
    pub command: Option<PathBuf>,

    /// Argument passed to the model CLI before the prompt (repeatable;
    /// default: `run <model>`).
    #[arg(long = "command-arg", allow_hyphen_values = true)]
    pub command_args: Vec<String>,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 300)]
    pub timeout_secs: u64,
}

impl BackendArgs {
    /// Ollama client settings.
    #[must_use]
    pub fn ollama_config(&self) -> OllamaConfig {
        OllamaConfig::default()
            .with_host(normalize_host(&self.host))
            .with_model(self.model.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }

    /// Model CLI settings.
    #[must_use]
    pub fn command_config(&self) -> CommandConfig {
        let args = if self.command_args.is_empty() {
            vec!["run".to_string(), self.model.clone()]
        } else {
            self.command_args.clone()
        };
        CommandConfig::default()
            .with_args(args)
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

/// Accepts `OLLAMA_HOST` values without a scheme, e.g. `127.0.0.1:11434`.
fn normalize_host(host: &str) -> String {
    let host = host.trim();
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

/// Retry budgets and thresholds.
#[derive(Debug, Args)]
pub struct PipelineArgs {
    /// First extraction window, in characters.
    #[arg(long, default_value_t = 500)]
    pub initial_bound: usize,

    /// Window growth per failed boundary check.
    #[arg(long, default_value_t = 200)]
    pub bound_step: usize,

    /// Extraction attempts per sentence.
    #[arg(long, default_value_t = 5)]
    pub max_segment_attempts: usize,

    /// Correction proposals per sentence.
    #[arg(long, default_value_t = 5)]
    pub max_attempts: usize,

    /// QA calls per proposal while QA output is malformed.
    #[arg(long, default_value_t = 5)]
    pub max_qa_attempts: usize,

    /// Proposals at or below this confidence skip QA.
    #[arg(long, default_value_t = 0.5)]
    pub confidence_threshold: f64,
}

impl PipelineArgs {
    /// Pipeline configuration.
    #[must_use]
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::default()
            .with_segmentation(
                SegmentationConfig::default()
                    .with_initial_bound(self.initial_bound)
                    .with_bound_step(self.bound_step)
                    .with_max_attempts(self.max_segment_attempts),
            )
            .with_correction(
                CorrectionConfig::default()
                    .with_max_attempts(self.max_attempts)
                    .with_max_qa_attempts(self.max_qa_attempts)
                    .with_confidence_threshold(self.confidence_threshold),
            )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_correct_defaults() {
        let cli = Cli::try_parse_from(["gramtex", "correct", "paper.tex", "--host", "http://h:1"]).unwrap();
        let Commands::Correct(args) = cli.command else {
            panic!("expected correct");
        };

        assert_eq!(args.input, PathBuf::from("paper.tex"));
        assert_eq!(args.progress_dir, PathBuf::from("progress"));
        assert!(args.events.is_none());
        assert_eq!(args.backend.backend, Backend::Ollama);
        assert_eq!(args.backend.model, "llama3.1");
        assert_eq!(args.pipeline.pipeline_config(), PipelineConfig::default());
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_command_backend_defaults_to_run_model() {
        let cli = Cli::try_parse_from([
            "gramtex", "check", "--backend", "command", "--model", "mistral",
        ])
        .unwrap();
        let Commands::Check(args) = cli.command else {
            panic!("expected check");
        };

        assert_eq!(args.command_config().args, vec!["run", "mistral"]);
    }

    #[test]
    fn test_command_args_override_and_accept_hyphens() {
        let cli = Cli::try_parse_from([
            "gramtex", "check", "--backend", "command",
            "--command-arg", "-m", "--command-arg", "model.gguf",
        ])
        .unwrap();
        let Commands::Check(args) = cli.command else {
            panic!("expected check");
        };

        assert_eq!(args.command_config().args, vec!["-m", "model.gguf"]);
    }

    #[test]
    fn test_host_without_scheme_is_normalized() {
        assert_eq!(normalize_host("127.0.0.1:11434"), "http://127.0.0.1:11434");
        assert_eq!(normalize_host("https://gpu:443"), "https://gpu:443");
    }

    #[test]
    fn test_budget_flags_reach_pipeline_config() {
        let cli = Cli::try_parse_from([
            "gramtex", "correct", "a.tex", "--max-attempts", "2",
            "--confidence-threshold", "0.8", "--initial-bound", "300",
        ])
        .unwrap();
        let Commands::Correct(args) = cli.command else {
            panic!("expected correct");
        };
        let config = args.pipeline.pipeline_config();

        assert_eq!(config.correction.max_attempts, 2);
        assert!((config.correction.confidence_threshold - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.segmentation.initial_bound, 300);
    }
}
