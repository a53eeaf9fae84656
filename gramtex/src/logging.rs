use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use gramtex_core::audit::TIMESTAMP_FORMAT;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::errors::AppError;

/// Filter for the log file: everything from this workspace at debug,
/// dependencies at info.
const FILE_FILTER: &str =
    "info,gramtex=debug,gramtex_core=debug,gramtex_ollama=debug,gramtex_command=debug";

/// Installs the global subscriber.
///
/// The console layer writes to stderr (stdout is reserved for command
/// output) at `RUST_LOG` if set, otherwise `level`. With `log_dir`, a second
/// plain-text layer writes `gramtex_<timestamp>.log` there.
///
/// # Errors
/// Returns an error if the filter is invalid, the log file cannot be
/// created, or a subscriber is already installed.
pub fn init(level: &str, log_dir: Option<&Path>) -> Result<Option<PathBuf>, AppError> {
    let console_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| AppError::Logging(format!("invalid log level '{level}': {e}")))?,
    };

    let console = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let (file_layer, log_path) = match log_dir {
        Some(dir) => {
            let (file, path) = create_log_file(dir)?;
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .with_filter(EnvFilter::new(FILE_FILTER));
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))?;

    if let Some(ref path) = log_path {
        tracing::info!(path = %path.display(), "Logging to file");
    }
    Ok(log_path)
}

fn create_log_file(dir: &Path) -> Result<(File, PathBuf), AppError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("gramtex_{}.log", Local::now().format(TIMESTAMP_FORMAT)));
    let file = File::create(&path)?;
    Ok((file, path))
}
