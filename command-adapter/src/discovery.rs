//! Locates the model CLI binary on the host system.

use crate::error::CommandError;
use std::path::PathBuf;
use which::which;

/// Environment variable that overrides the default model CLI path.
pub const COMMAND_BIN_ENV_VAR: &str = "GRAMTEX_COMMAND_BIN";

/// Program looked up on `$PATH` when nothing else is configured.
pub const DEFAULT_PROGRAM: &str = "ollama";

/// Locates the model CLI executable.
///
/// Resolution order:
/// 1. `explicit_path` if provided and the file exists.
/// 2. The path in the `GRAMTEX_COMMAND_BIN` environment variable.
/// 3. `ollama` resolved via `$PATH`.
/// 4. Common install location fallbacks (platform-specific).
///
/// # Errors
///
/// Returns `CommandError::ExecutableNotFound` when no valid executable can be
/// located.
pub fn discover_command(explicit_path: Option<PathBuf>) -> Result<PathBuf, CommandError> {
    if let Some(path) = explicit_path {
        if path.exists() {
            return Ok(path);
        }
        // Bare program names go through PATH.
        if path.components().count() == 1 {
            if let Ok(resolved) = which(&path) {
                return Ok(resolved);
            }
        }
        return Err(CommandError::ExecutableNotFound(format!(
            "Explicit path does not exist: {}",
            path.display()
        )));
    }

    if let Ok(path_str) = std::env::var(COMMAND_BIN_ENV_VAR) {
        let path = PathBuf::from(path_str);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(
            event = "command_env_missing",
            var = COMMAND_BIN_ENV_VAR,
            path = %path.display(),
            "command_env_missing"
        );
    }

    if let Ok(path) = which(DEFAULT_PROGRAM) {
        return Ok(path);
    }

    for location in fallback_locations() {
        if location.exists() {
            return Ok(location);
        }
    }

    Err(CommandError::ExecutableNotFound(format!(
        "{DEFAULT_PROGRAM} not found. Install it from https://ollama.com/download \
         or pass --command / set {COMMAND_BIN_ENV_VAR}.\n\
         Searched: PATH, common install locations."
    )))
}

#[cfg(unix)]
fn fallback_locations() -> Vec<PathBuf> {
    let mut locations = Vec::new();
    if let Some(home) = dirs::home_dir() {
        locations.push(home.join(".local/bin/ollama"));
    }
    locations.push(PathBuf::from("/usr/local/bin/ollama"));
    locations.push(PathBuf::from("/usr/bin/ollama"));
    locations.push(PathBuf::from("/opt/homebrew/bin/ollama"));
    locations
}

#[cfg(windows)]
fn fallback_locations() -> Vec<PathBuf> {
    let mut locations = Vec::new();
    if let Some(local) = dirs::data_local_dir() {
        locations.push(local.join("Programs/Ollama/ollama.exe"));
    }
    locations
}
