use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Local};
use gramtex_core::audit::{ChangeLog, JsonLinesSink, TIMESTAMP_FORMAT};
use gramtex_core::driver::DocumentReport;

/// `<input stem>.corrected.tex` next to the input.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "document".into(), |s| s.to_string_lossy());
    input.with_file_name(format!("{stem}.corrected.tex"))
}

/// `<progress_dir>/correction_log_<timestamp>.txt`.
#[must_use]
pub fn change_log_path(progress_dir: &Path, at: DateTime<Local>) -> PathBuf {
    progress_dir.join(format!("correction_log_{}.txt", at.format(TIMESTAMP_FORMAT)))
}

/// Creates the progress directory and opens a fresh change log in it.
///
/// # Errors
/// Returns an error if the directory or file cannot be created.
pub fn open_change_log(
    progress_dir: &Path,
) -> anyhow::Result<(PathBuf, ChangeLog<BufWriter<File>>)> {
    fs::create_dir_all(progress_dir).with_context(|| {
        format!("Could not create progress directory {}", progress_dir.display())
    })?;
    let path = change_log_path(progress_dir, Local::now());
    let file = File::create(&path)
        .with_context(|| format!("Could not create change log {}", path.display()))?;
    Ok((path, ChangeLog::new(BufWriter::new(file))))
}

/// Creates the JSON-lines event file, including missing parent directories.
///
/// # Errors
/// Returns an error if the directory or file cannot be created.
pub fn open_events(path: &Path) -> anyhow::Result<JsonLinesSink<BufWriter<File>>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Could not create directory {}", parent.display()))?;
    }
    let file = File::create(path)
        .with_context(|| format!("Could not create event log {}", path.display()))?;
    Ok(JsonLinesSink::new(BufWriter::new(file)))
}

/// Writes the corrected document.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn write_document(path: &Path, text: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Could not create directory {}", parent.display()))?;
    }
    fs::write(path, text).with_context(|| format!("Could not write {}", path.display()))
}

/// Writes the run report as pretty-printed JSON.
///
/// # Errors
/// Returns an error if serialization or the write fails.
pub fn write_report(path: &Path, report: &DocumentReport) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report).context("Could not serialize report")?;
    write_document(path, &json)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("papers/intro.tex")),
            PathBuf::from("papers/intro.corrected.tex")
        );
        assert_eq!(
            default_output_path(Path::new("notes")),
            PathBuf::from("notes.corrected.tex")
        );
    }

    #[test]
    fn test_change_log_path_uses_timestamp() {
        let at = Local.with_ymd_and_hms(2024, 10, 3, 14, 15, 2).unwrap();
        assert_eq!(
            change_log_path(Path::new("progress"), at),
            PathBuf::from("progress/correction_log_20241003_141502.txt")
        );
    }

    #[test]
    fn test_write_document_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/nested/doc.tex");

        write_document(&path, "Hello.").unwrap();

        assert_eq!(fs::read_to_string(path).unwrap(), "Hello.");
    }

    #[test]
    fn test_open_change_log_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let progress = dir.path().join("progress");

        let (path, _log) = open_change_log(&progress).unwrap();

        assert!(path.starts_with(&progress));
        assert!(path.exists());
    }
}
