//! Writes run results to disk.

pub mod csv;
pub mod json;
pub mod types;

use crate::runner::RunLog;
use anyhow::Result;
use chrono::{DateTime, Local};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

pub use types::{OutputFormat, RunReport};

/// Longest cell value written before truncation
pub const MAX_CELL_CHARS: usize = 32_000;

const TRUNCATED_SUFFIX: &str = "... (truncated)";

/// Where and how to write results
#[derive(Debug, Clone)]
pub struct ReportTarget {
    pub folder: PathBuf,
    pub title: String,
    pub format: OutputFormat,
}

impl ReportTarget {
    /// Resolve the output folder against the config file location and create it.
    ///
    /// Falls back to the current directory when the folder cannot be created.
    pub fn resolve(
        config_path: Option<&Path>,
        folder: Option<&str>,
        title: &str,
        format: OutputFormat,
    ) -> Self {
        let requested = PathBuf::from(folder.unwrap_or("."));
        let folder = if requested.is_absolute() {
            requested
        } else {
            config_path
                .and_then(Path::parent)
                .map(|dir| dir.join(&requested))
                .unwrap_or(requested)
        };

        let folder = match std::fs::create_dir_all(&folder) {
            Ok(()) => {
                log::info!("Output folder confirmed: {}", folder.display());
                folder
            }
            Err(e) => {
                log::error!("Error creating output folder {}: {}", folder.display(), e);
                let fallback = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
                log::info!("Using fallback output folder: {}", fallback.display());
                fallback
            }
        };

        Self {
            folder,
            title: title.to_string(),
            format,
        }
    }

    /// `<title>_<YYYY-mm-dd_HH-MM-SS>`
    pub fn file_stem(&self, at: DateTime<Local>) -> String {
        format!("{}_{}", self.title, at.format("%Y-%m-%d_%H-%M-%S"))
    }
}

/// Write `run_log` and return the files created
pub fn save_results(run_log: &RunLog, target: &ReportTarget) -> Result<Vec<PathBuf>> {
    let stem = target.file_stem(Local::now());
    let written = match target.format {
        OutputFormat::Csv => csv::write(run_log, &target.folder, &stem)?,
        OutputFormat::Json => vec![json::write(run_log, &target.folder, &stem, &target.title)?],
    };
    for path in &written {
        log::info!("Results saved to: {}", path.display());
    }
    Ok(written)
}

/// Cut overly long values so spreadsheet tools accept them
pub fn truncate_cell(value: &str) -> Cow<'_, str> {
    match value.char_indices().nth(MAX_CELL_CHARS) {
        Some((cut, _)) => Cow::Owned(format!("{}{}", &value[..cut], TRUNCATED_SUFFIX)),
        None => Cow::Borrowed(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_truncate_cell() {
        assert_eq!(truncate_cell("short"), "short");
        let long = "é".repeat(MAX_CELL_CHARS + 5);
        let cut = truncate_cell(&long);
        assert!(cut.ends_with(TRUNCATED_SUFFIX));
        assert_eq!(cut.chars().count(), MAX_CELL_CHARS + TRUNCATED_SUFFIX.len());
    }

    #[test]
    fn test_folder_is_relative_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("shop.yaml");
        let target = ReportTarget::resolve(Some(&config), Some("results"), "shop", OutputFormat::Csv);
        assert_eq!(target.folder, dir.path().join("results"));
        assert!(target.folder.is_dir());

        let at = Local.with_ymd_and_hms(2024, 5, 1, 14, 5, 9).unwrap();
        assert_eq!(target.file_stem(at), "shop_2024-05-01_14-05-09");
    }
}
