use super::types::RunReport;
use crate::runner::RunLog;
use anyhow::{Context, Result};
use chrono::Local;
use std::path::{Path, PathBuf};

/// Write the whole run as one JSON document
pub fn write(run_log: &RunLog, folder: &Path, stem: &str, title: &str) -> Result<PathBuf> {
    let report = RunReport {
        run_id: uuid::Uuid::new_v4().to_string(),
        title: title.to_string(),
        generated_at: Local::now().to_rfc3339(),
        summary: run_log.summary(),
        sequences: run_log.sequences.clone(),
        debug_log: run_log.debug.clone(),
    };

    let json = serde_json::to_string_pretty(&report)?;
    let path = folder.join(format!("{}.json", stem));
    std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{LogRow, SequenceLog, Validity};

    #[test]
    fn test_json_report_layout() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog {
            sequences: vec![SequenceLog {
                name: "main".to_string(),
                rows: vec![LogRow {
                    step: "home".to_string(),
                    event: "page_view".to_string(),
                    timestamp: "2024-05-01 09:30:00".to_string(),
                    url: "https://shop.example/".to_string(),
                    payload: "{}".to_string(),
                    validity: Validity::NotValidated,
                    errors: String::new(),
                }],
            }],
            debug: None,
        };

        let path = write(&log, dir.path(), "shop_2024", "shop").unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["title"], "shop");
        assert_eq!(value["summary"]["notValidated"], 1);
        assert_eq!(value["sequences"][0]["rows"][0]["validity"], "not validated");
        assert!(value.get("debugLog").is_none());

        let back: RunReport = serde_json::from_value(value).unwrap();
        assert_eq!(back.sequences, log.sequences);
    }
}
