use super::truncate_cell;
use crate::runner::{RunLog, SequenceLog};
use crate::utils::logging::DebugEntry;
use anyhow::{Context, Result};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

const SEQUENCE_HEADERS: [&str; 7] = [
    "Step",
    "Event",
    "Timestamp",
    "URL",
    "Event Data",
    "Validity",
    "Errors",
];

const DEBUG_HEADERS: [&str; 3] = ["Timestamp", "Level", "Message"];

/// Write one CSV file per sequence, plus the debug log when present
pub fn write(run_log: &RunLog, folder: &Path, stem: &str) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(run_log.sequences.len() + 1);

    for sequence in &run_log.sequences {
        let path = folder.join(format!("{}_{}.csv", stem, file_safe(&sequence.name)));
        write_sequence(sequence, &path)?;
        written.push(path);
    }

    if let Some(ref entries) = run_log.debug {
        let path = folder.join(format!("{}_debug_log.csv", stem));
        write_debug_log(entries, &path)?;
        written.push(path);
    }

    Ok(written)
}

fn write_sequence(sequence: &SequenceLog, path: &Path) -> Result<()> {
    let mut writer = ::csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(SEQUENCE_HEADERS)?;
    for row in &sequence.rows {
        let cells: [Cow<'_, str>; 7] = [
            truncate_cell(&row.step),
            truncate_cell(&row.event),
            truncate_cell(&row.timestamp),
            truncate_cell(&row.url),
            truncate_cell(&row.payload),
            Cow::Borrowed(row.validity.as_str()),
            truncate_cell(&row.errors),
        ];
        writer.write_record(cells.iter().map(|c| c.as_bytes()))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_debug_log(entries: &[DebugEntry], path: &Path) -> Result<()> {
    let mut writer = ::csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(DEBUG_HEADERS)?;
    for entry in entries {
        writer.write_record([
            escape_formula(&entry.timestamp),
            escape_formula(&entry.level),
            escape_formula(&entry.message),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Keep spreadsheet tools from reading a log message as a formula
fn escape_formula(value: &str) -> String {
    let value = truncate_cell(value);
    if value.starts_with(['=', '+', '-', '@', '\t']) {
        format!("'{}", value)
    } else {
        value.into_owned()
    }
}

fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{LogRow, Validity};

    fn sample_log() -> RunLog {
        RunLog {
            sequences: vec![SequenceLog {
                name: "check out".to_string(),
                rows: vec![LogRow {
                    step: "buy".to_string(),
                    event: "purchase".to_string(),
                    timestamp: "2024-05-01 09:30:00".to_string(),
                    url: "https://shop.example/".to_string(),
                    payload: "{\n  \"value\": \"ten\"\n}".to_string(),
                    validity: Validity::Invalid,
                    errors: r#"["value should be a float"]"#.to_string(),
                }],
            }],
            debug: Some(vec![DebugEntry {
                timestamp: "2024-05-01 09:30:00".to_string(),
                level: "INFO".to_string(),
                message: "=== Starting step: buy ===".to_string(),
            }]),
        }
    }

    #[test]
    fn test_writes_sequence_and_debug_files() {
        let dir = tempfile::tempdir().unwrap();
        let files = write(&sample_log(), dir.path(), "shop_2024").unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("shop_2024_check_out.csv"));
        assert!(files[1].ends_with("shop_2024_debug_log.csv"));

        let mut reader = ::csv::Reader::from_path(&files[0]).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), 7);
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[1], "purchase");
        assert_eq!(&record[4], "{\n  \"value\": \"ten\"\n}");
        assert_eq!(&record[5], "invalid");

        let mut reader = ::csv::Reader::from_path(&files[1]).unwrap();
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[2], "'=== Starting step: buy ===");
    }

    #[test]
    fn test_escape_formula() {
        assert_eq!(escape_formula("-1 retries"), "'-1 retries");
        assert_eq!(escape_formula("plain"), "plain");
    }
}
