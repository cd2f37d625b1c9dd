//! Rows handed to the output stage.

use crate::capture::EventRecord;
use crate::rules::ValidationOutcome;
use crate::utils::logging::DebugEntry;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Event name used for rows describing a failed step
pub const ERROR_EVENT: &str = "Error";

/// Sequence holding the row written when a run cannot start
pub const FATAL_SEQUENCE: &str = "Errors";

/// Validity marker column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Validity {
    #[serde(rename = "valid")]
    Valid,
    #[serde(rename = "invalid")]
    Invalid,
    #[serde(rename = "not validated")]
    NotValidated,
    /// Row is not an event
    #[serde(rename = "-")]
    NotApplicable,
}

impl Validity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Validity::Valid => "valid",
            Validity::Invalid => "invalid",
            Validity::NotValidated => "not validated",
            Validity::NotApplicable => "-",
        }
    }
}

impl From<&ValidationOutcome> for Validity {
    fn from(outcome: &ValidationOutcome) -> Self {
        match outcome {
            ValidationOutcome::Valid => Validity::Valid,
            ValidationOutcome::Invalid(_) => Validity::Invalid,
            ValidationOutcome::NotValidated => Validity::NotValidated,
        }
    }
}

impl std::fmt::Display for Validity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One output row: an event attributed to a step, or a step failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRow {
    pub step: String,
    pub event: String,
    pub timestamp: String,
    pub url: String,
    /// Pretty-printed payload, or the error message for failure rows
    pub payload: String,
    pub validity: Validity,
    /// JSON array of validation errors, empty when there are none
    pub errors: String,
}

impl LogRow {
    pub fn from_record(step: &str, record: &EventRecord) -> Self {
        let payload = serde_json::to_string_pretty(&record.payload)
            .unwrap_or_else(|_| record.payload.to_string());
        let errors = match record.errors() {
            Some(errors) if !errors.is_empty() => {
                serde_json::to_string(errors).unwrap_or_default()
            }
            _ => String::new(),
        };
        Self {
            step: step.to_string(),
            event: record.event_name.clone(),
            timestamp: record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            url: record.url.clone(),
            payload,
            validity: Validity::from(&record.outcome),
            errors,
        }
    }

    /// Row recording a failed step action
    pub fn error(step: &str, url: &str, message: &str, at: DateTime<Local>) -> Self {
        Self {
            step: step.to_string(),
            event: ERROR_EVENT.to_string(),
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
            url: url.to_string(),
            payload: message.to_string(),
            validity: Validity::NotApplicable,
            errors: String::new(),
        }
    }

    /// Row recording an error that stopped the whole run
    pub fn fatal(message: &str) -> Self {
        Self {
            step: "FATAL_ERROR".to_string(),
            event: "Script Error".to_string(),
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            url: String::new(),
            payload: message.to_string(),
            validity: Validity::NotApplicable,
            errors: String::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.event == ERROR_EVENT && self.validity == Validity::NotApplicable
    }
}

/// Rows of one sequence in step order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceLog {
    pub name: String,
    pub rows: Vec<LogRow>,
}

impl SequenceLog {
    pub fn count(&self, validity: Validity) -> usize {
        self.rows.iter().filter(|r| r.validity == validity).count()
    }

    pub fn error_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_error()).count()
    }
}

/// Everything a run produced, in configuration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunLog {
    pub sequences: Vec<SequenceLog>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<Vec<DebugEntry>>,
}

impl RunLog {
    /// Log containing only the fatal error that aborted the run
    pub fn fatal(message: &str) -> Self {
        Self {
            sequences: vec![SequenceLog {
                name: FATAL_SEQUENCE.to_string(),
                rows: vec![LogRow::fatal(message)],
            }],
            debug: None,
        }
    }

    pub fn sequence(&self, name: &str) -> Option<&SequenceLog> {
        self.sequences.iter().find(|s| s.name == name)
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            sequences: self.sequences.len(),
            ..RunSummary::default()
        };
        for sequence in &self.sequences {
            summary.events += sequence.rows.iter().filter(|r| !r.is_error()).count();
            summary.valid += sequence.count(Validity::Valid);
            summary.invalid += sequence.count(Validity::Invalid);
            summary.not_validated += sequence.count(Validity::NotValidated);
            summary.step_errors += sequence.error_count();
        }
        summary
    }
}

/// Totals printed at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub sequences: usize,
    pub events: usize,
    pub valid: usize,
    pub invalid: usize,
    pub not_validated: usize,
    pub step_errors: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_row_from_invalid_record() {
        let at = Local.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let record = EventRecord::at(
            "purchase",
            json!({"event": "purchase", "value": "ten"}),
            "https://shop.example/cart",
            ValidationOutcome::Invalid(vec!["value should be a float".to_string()]),
            at,
        );

        let row = LogRow::from_record("buy", &record);
        assert_eq!(row.step, "buy");
        assert_eq!(row.timestamp, "2024-05-01 09:30:00");
        assert_eq!(row.validity.as_str(), "invalid");
        assert_eq!(row.errors, r#"["value should be a float"]"#);
        assert!(row.payload.contains("\n  \"value\": \"ten\""));
    }

    #[test]
    fn test_valid_row_has_no_errors_and_summary_counts() {
        let record = EventRecord::new("page_view", json!({"event": "page_view"}), "u", ValidationOutcome::Valid);
        let log = RunLog {
            sequences: vec![SequenceLog {
                name: "main".to_string(),
                rows: vec![
                    LogRow::from_record("home", &record),
                    LogRow::error("buy", "u", "Element not found: css=a", Local::now()),
                ],
            }],
            debug: None,
        };

        assert_eq!(log.sequences[0].rows[0].errors, "");
        assert!(log.sequences[0].rows[1].is_error());
        let summary = log.summary();
        assert_eq!(summary.events, 1);
        assert_eq!(summary.valid, 1);
        assert_eq!(summary.step_errors, 1);
    }
}
