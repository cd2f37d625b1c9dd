use crate::runner::{RunSummary, SequenceLog};
use crate::utils::logging::DebugEntry;
use serde::{Deserialize, Serialize};

/// File format of the results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One CSV file per sequence
    #[default]
    Csv,
    /// A single JSON document
    Json,
}

impl OutputFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "csv" => Some(OutputFormat::Csv),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }
}

/// Layout of the JSON result file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: String,
    pub title: String,
    pub generated_at: String,
    pub summary: RunSummary,
    pub sequences: Vec<SequenceLog>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_log: Option<Vec<DebugEntry>>,
}
