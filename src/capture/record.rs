use crate::rules::ValidationOutcome;
use chrono::{DateTime, Local};
use serde_json::Value;

/// A captured event on its way from the monitor to the sequencer
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub event_name: String,
    /// Sanitized event payload
    pub payload: Value,
    pub timestamp: DateTime<Local>,
    /// Page URL the event is attributed to
    pub url: String,
    pub outcome: ValidationOutcome,
}

impl EventRecord {
    pub fn new(
        event_name: impl Into<String>,
        payload: Value,
        url: impl Into<String>,
        outcome: ValidationOutcome,
    ) -> Self {
        Self::at(event_name, payload, url, outcome, Local::now())
    }

    pub fn at(
        event_name: impl Into<String>,
        payload: Value,
        url: impl Into<String>,
        outcome: ValidationOutcome,
        timestamp: DateTime<Local>,
    ) -> Self {
        Self {
            event_name: event_name.into(),
            payload,
            timestamp,
            url: url.into(),
            outcome,
        }
    }

    pub fn errors(&self) -> Option<&[String]> {
        self.outcome.errors()
    }
}
