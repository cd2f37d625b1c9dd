//! Console logging through env_logger, plus an optional in-memory copy for the debug log.

use chrono::Local;
use log::{Level, LevelFilter, Log, Metadata, Record};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// One captured log line: timestamp, level and message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebugEntry {
    pub timestamp: String,
    pub level: String,
    pub message: String,
}

/// Shared buffer of debug entries
#[derive(Debug, Clone, Default)]
pub struct DebugLog {
    entries: Arc<Mutex<Vec<DebugEntry>>>,
}

impl DebugLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, level: Level, message: String) {
        let entry = DebugEntry {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            level: level.to_string(),
            message,
        };
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }

    pub fn entries(&self) -> Vec<DebugEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct CollectingLogger {
    console: env_logger::Logger,
    collector: Option<DebugLog>,
}

impl CollectingLogger {
    fn collects(&self, metadata: &Metadata) -> bool {
        self.collector.is_some()
            && metadata.level() <= Level::Debug
            && metadata.target().starts_with(env!("CARGO_CRATE_NAME"))
    }
}

impl Log for CollectingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.console.enabled(metadata) || self.collects(metadata)
    }

    fn log(&self, record: &Record) {
        if self.collects(record.metadata()) {
            if let Some(ref collector) = self.collector {
                collector.push(record.level(), record.args().to_string());
            }
        }
        if self.console.matches(record) {
            self.console.log(record);
        }
    }

    fn flush(&self) {
        self.console.flush();
    }
}

/// Install the global logger. `RUST_LOG` controls console output (default `info`).
///
/// With `debug` set, every message from this crate is also kept and returned
/// so it can be written next to the results.
pub fn init(debug: bool) -> Option<DebugLog> {
    let console = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .build();

    let collector = debug.then(DebugLog::new);
    let max_level = if debug {
        console.filter().max(LevelFilter::Debug)
    } else {
        console.filter()
    };

    let logger = CollectingLogger {
        console,
        collector: collector.clone(),
    };
    if log::set_boxed_logger(Box::new(logger)).is_ok() {
        log::set_max_level(max_level);
    }
    collector
}
