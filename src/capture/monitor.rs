//! Background task that polls the page's event buffer and enqueues new events.

use super::queue::{EventSender, StopSignal};
use super::record::EventRecord;
use super::sanitize::{content_identity, sanitize};
use crate::driver::BrowserDriver;
use crate::rules::{ValidationOutcome, Validator};
use crate::utils::config::MonitorSettings;
use crate::utils::errors::clean_error_message;
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Comment embedded in the snapshot script so it can be recognised in traces
pub const SNAPSHOT_MARKER: &str = "/*dlt:snapshot*/";

/// URL used for attribution before any real page has loaded
pub const INITIAL_URL_PLACEHOLDER: &str = "Initializing page";

/// Build the script returning a JSON-safe copy of the event buffer.
///
/// Functions, symbols and other values without a JSON form become
/// `{"__opaque__": text}`, DOM nodes become driver references; both are
/// resolved by the sanitizer.
pub fn snapshot_script(buffer_name: &str) -> String {
    let name = Value::String(buffer_name.to_string()).to_string();
    format!(
        r#"(() => {{ {marker}
    const buffer = window[{name}];
    if (buffer === undefined || buffer === null) return [];
    if (!Array.isArray(buffer)) return typeof buffer;
    const path = new WeakSet();
    const clone = (v, depth) => {{
        if (v === null || typeof v === 'string' || typeof v === 'boolean') return v;
        if (typeof v === 'number') return Number.isFinite(v) ? v : String(v);
        if (typeof v === 'undefined') return null;
        if (typeof v !== 'object') return {{ __opaque__: String(v) }};
        if (typeof Node !== 'undefined' && v instanceof Node) return {{ __driver_ref__: v.nodeName }};
        if (v instanceof Date) return v.toISOString();
        if (depth > 32 || path.has(v)) return {{ __opaque__: '[Circular]' }};
        path.add(v);
        let out;
        if (Array.isArray(v)) {{
            out = v.map(x => clone(x, depth + 1));
        }} else {{
            out = {{}};
            for (const k of Object.keys(v)) {{
                try {{ out[k] = clone(v[k], depth + 1); }} catch (e) {{ out[k] = {{ __opaque__: String(e) }}; }}
            }}
        }}
        path.delete(v);
        return out;
    }};
    return buffer.map(item => clone(item, 0));
}})()"#,
        marker = SNAPSHOT_MARKER,
        name = name
    )
}

/// `data:` and `about:` pages appear while navigating and carry no real location
pub fn is_transitional_url(url: &str) -> bool {
    url.is_empty() || url.starts_with("data:") || url.starts_with("about:")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Running,
    Stopped,
}

/// Counters reported when the monitor stops
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorStats {
    /// Cycles that read the page
    pub cycles: u64,
    /// Cycles skipped for cooldown or an unreachable browser
    pub skipped_cycles: u64,
    pub enqueued: u64,
    /// Snapshot items already enqueued earlier in the sequence
    pub duplicates: u64,
    /// Items excluded by the track filter
    pub filtered: u64,
    pub cycle_errors: u64,
    pub event_errors: u64,
}

pub struct Monitor {
    driver: Arc<dyn BrowserDriver>,
    sender: EventSender,
    validator: Validator,
    settings: MonitorSettings,
    script: String,
    track_filter: Option<HashSet<String>>,
    fallback_url: String,
    last_url: Option<String>,
    /// Identities of events already enqueued during this sequence
    seen: HashSet<String>,
    cooldown: u32,
    stats: MonitorStats,
}

impl Monitor {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        sender: EventSender,
        validator: Validator,
        settings: MonitorSettings,
    ) -> Self {
        let script = snapshot_script(&settings.data_layer);
        Self {
            driver,
            sender,
            validator,
            settings,
            script,
            track_filter: None,
            fallback_url: INITIAL_URL_PLACEHOLDER.to_string(),
            last_url: None,
            seen: HashSet::new(),
            cooldown: 0,
            stats: MonitorStats::default(),
        }
    }

    /// Only enqueue events whose name is listed. `None` tracks everything.
    pub fn with_track_filter(mut self, names: Option<&[String]>) -> Self {
        self.track_filter = names.map(|n| n.iter().cloned().collect());
        self
    }

    /// URL attributed to events captured before any real page loaded
    pub fn with_fallback_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url {
            self.fallback_url = url;
        }
        self
    }

    pub fn stats(&self) -> &MonitorStats {
        &self.stats
    }

    /// Start polling on a background task.
    pub fn spawn(self, stop: StopSignal) -> MonitorHandle {
        let task = tokio::spawn(self.run(stop.clone()));
        MonitorHandle { stop, task }
    }

    pub async fn run(mut self, mut stop: StopSignal) -> MonitorStats {
        log::debug!("Monitor started for '{}'", self.settings.data_layer);
        loop {
            let pause = match self.tick(&stop).await {
                (MonitorState::Running, pause) => pause,
                (MonitorState::Stopped, _) => break,
            };
            tokio::select! {
                _ = stop.stopped() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }
        log::debug!(
            "Monitor stopped: {} cycles, {} events enqueued, {} cycle errors",
            self.stats.cycles,
            self.stats.enqueued,
            self.stats.cycle_errors
        );
        self.stats
    }

    /// Run one polling cycle and report the next state and the pause before the next one.
    pub async fn tick(&mut self, stop: &StopSignal) -> (MonitorState, Duration) {
        if stop.is_stopped() || self.sender.is_closed() {
            return (MonitorState::Stopped, Duration::ZERO);
        }

        if self.cooldown > 0 || !self.driver.is_alive().await {
            self.cooldown = self.cooldown.saturating_sub(1);
            self.stats.skipped_cycles += 1;
            return (MonitorState::Running, self.settings.cooldown_interval);
        }

        self.stats.cycles += 1;
        if let Err(e) = self.poll().await {
            log::error!("Error in monitoring task: {}", clean_error_message(&e));
            self.stats.cycle_errors += 1;
            self.cooldown = self.settings.cooldown_cycles;
        }
        (MonitorState::Running, self.settings.poll_interval)
    }

    async fn poll(&mut self) -> Result<()> {
        let url = self
            .driver
            .current_url()
            .await
            .context("Failed to read page URL")?;
        if !is_transitional_url(&url) {
            self.last_url = Some(url);
        }
        let attributed = self
            .last_url
            .clone()
            .unwrap_or_else(|| self.fallback_url.clone());

        let buffer = self
            .driver
            .evaluate(&self.script)
            .await
            .context("Failed to read the event buffer")?;

        let items = match buffer {
            Value::Array(items) => items,
            other => {
                log::warn!(
                    "Warning: {} is not a list (found {})",
                    self.settings.data_layer,
                    other
                );
                return Ok(());
            }
        };

        for item in &items {
            if let Err(e) = self.process_item(item, &attributed) {
                log::error!("Error processing event: {}", clean_error_message(&e));
                self.stats.event_errors += 1;
            }
        }
        Ok(())
    }

    fn process_item(&mut self, item: &Value, url: &str) -> Result<()> {
        let name = match item.get("event").and_then(Value::as_str) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Ok(()),
        };

        let payload = sanitize(item);
        let identity = content_identity(&name, &payload);
        if self.seen.contains(&identity) {
            self.stats.duplicates += 1;
            return Ok(());
        }
        if let Some(ref filter) = self.track_filter {
            if !filter.contains(&name) {
                self.stats.filtered += 1;
                return Ok(());
            }
        }

        let outcome = self.validator.validate_event(&name, &payload);
        match outcome {
            ValidationOutcome::Valid => log::info!("Valid event: {}", name),
            ValidationOutcome::Invalid(ref errors) => {
                log::error!("Invalid event: {} - Errors: {:?}", name, errors)
            }
            ValidationOutcome::NotValidated => log::info!("Captured event: {}", name),
        }

        let record = EventRecord::new(name, payload, url, outcome);
        self.sender
            .send(record)
            .map_err(|r| anyhow::anyhow!("queue closed, dropped event '{}'", r.event_name))?;
        self.seen.insert(identity);
        self.stats.enqueued += 1;
        Ok(())
    }
}

/// Running monitor task plus the signal that stops it
pub struct MonitorHandle {
    stop: StopSignal,
    task: JoinHandle<MonitorStats>,
}

impl MonitorHandle {
    /// Signal the monitor and wait for its final cycle to finish.
    pub async fn stop(self) -> MonitorStats {
        self.stop.stop();
        match self.task.await {
            Ok(stats) => stats,
            Err(e) => {
                log::error!("Monitor task ended abnormally: {}", e);
                MonitorStats::default()
            }
        }
    }
}
