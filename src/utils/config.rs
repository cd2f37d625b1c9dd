use std::time::Duration;

/// Default timeout for element and page-load waits (seconds)
pub const DEFAULT_TIMEOUT_SECS: f64 = 10.0;

/// Default pause after each step and between clicks (seconds)
pub const DEFAULT_DELAY_SECS: f64 = 1.0;

/// Name of the page's event buffer
pub const DEFAULT_DATA_LAYER: &str = "dataLayer";

/// Polling behaviour of the background monitor
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Pause between polling cycles
    pub poll_interval: Duration,

    /// Cycles skipped after a failed cycle
    pub cooldown_cycles: u32,

    /// Pause for each skipped cycle while cooling down or the browser is unreachable
    pub cooldown_interval: Duration,

    /// Global variable holding the event buffer
    pub data_layer: String,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            cooldown_cycles: 10,
            cooldown_interval: Duration::from_millis(500),
            data_layer: DEFAULT_DATA_LAYER.to_string(),
        }
    }
}

/// Candidate selection behaviour of the element resolver
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// How long to wait for the first match
    pub presence_timeout: Duration,

    /// Short wait for "visible and enabled" on the picked candidate
    pub final_check_timeout: Duration,

    /// Pause after scrolling a candidate into view
    pub settle_pause: Duration,

    pub poll_interval: Duration,

    /// Random picks before giving up
    pub max_attempts: usize,

    /// Above this many sized matches the selector is reported as too broad
    pub broad_match_threshold: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            presence_timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS),
            final_check_timeout: Duration::from_secs(3),
            settle_pause: Duration::from_millis(500),
            poll_interval: Duration::from_millis(100),
            max_attempts: 5,
            broad_match_threshold: 50,
        }
    }
}

impl ResolverSettings {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            presence_timeout: timeout,
            ..Self::default()
        }
    }
}

/// Timing used by the step sequencer
#[derive(Debug, Clone)]
pub struct SequencerSettings {
    /// Page-load wait after navigation
    pub page_load_timeout: Duration,

    /// Pause letting scroll animations finish
    pub scroll_settle: Duration,
}

impl Default for SequencerSettings {
    fn default() -> Self {
        Self {
            page_load_timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS),
            scroll_settle: Duration::from_secs(1),
        }
    }
}

/// All runtime settings for one run
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub monitor: MonitorSettings,
    pub resolver: ResolverSettings,
    pub sequencer: SequencerSettings,
}

impl Settings {
    /// Settings derived from the configured timeout and buffer name
    pub fn from_options(default_timeout: Duration, data_layer: &str) -> Self {
        Self {
            monitor: MonitorSettings {
                data_layer: data_layer.to_string(),
                ..MonitorSettings::default()
            },
            resolver: ResolverSettings::with_timeout(default_timeout),
            sequencer: SequencerSettings {
                page_load_timeout: default_timeout,
                ..SequencerSettings::default()
            },
        }
    }
}
