use crate::driver::Locator;
use crate::report::OutputFormat;
use crate::utils::config::{DEFAULT_DATA_LAYER, DEFAULT_DELAY_SECS, DEFAULT_TIMEOUT_SECS};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

/// Options from the `config` section
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalOptions {
    /// Base name of the result files
    pub title: String,

    /// Element presence and page-load timeout
    pub default_timeout: Duration,

    /// Pause after each step and between clicks
    pub default_delay: Duration,

    /// Event names to capture. `None` captures everything.
    pub track_events: Option<Vec<String>>,

    pub debug_mode: bool,

    pub user_agents: Vec<String>,

    /// Append an automation marker to the user agent
    pub include_automation_info: bool,

    /// Append `bot=true` to visited URLs
    pub bot_info: bool,

    /// Selectors hidden with injected CSS before every step
    pub css_elements_to_hide: Vec<String>,

    /// Result folder, relative to the config file unless absolute
    pub output_folder: Option<String>,

    pub output_format: OutputFormat,

    /// Global variable holding the page's event buffer
    pub data_layer: String,

    /// Browser engine name: "chromium", "firefox" or "webkit"
    pub browser: Option<String>,

    pub headless: Option<bool>,
}

impl Default for GlobalOptions {
    fn default() -> Self {
        Self {
            title: "datalayer".to_string(),
            default_timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS),
            default_delay: Duration::from_secs_f64(DEFAULT_DELAY_SECS),
            track_events: None,
            debug_mode: false,
            user_agents: Vec::new(),
            include_automation_info: false,
            bot_info: false,
            css_elements_to_hide: Vec::new(),
            output_folder: None,
            output_format: OutputFormat::default(),
            data_layer: DEFAULT_DATA_LAYER.to_string(),
            browser: None,
            headless: None,
        }
    }
}

/// One element to click
#[derive(Debug, Clone, PartialEq)]
pub struct ClickTarget {
    pub locator: Locator,
    /// Pause before the next click, overriding the default delay
    pub delay_after: Option<Duration>,
}

/// One form input and the text typed into it
#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub locator: Locator,
    pub value: String,
}

/// How a form is submitted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubmitMethod {
    #[default]
    Click,
    Enter,
}

impl SubmitMethod {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "click" => Some(SubmitMethod::Click),
            "enter" => Some(SubmitMethod::Enter),
            _ => None,
        }
    }
}

/// Where a scroll step goes
#[derive(Debug, Clone, PartialEq)]
pub enum ScrollTarget {
    Element(Locator),
    /// Scroll down by this many pixels
    Pixels(f64),
    /// Scroll to this share of the page height (0-100)
    Percentage(f64),
}

/// Action performed by a step
#[derive(Debug, Clone, PartialEq)]
pub enum StepAction {
    /// Open one of the URLs, picked at random. No URL means a page view without navigation.
    Visit { urls: Vec<String> },
    Click { clicks: Vec<ClickTarget> },
    Form {
        fields: Vec<FormField>,
        submit: Locator,
        submit_method: SubmitMethod,
    },
    Scroll(ScrollTarget),
}

impl StepAction {
    pub fn kind(&self) -> &'static str {
        match self {
            StepAction::Visit { .. } => "visit",
            StepAction::Click { .. } => "click",
            StepAction::Form { .. } => "form",
            StepAction::Scroll(_) => "scroll",
        }
    }
}

/// A named action definition from the `step` section
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub name: String,
    pub action: StepAction,
    /// Pause after the action, overriding the default delay
    pub delay_after: Option<Duration>,
}

/// Ordered list of steps run against one monitor
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    pub name: String,
    pub steps: Vec<Step>,
}

impl Sequence {
    /// First URL of the first visit step, used to attribute events captured before any page loaded
    pub fn first_visit_url(&self) -> Option<&str> {
        self.steps.iter().find_map(|step| match &step.action {
            StepAction::Visit { urls } => urls.first().map(|u| u.as_str()),
            _ => None,
        })
    }
}

/// A loaded and validated configuration file
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub options: GlobalOptions,
    pub steps: HashMap<String, Step>,
    /// Sequences in the order they are declared
    pub sequences: Vec<Sequence>,
    /// Raw rule source per event name
    pub validation: BTreeMap<String, String>,
    /// File the configuration came from
    pub source_path: Option<PathBuf>,
}

impl RunConfig {
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.get(name)
    }
}
