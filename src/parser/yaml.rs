use super::types::{
    ClickTarget, FormField, GlobalOptions, RunConfig, ScrollTarget, Sequence, Step, StepAction,
    SubmitMethod,
};
use super::ConfigError;
use crate::driver::Locator;
use crate::report::OutputFormat;
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

type Result<T> = std::result::Result<T, ConfigError>;

fn invalid<T>(message: impl Into<String>) -> Result<T> {
    Err(ConfigError::Invalid(message.into()))
}

/// Load and validate a YAML configuration file
pub fn load_config(path: &Path) -> Result<RunConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let mut config = parse_config(&content)?;
    config.source_path = Some(path.to_path_buf());
    Ok(config)
}

/// Parse YAML content into a validated RunConfig
pub fn parse_config(content: &str) -> Result<RunConfig> {
    let root: Value = serde_yaml::from_str(content)?;
    let root = match root {
        Value::Mapping(map) => map,
        _ => return invalid("Configuration must be a mapping with config, step and sequence sections"),
    };

    let missing: Vec<&str> = ["config", "step", "sequence"]
        .into_iter()
        .filter(|section| get(&root, section).is_none())
        .collect();
    if !missing.is_empty() {
        return invalid(format!(
            "Missing required configuration sections: {}",
            missing.join(", ")
        ));
    }

    let options = parse_options(section(&root, "config")?)?;
    let steps = parse_steps(section(&root, "step")?)?;
    let sequences = parse_sequences(section(&root, "sequence")?, &steps)?;
    let validation = match get(&root, "validation") {
        None | Some(Value::Null) => BTreeMap::new(),
        Some(Value::Mapping(map)) => parse_validation(map)?,
        Some(_) => return invalid("validation must be a mapping of event name to rule"),
    };

    Ok(RunConfig {
        options,
        steps,
        sequences,
        validation,
        source_path: None,
    })
}

fn get<'a>(map: &'a Mapping, key: &str) -> Option<&'a Value> {
    map.get(&Value::String(key.to_string()))
}

fn section<'a>(root: &'a Mapping, name: &str) -> Result<&'a Mapping> {
    match get(root, name) {
        Some(Value::Mapping(map)) => Ok(map),
        Some(Value::Null) => {
            static EMPTY: std::sync::OnceLock<Mapping> = std::sync::OnceLock::new();
            Ok(EMPTY.get_or_init(Mapping::new))
        }
        _ => invalid(format!("Section '{}' must be a mapping", name)),
    }
}

fn key_name(key: &Value) -> Result<String> {
    match key {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => invalid("Section keys must be plain names"),
    }
}

/// Convert a validated non-negative number of seconds
fn seconds(value: f64, what: &str) -> Result<Duration> {
    if !value.is_finite() {
        return invalid(format!("{} must be a reasonable number of seconds", what));
    }
    Duration::try_from_secs_f64(value.max(0.0))
        .map_err(|_| ConfigError::Invalid(format!("{} must be a reasonable number of seconds", what)))
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn string_list(value: &Value, what: &str) -> Result<Vec<String>> {
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Sequence(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                _ => invalid(format!("All {} must be strings - use quotation marks", what)),
            })
            .collect(),
        _ => invalid(format!("{} must be a list of strings", what)),
    }
}

fn bool_option(config: &Mapping, key: &str) -> Result<bool> {
    match get(config, key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => invalid(format!("{} must be true or false", key)),
    }
}

fn parse_options(config: &Mapping) -> Result<GlobalOptions> {
    let mut options = GlobalOptions::default();

    if let Some(value) = get(config, "title") {
        match value {
            Value::String(s) if !s.trim().is_empty() => options.title = s.clone(),
            _ => return invalid("title must be a non-empty string"),
        }
    }

    if let Some(value) = get(config, "default_timeout") {
        let timeout =
            number(value).ok_or_else(|| ConfigError::Invalid("default_timeout must be a number, e.g. default_timeout: 10".into()))?;
        if timeout <= 0.0 {
            return invalid("default_timeout must be positive (higher than zero)");
        }
        options.default_timeout = seconds(timeout, "default_timeout")?;
    }

    if let Some(value) = get(config, "default_delay") {
        let delay =
            number(value).ok_or_else(|| ConfigError::Invalid("default_delay must be a number, e.g. default_delay: 2".into()))?;
        if delay < 0.0 {
            return invalid("default_delay cannot be negative");
        }
        options.default_delay = seconds(delay, "default_delay")?;
    }

    options.track_events = match get(config, "track_events") {
        None | Some(Value::Null) => None,
        Some(value) => {
            let names = string_list(value, "track_events")?;
            if names.is_empty() {
                None
            } else {
                Some(names)
            }
        }
    };
    if options.track_events.is_none() {
        log::info!("No track_events specified - will track all events");
    }

    options.user_agents = match get(config, "user_agents") {
        None | Some(Value::Null) => Vec::new(),
        Some(value) => string_list(value, "user_agents")?,
    };
    if options.user_agents.is_empty() {
        log::info!("No user agent specified in the config file, using the default user agent");
    }

    options.css_elements_to_hide = match get(config, "css_elements_to_hide") {
        None | Some(Value::Null) => Vec::new(),
        Some(value) => string_list(value, "css_elements_to_hide")?,
    };

    options.debug_mode = bool_option(config, "debug_mode")?;
    options.bot_info = bool_option(config, "bot_info")?;
    options.include_automation_info = bool_option(config, "include_automation_info")?
        || bool_option(config, "include_selenium_info")?;

    if let Some(value) = get(config, "output_folder") {
        match value {
            Value::String(s) => options.output_folder = Some(s.clone()),
            _ => {
                return invalid(
                    "output_folder must be a string in quotation marks, e.g. 'results' or '/path/to/folder'",
                )
            }
        }
    }

    if let Some(value) = get(config, "output_format") {
        let format = value.as_str().and_then(OutputFormat::from_name);
        match format {
            Some(format) => options.output_format = format,
            None => {
                log::warn!(
                    "Invalid output_format {:?} - must be 'csv' or 'json'. Using 'csv'",
                    value
                );
            }
        }
    }

    if let Some(value) = get(config, "data_layer") {
        match value {
            Value::String(s) if !s.trim().is_empty() => options.data_layer = s.clone(),
            _ => return invalid("data_layer must be the name of a global variable, e.g. 'dataLayer'"),
        }
    }

    if let Some(value) = get(config, "browser") {
        options.browser = value.as_str().map(|s| s.to_string());
    }
    if let Some(Value::Bool(b)) = get(config, "headless") {
        options.headless = Some(*b);
    }

    Ok(options)
}

fn parse_delay(map: &Mapping, context: &str) -> Result<Option<Duration>> {
    match get(map, "delay_after") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let delay = number(value).ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "delay_after in {} must be a number, without quotation marks, e.g. delay_after: 2",
                    context
                ))
            })?;
            if delay < 0.0 {
                return invalid(format!("delay_after in {} cannot be negative", context));
            }
            Ok(Some(seconds(delay, &format!("delay_after in {}", context))?))
        }
    }
}

fn parse_locator(map: &Mapping) -> Option<Locator> {
    Locator::from_parts(
        get(map, "xpath").and_then(Value::as_str),
        get(map, "selector").and_then(Value::as_str),
    )
}

fn parse_steps(section: &Mapping) -> Result<HashMap<String, Step>> {
    if section.is_empty() {
        return invalid("No steps defined in configuration");
    }

    let mut steps = HashMap::new();
    for (key, value) in section {
        let name = key_name(key)?;
        let definition = match value {
            Value::Mapping(map) => map,
            _ => return invalid(format!("Step '{}' must be a mapping", name)),
        };
        let step = parse_step(&name, definition)?;
        steps.insert(name, step);
    }
    Ok(steps)
}

fn parse_step(name: &str, step: &Mapping) -> Result<Step> {
    let kind = match get(step, "type") {
        Some(Value::String(kind)) => kind.as_str(),
        Some(_) => return invalid(format!("Step '{}' has a 'type' that is not a string", name)),
        None => return invalid(format!("Step '{}' missing required 'type' field", name)),
    };

    let action = match kind {
        "visit" => parse_visit(name, step)?,
        "click" => parse_click(name, step)?,
        "form" => parse_form(name, step)?,
        "scroll" => parse_scroll(name, step)?,
        other => return invalid(format!("Unknown step type '{}' in step '{}'", other, name)),
    };

    Ok(Step {
        name: name.to_string(),
        action,
        delay_after: parse_delay(step, &format!("step '{}'", name))?,
    })
}

fn parse_visit(name: &str, step: &Mapping) -> Result<StepAction> {
    let urls = match get(step, "url") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(url)) => vec![url.clone()],
        Some(Value::Sequence(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(url) => Ok(url.clone()),
                _ => invalid(format!("All URLs in step '{}' must be strings", name)),
            })
            .collect::<Result<Vec<_>>>()?,
        Some(_) => {
            return invalid(format!(
                "URL in step '{}' must be a string or list of strings",
                name
            ))
        }
    };
    Ok(StepAction::Visit { urls })
}

fn parse_click(name: &str, step: &Mapping) -> Result<StepAction> {
    let clicks = match get(step, "clicks") {
        Some(Value::Sequence(items)) => items,
        Some(_) => return invalid(format!("Clicks in step '{}' must be a list", name)),
        None => {
            return invalid(format!(
                "Click step '{}' missing required 'clicks' list",
                name
            ))
        }
    };
    if clicks.is_empty() {
        return invalid(format!("Click step '{}' has an empty 'clicks' list", name));
    }

    let mut targets = Vec::with_capacity(clicks.len());
    for (i, click) in clicks.iter().enumerate() {
        let map = match click {
            Value::Mapping(map) => map,
            _ => {
                return invalid(format!(
                    "Click {} in step '{}' must be a mapping, e.g. {{ selector: 'a.button_purchase' }}",
                    i, name
                ))
            }
        };
        let locator = parse_locator(map).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "Click {} in step '{}' missing either 'xpath' or 'selector'",
                i, name
            ))
        })?;
        let delay_after = parse_delay(map, &format!("click {} of step '{}'", i, name))?;
        targets.push(ClickTarget {
            locator,
            delay_after,
        });
    }
    Ok(StepAction::Click { clicks: targets })
}

fn parse_form(name: &str, step: &Mapping) -> Result<StepAction> {
    let items = match get(step, "fields") {
        Some(Value::Sequence(items)) => items,
        Some(_) => return invalid(format!("Fields in step '{}' must be a list", name)),
        None => {
            return invalid(format!(
                "Form step '{}' missing required 'fields' list",
                name
            ))
        }
    };

    let mut fields = Vec::with_capacity(items.len());
    for (i, field) in items.iter().enumerate() {
        let map = match field {
            Value::Mapping(map) => map,
            _ => {
                return invalid(format!(
                    "Field {} in form step '{}' must be a mapping, e.g. {{ selector: '#FirstNameInput', value: 'John' }}",
                    i, name
                ))
            }
        };
        let locator = parse_locator(map).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "Field {} in form step '{}' missing either 'xpath' or 'selector'",
                i, name
            ))
        })?;
        let value = match get(map, "value") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            None | Some(Value::Null) => String::new(),
            Some(_) => {
                return invalid(format!(
                    "Value of field {} in form step '{}' must be text",
                    i, name
                ))
            }
        };
        fields.push(FormField { locator, value });
    }

    let submit = match get(step, "submit_button") {
        Some(Value::String(xpath)) if !xpath.trim().is_empty() => Locator::XPath(xpath.clone()),
        Some(Value::Mapping(map)) => parse_locator(map).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "submit_button in form step '{}' missing either 'xpath' or 'selector'",
                name
            ))
        })?,
        _ => {
            return invalid(format!(
                "Form step '{}' missing required 'submit_button'",
                name
            ))
        }
    };

    let submit_method = match get(step, "submit_method") {
        None | Some(Value::Null) => SubmitMethod::default(),
        Some(value) => value.as_str().and_then(SubmitMethod::from_name).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "submit_method in form step '{}' must be 'click' or 'enter'",
                name
            ))
        })?,
    };

    Ok(StepAction::Form {
        fields,
        submit,
        submit_method,
    })
}

fn parse_scroll(name: &str, step: &Mapping) -> Result<StepAction> {
    let present: Vec<&str> = ["xpath", "selector", "pixels", "percentage"]
        .into_iter()
        .filter(|key| get(step, key).is_some())
        .collect();

    match present.len() {
        0 => {
            return invalid(format!(
                "Scroll step '{}' must specify one of: xpath, selector, pixels, or percentage",
                name
            ))
        }
        1 => {}
        _ => {
            return invalid(format!(
                "Scroll step '{}' can only specify one of: xpath, selector, pixels, or percentage",
                name
            ))
        }
    }

    let target = match present[0] {
        "pixels" => {
            let pixels = get(step, "pixels").and_then(number).ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "Pixels in scroll step '{}' must be a number, without quotation marks, e.g. pixels: 100",
                    name
                ))
            })?;
            if pixels <= 0.0 {
                return invalid(format!(
                    "Pixels in scroll step '{}' must be positive (more than 0)",
                    name
                ));
            }
            ScrollTarget::Pixels(pixels)
        }
        "percentage" => {
            let percentage = get(step, "percentage").and_then(number).ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "Percentage in scroll step '{}' must be a number between 0 and 100, without % sign, e.g. percentage: 75",
                    name
                ))
            })?;
            if !(0.0..=100.0).contains(&percentage) {
                return invalid(format!(
                    "Percentage in scroll step '{}' must be between 0 and 100",
                    name
                ));
            }
            ScrollTarget::Percentage(percentage)
        }
        _ => {
            let locator = parse_locator(step).ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "Scroll step '{}' has an empty xpath or selector",
                    name
                ))
            })?;
            ScrollTarget::Element(locator)
        }
    };
    Ok(StepAction::Scroll(target))
}

fn parse_sequences(section: &Mapping, steps: &HashMap<String, Step>) -> Result<Vec<Sequence>> {
    if section.is_empty() {
        return invalid("No sequences defined in configuration");
    }

    let mut sequences = Vec::with_capacity(section.len());
    for (key, value) in section {
        let name = key_name(key)?;
        let step_names = match value {
            Value::Mapping(map) => match get(map, "steps") {
                Some(Value::Sequence(items)) => items,
                Some(_) => return invalid(format!("Steps in sequence '{}' must be a list", name)),
                None => {
                    return invalid(format!(
                        "Sequence '{}' missing required 'steps' list",
                        name
                    ))
                }
            },
            _ => return invalid(format!("Sequence '{}' must be a mapping", name)),
        };
        if step_names.is_empty() {
            return invalid(format!("Sequence '{}' contains no steps", name));
        }

        let names: Vec<String> = step_names
            .iter()
            .map(key_name)
            .collect::<Result<Vec<_>>>()?;
        let unknown: Vec<&str> = names
            .iter()
            .filter(|n| !steps.contains_key(n.as_str()))
            .map(|n| n.as_str())
            .collect();
        if !unknown.is_empty() {
            return invalid(format!(
                "Sequence '{}' contains undefined steps: {}",
                name,
                unknown.join(", ")
            ));
        }

        sequences.push(Sequence {
            name,
            steps: names.iter().filter_map(|n| steps.get(n).cloned()).collect(),
        });
    }
    Ok(sequences)
}

fn parse_validation(section: &Mapping) -> Result<BTreeMap<String, String>> {
    let mut rules = BTreeMap::new();
    for (key, value) in section {
        let name = key_name(key)?;
        match value {
            Value::String(source) => {
                rules.insert(name, source.clone());
            }
            _ => {
                log::error!(
                    "Validation rule for '{}' must be a string - events of this kind will not be validated",
                    name
                );
            }
        }
    }
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOP: &str = r##"
config:
  title: shop
  default_timeout: 5
  default_delay: 0.5
  track_events: [purchase, add_to_cart]
  css_elements_to_hide: ["#cookie-banner"]
  output_format: json
step:
  home:
    type: visit
    url: ['https://shop.example/', 'https://shop.example/?a=1']
  buy:
    type: click
    delay_after: 2
    clicks:
      - selector: button.buy
        delay_after: 1
      - xpath: //a[@id='cart']
        selector: a.cart
  signup:
    type: form
    fields:
      - selector: '#email'
        value: a@b.c
      - xpath: //input[@name='age']
        value: 42
    submit_button: //button[@type='submit']
    submit_method: enter
  down:
    type: scroll
    percentage: 75
sequence:
  zeta:
    steps: [home, buy]
  alpha:
    steps: [home, signup, down]
validation:
  purchase: '{ "!event": "purchase", value: <float> }'
"##;

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(SHOP).unwrap();
        assert_eq!(config.options.title, "shop");
        assert_eq!(config.options.default_timeout, Duration::from_secs(5));
        assert_eq!(config.options.default_delay, Duration::from_millis(500));
        assert_eq!(
            config.options.track_events,
            Some(vec!["purchase".to_string(), "add_to_cart".to_string()])
        );
        assert_eq!(config.options.output_format, OutputFormat::Json);

        let names: Vec<_> = config.sequences.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert_eq!(config.sequences[0].first_visit_url(), Some("https://shop.example/"));

        match &config.step("buy").unwrap().action {
            StepAction::Click { clicks } => {
                assert_eq!(clicks.len(), 2);
                assert_eq!(clicks[0].delay_after, Some(Duration::from_secs(1)));
                assert_eq!(clicks[1].locator, Locator::XPath("//a[@id='cart']".into()));
            }
            other => panic!("unexpected action {:?}", other),
        }
        match &config.step("signup").unwrap().action {
            StepAction::Form {
                fields,
                submit,
                submit_method,
            } => {
                assert_eq!(fields[1].value, "42");
                assert_eq!(*submit, Locator::XPath("//button[@type='submit']".into()));
                assert_eq!(*submit_method, SubmitMethod::Enter);
            }
            other => panic!("unexpected action {:?}", other),
        }
        assert_eq!(
            config.step("down").unwrap().action,
            StepAction::Scroll(ScrollTarget::Percentage(75.0))
        );
        assert_eq!(config.validation.len(), 1);
    }

    #[test]
    fn test_empty_track_events_means_all() {
        let yaml = r#"
config:
  track_events: []
step:
  home: { type: visit }
sequence:
  main: { steps: [home] }
"#;
        let config = parse_config(yaml).unwrap();
        assert_eq!(config.options.track_events, None);
        assert_eq!(
            config.step("home").unwrap().action,
            StepAction::Visit { urls: Vec::new() }
        );
    }

    fn error_of(yaml: &str) -> String {
        parse_config(yaml).unwrap_err().to_string()
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(
            error_of("config: {}\nstep: { a: { type: visit } }\n"),
            "Missing required configuration sections: sequence"
        );
        assert_eq!(
            error_of("config: {}\nstep: { a: { type: hover } }\nsequence: { s: { steps: [a] } }\n"),
            "Unknown step type 'hover' in step 'a'"
        );
        assert_eq!(
            error_of("config: {}\nstep: { a: { type: scroll, pixels: 10, percentage: 5 } }\nsequence: { s: { steps: [a] } }\n"),
            "Scroll step 'a' can only specify one of: xpath, selector, pixels, or percentage"
        );
        assert_eq!(
            error_of("config: {}\nstep: { a: { type: scroll, pixels: 0 } }\nsequence: { s: { steps: [a] } }\n"),
            "Pixels in scroll step 'a' must be positive (more than 0)"
        );
        assert_eq!(
            error_of("config: {}\nstep: { a: { type: scroll, percentage: 120 } }\nsequence: { s: { steps: [a] } }\n"),
            "Percentage in scroll step 'a' must be between 0 and 100"
        );
        assert_eq!(
            error_of("config: {}\nstep: { a: { type: click, clicks: [ { delay_after: 1 } ] } }\nsequence: { s: { steps: [a] } }\n"),
            "Click 0 in step 'a' missing either 'xpath' or 'selector'"
        );
        assert_eq!(
            error_of("config: {}\nstep: { a: { type: form, fields: [] } }\nsequence: { s: { steps: [a] } }\n"),
            "Form step 'a' missing required 'submit_button'"
        );
        assert_eq!(
            error_of("config: {}\nstep: { a: { type: visit, delay_after: -1 } }\nsequence: { s: { steps: [a] } }\n"),
            "delay_after in step 'a' cannot be negative"
        );
        assert_eq!(
            error_of("config: { default_timeout: 0 }\nstep: { a: { type: visit } }\nsequence: { s: { steps: [a] } }\n"),
            "default_timeout must be positive (higher than zero)"
        );
        assert_eq!(
            error_of("config: {}\nstep: { a: { type: visit } }\nsequence: { s: { steps: [a, b, c] } }\n"),
            "Sequence 's' contains undefined steps: b, c"
        );
        assert_eq!(
            error_of("config: {}\nstep: { a: { type: visit } }\nsequence: { s: { steps: [] } }\n"),
            "Sequence 's' contains no steps"
        );
    }

    #[test]
    fn test_unbounded_durations_are_rejected() {
        assert_eq!(
            error_of("config: { default_timeout: .inf }\nstep: { a: { type: visit } }\nsequence: { s: { steps: [a] } }\n"),
            "default_timeout must be a reasonable number of seconds"
        );
        assert_eq!(
            error_of("config: { default_delay: 1e30 }\nstep: { a: { type: visit } }\nsequence: { s: { steps: [a] } }\n"),
            "default_delay must be a reasonable number of seconds"
        );
        assert_eq!(
            error_of("config: { default_delay: .nan }\nstep: { a: { type: visit } }\nsequence: { s: { steps: [a] } }\n"),
            "default_delay must be a reasonable number of seconds"
        );
        assert_eq!(
            error_of("config: {}\nstep: { a: { type: visit, delay_after: .inf } }\nsequence: { s: { steps: [a] } }\n"),
            "delay_after in step 'a' must be a reasonable number of seconds"
        );
    }

    #[test]
    fn test_load_config_reports_missing_file() {
        let err = load_config(Path::new("/nonexistent/dlt.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
