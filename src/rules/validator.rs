//! Structural validation of event payloads against compiled rule trees.

use super::tree::{RuleObject, RuleValue, TypeTag};
use super::RuleSet;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Compiled regexes keyed by pattern source.
#[derive(Debug, Default)]
pub struct RegexCache {
    compiled: HashMap<String, Option<Regex>>,
}

impl RegexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Anchored regex for `pattern`, or None if it does not compile.
    pub fn get(&mut self, pattern: &str) -> Option<&Regex> {
        self.compiled
            .entry(pattern.to_string())
            .or_insert_with(|| Regex::new(&format!("^(?:{})$", pattern)).ok())
            .as_ref()
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}

/// Result of checking one payload against one rule tree
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    pub passed: bool,
    pub errors: Vec<String>,
}

/// Three-way marker attached to every captured event
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Valid,
    Invalid(Vec<String>),
    NotValidated,
}

impl ValidationOutcome {
    pub fn errors(&self) -> Option<&[String]> {
        match self {
            ValidationOutcome::Invalid(errors) => Some(errors),
            _ => None,
        }
    }
}

pub struct Validator {
    rules: Arc<RuleSet>,
    cache: RegexCache,
}

impl Validator {
    pub fn new(rules: Arc<RuleSet>) -> Self {
        Self {
            rules,
            cache: RegexCache::new(),
        }
    }

    /// Validate an event against the rule registered for its name, if any.
    pub fn validate_event(&mut self, event_name: &str, payload: &Value) -> ValidationOutcome {
        let rules = Arc::clone(&self.rules);
        match rules.get(event_name) {
            Some(rule) => {
                let result = self.validate(payload, rule);
                if result.passed {
                    ValidationOutcome::Valid
                } else {
                    ValidationOutcome::Invalid(result.errors)
                }
            }
            None => ValidationOutcome::NotValidated,
        }
    }

    pub fn validate(&mut self, payload: &Value, rule: &RuleObject) -> Validation {
        let mut errors = Vec::new();
        match payload {
            Value::Object(_) => self.check_object(payload, rule, "", &mut errors),
            other => errors.push(format!("event should be an object, got {}", kind_of(other))),
        }
        Validation {
            passed: errors.is_empty(),
            errors,
        }
    }

    fn check_object(&mut self, data: &Value, rule: &RuleObject, path: &str, errors: &mut Vec<String>) {
        for (key, expected) in rule.iter() {
            let required = key.starts_with('!');
            let field = key.trim_start_matches('!');

            let value = match data.get(field) {
                Some(v) => v,
                None => {
                    if required {
                        errors.push(format!("missing required field: {}{}", path, field));
                    }
                    continue;
                }
            };

            let field_path = format!("{}{}", path, field);
            self.check_value(value, expected, &field_path, errors);
        }
    }

    fn check_value(&mut self, value: &Value, expected: &RuleValue, field_path: &str, errors: &mut Vec<String>) {
        match expected {
            RuleValue::Type(tag) => {
                if !type_matches(*tag, value) {
                    errors.push(format!("{} should be a {}", field_path, tag.name()));
                }
            }
            RuleValue::Pattern(pattern) => {
                let text = stringify(value);
                let matched = match self.cache.get(pattern) {
                    Some(re) => re.is_match(&text),
                    None => false,
                };
                if !matched {
                    errors.push(format!(
                        "{} does not match the pattern /{}/",
                        field_path, pattern
                    ));
                }
            }
            RuleValue::Literal(literal) => {
                let actual = stringify(value);
                if actual != *literal {
                    errors.push(format!(
                        "{} should be '{}' but was '{}'",
                        field_path, literal, actual
                    ));
                }
            }
            RuleValue::Object(nested) => {
                if value.is_object() {
                    self.check_object(value, nested, &format!("{}.", field_path), errors);
                } else {
                    errors.push(format!("{} should be an object", field_path));
                }
            }
            RuleValue::Array(schemas) => {
                let schema = match schemas.first() {
                    Some(s) => s,
                    None => return,
                };
                let items = match value.as_array() {
                    Some(items) => items,
                    None => {
                        errors.push(format!("{} should be a list", field_path));
                        return;
                    }
                };
                for (i, item) in items.iter().enumerate() {
                    let item_path = format!("{}[{}]", field_path, i);
                    match schema {
                        RuleValue::Object(nested) => {
                            if item.is_object() {
                                self.check_object(item, nested, &format!("{}.", item_path), errors);
                            } else {
                                errors.push(format!("{} should be an object", item_path));
                            }
                        }
                        scalar => self.check_value(item, scalar, &item_path, errors),
                    }
                }
            }
        }
    }
}

fn type_matches(tag: TypeTag, value: &Value) -> bool {
    match tag {
        // serde_json keeps booleans apart from numbers, so they never pass here
        TypeTag::Int => value.is_i64() || value.is_u64(),
        TypeTag::Float => value.is_number(),
        TypeTag::Str => value.is_string(),
    }
}

/// Text form used for pattern and literal comparison.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
