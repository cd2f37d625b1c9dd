//! Validation rule DSL: tokenizer, parser and structural validator.
//!
//! Rules are written per event kind, e.g.
//!
//! ```text
//! { "!event": "purchase", value: <float>, currency: /[A-Z]{3}/,
//!   items: [ { "!id": <int>, name: <str> } ] }
//! ```
//!
//! A `!` in front of a key marks the field as required.

pub mod lexer;
pub mod parser;
pub mod tree;
pub mod validator;

use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

pub use tree::{RuleObject, RuleValue, TypeTag};
pub use validator::{RegexCache, Validation, ValidationOutcome, Validator};

/// Errors raised while compiling a rule
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuleError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("rule must be an object in curly brackets, found {found}")]
    NotAnObject { found: String },
}

impl RuleError {
    pub fn syntax(offset: usize, message: impl Into<String>) -> Self {
        RuleError::Syntax {
            offset,
            message: message.into(),
        }
    }
}

/// Compile one rule source into its rule tree.
pub fn compile_rule(source: &str) -> Result<RuleObject, RuleError> {
    compile_rule_for("<anonymous>", source)
}

fn compile_rule_for(kind: &str, source: &str) -> Result<RuleObject, RuleError> {
    let tokens = lexer::tokenize(source)?;
    let mut parser = parser::RuleParser::new(&tokens, source.len(), kind);
    match parser.parse_document()? {
        RuleValue::Object(object) => Ok(object),
        other => Err(RuleError::NotAnObject {
            found: other.to_string(),
        }),
    }
}

/// Compiled rules keyed by event name.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: HashMap<String, RuleObject>,
    rejected: Vec<(String, RuleError)>,
}

impl RuleSet {
    pub fn get(&self, event_name: &str) -> Option<&RuleObject> {
        self.rules.get(event_name)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Event kinds whose rule failed to compile, with the reason
    pub fn rejected(&self) -> &[(String, RuleError)] {
        &self.rejected
    }
}

/// Compile every rule; malformed ones are reported and left out.
pub fn compile_rules(sources: &BTreeMap<String, String>) -> RuleSet {
    let mut set = RuleSet::default();

    for (kind, source) in sources {
        match compile_rule_for(kind, source) {
            Ok(rule) => {
                log::debug!("Compiled validation rule for '{}' ({} fields)", kind, rule.len());
                set.rules.insert(kind.clone(), rule);
            }
            Err(e) => {
                log::error!(
                    "Invalid validation rule for '{}': {} - events of this kind will not be validated",
                    kind,
                    e
                );
                set.rejected.push((kind.clone(), e));
            }
        }
    }

    set
}
