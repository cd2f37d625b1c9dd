//! Configuration file loading and validation.

pub mod types;
pub mod yaml;

use std::path::PathBuf;
use thiserror::Error;

pub use types::{
    ClickTarget, FormField, GlobalOptions, RunConfig, ScrollTarget, Sequence, Step, StepAction,
    SubmitMethod,
};
pub use yaml::{load_config, parse_config};

/// Errors raised while loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    Invalid(String),
}
