pub mod validation;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use self::validation::validate_config;
use crate::ids::{MessageIdSource, RandomIds, SequentialIds};
use crate::observability::LogFormat;
use crate::reasoning::{ReasoningMarkers, DEFAULT_END_MARKER, DEFAULT_START_MARKER};

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Reasoning segment delimiters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkersConfig {
    #[serde(default = "default_start_marker")]
    pub start: String,
    #[serde(default = "default_end_marker")]
    pub end: String,
}

fn default_start_marker() -> String {
    DEFAULT_START_MARKER.to_string()
}
fn default_end_marker() -> String {
    DEFAULT_END_MARKER.to_string()
}

impl Default for MarkersConfig {
    fn default() -> Self {
        Self {
            start: default_start_marker(),
            end: default_end_marker(),
        }
    }
}

/// How message identifiers are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    #[default]
    Random,
    Sequential,
}

impl fmt::Display for IdStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdStrategy::Random => write!(f, "random"),
            IdStrategy::Sequential => write!(f, "sequential"),
        }
    }
}

/// Envelope fields of translated messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_true")]
    pub echo_upstream_model: bool,
    #[serde(default = "default_message_id_prefix")]
    pub message_id_prefix: String,
    #[serde(default)]
    pub id_strategy: IdStrategy,
}

fn default_model() -> String {
    "thinkbridge".to_string()
}
fn default_message_id_prefix() -> String {
    "msg_".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            echo_upstream_model: true,
            message_id_prefix: default_message_id_prefix(),
            id_strategy: IdStrategy::default(),
        }
    }
}

/// Streaming behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Emit the terminal events when the upstream fails mid-stream.
    #[serde(default = "default_true")]
    pub finish_on_abort: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            finish_on_abort: true,
        }
    }
}

/// Feature flags and settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

/// Top-level application configuration. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub markers: MarkersConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
}

impl AppConfig {
    /// Build the shared marker set. The config must have been validated.
    #[must_use]
    pub fn markers(&self) -> Arc<ReasoningMarkers> {
        Arc::new(ReasoningMarkers::new(&self.markers.start, &self.markers.end))
    }

    /// A fresh identifier source following `output.id_strategy`.
    #[must_use]
    pub fn id_source(&self) -> Box<dyn MessageIdSource + Send> {
        let prefix = self.output.message_id_prefix.clone();
        match self.output.id_strategy {
            IdStrategy::Random => Box::new(RandomIds::new(prefix)),
            IdStrategy::Sequential => Box::new(SequentialIds::new(prefix)),
        }
    }
}

/// Load configuration from a YAML file and validate it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when reading the file fails, [`ConfigError::Yaml`]
/// when parsing fails, or [`ConfigError::Validation`] when semantic validation fails.
pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parse and validate configuration from YAML text.
///
/// # Errors
///
/// Returns [`ConfigError::Yaml`] or [`ConfigError::Validation`].
pub fn parse_config(contents: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = if contents.trim().is_empty() {
        AppConfig::default()
    } else {
        serde_yaml::from_str(contents)?
    };
    validate_config(&config)?;
    Ok(config)
}
