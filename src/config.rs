//! Run configuration.
//!
//! [`AnalysisConfig::load`] reads a YAML file layered over the built-in
//! defaults; every key is optional. Command-line flags are applied on top by
//! the binary.

use serde::Deserialize;
use std::path::Path;

use crate::error::ConfigError;
use crate::output_format::{check_columns, OutputFormat};
use crate::record::COLUMNS;

/// What to do with a matched line whose timestamp does not fit the layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStrategy {
    /// Stop the whole run on the first bad timestamp
    #[default]
    FailFast,
    /// Drop the line, count it and continue
    Skip,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub timestamp_errors: ErrorStrategy,
    pub output_format: OutputFormat,
    pub keys: Option<Vec<String>>,
    pub top_urls: usize,
    pub histogram_bins: usize,
    pub buffer_size: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            timestamp_errors: ErrorStrategy::FailFast,
            output_format: OutputFormat::default(),
            keys: None,
            top_urls: 10,
            histogram_bins: 30,
            buffer_size: 65536, // 64KB
        }
    }
}

impl AnalysisConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::FileNotFound {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to a map
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: AnalysisConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(keys) = &self.keys {
            if keys.is_empty() {
                return Err(ConfigError::Invalid("keys must not be empty".to_string()));
            }
            check_columns(keys)?;
        }
        if self.histogram_bins == 0 {
            return Err(ConfigError::Invalid(
                "histogram_bins must be at least 1".to_string(),
            ));
        }
        if self.buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "buffer_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Columns to export, in order
    pub fn columns(&self) -> Vec<String> {
        match &self.keys {
            Some(keys) => keys.clone(),
            None => COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }
}
