use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

/// Example configuration file contents (bundled with the crate)
pub const EXAMPLE_CONFIG: &str = include_str!("recorder.toml.example");

/// Recorder configuration
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecorderConfig {
    /// Name shown next to the recorder id in logs and exports
    pub label: Option<String>,
    /// Input fields always dropped from recorded signal input
    pub ignored_input_fields: Vec<String>,
    /// Trace-log every recorded mutation
    pub log_mutations: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlRecorderSection {
    pub label: Option<String>,
    pub log_mutations: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlInputSection {
    pub ignored_fields: Option<Vec<String>>,
}

/// TOML representation of the config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    pub recorder: Option<TomlRecorderSection>,
    pub input: Option<TomlInputSection>,
}

impl RecorderConfig {
    /// Parse TOML and merge it over the defaults
    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let toml_config: TomlConfig =
            toml::from_str(contents).context("invalid recorder configuration")?;
        Ok(Self::default().merged(toml_config))
    }

    /// Load configuration from `path`
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&contents).with_context(|| format!("in {}", path.display()))
    }

    /// Load configuration from `path`, falling back to defaults when the file is missing
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no recorder config, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    fn merged(mut self, toml_config: TomlConfig) -> Self {
        if let Some(recorder) = toml_config.recorder {
            if recorder.label.is_some() {
                self.label = recorder.label;
            }
            if let Some(log_mutations) = recorder.log_mutations {
                self.log_mutations = log_mutations;
            }
        }
        if let Some(input) = toml_config.input {
            if let Some(fields) = input.ignored_fields {
                self.ignored_input_fields = fields;
            }
        }
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_ignored_input_field(mut self, field: impl Into<String>) -> Self {
        self.ignored_input_fields.push(field.into());
        self
    }
}
