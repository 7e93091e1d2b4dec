use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::data::{Escaper, DEFAULT_ESCAPE_PATTERNS};
use crate::providers::file::{EXPORT_FORMAT_SETTING, FILE_TRANSLATOR_ID};
use crate::providers::Translator;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Default source language of new jobs (ISO)
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Default target language of new jobs (ISO)
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Database file; the user data directory when unset
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Directory receiving exchange files
    #[serde(default = "default_export_directory")]
    pub export_directory: PathBuf,

    /// Regular expressions of substrings that must not be translated
    #[serde(default = "default_escape_patterns")]
    pub escape_patterns: Vec<String>,

    /// Configured translator bindings
    #[serde(default = "default_translators")]
    pub translators: Vec<Translator>,

    /// Translator of new jobs when none is given
    #[serde(default)]
    pub default_translator: Option<String>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    // @returns: Matching log crate filter
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_source_language() -> String {
    "en".to_string()
}

fn default_target_language() -> String {
    "de".to_string()
}

fn default_export_directory() -> PathBuf {
    PathBuf::from("exports")
}

fn default_escape_patterns() -> Vec<String> {
    DEFAULT_ESCAPE_PATTERNS.iter().map(|p| p.to_string()).collect()
}

fn default_translators() -> Vec<Translator> {
    // XLIFF exchange through the file translator is always on offer
    let mut files = Translator::new("files", FILE_TRANSLATOR_ID)
        .with_setting(EXPORT_FORMAT_SETTING, serde_json::Value::String("xlf".to_string()));
    files.label = "Exchange files".to_string();
    vec![files]
}

impl Config {
    /// Load the configuration, writing the default one if the file is missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config file: {:?}", path))?;
            let config: Config = serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;
            return Ok(config);
        }

        warn!("Config file not found at {:?}, creating default config.", path);
        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize config to JSON")?;
        std::fs::write(path.as_ref(), json)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        // Validate languages
        let source = crate::language_utils::normalize_to_part1_or_part2t(&self.source_language)?;
        let target = crate::language_utils::normalize_to_part1_or_part2t(&self.target_language)?;
        if source == target {
            return Err(anyhow!("Source and target language must differ ({})", source));
        }

        Escaper::new(&self.escape_patterns)
            .map_err(|e| anyhow!("Invalid escape pattern: {}", e))?;

        let mut ids = std::collections::HashSet::new();
        for translator in &self.translators {
            if translator.id.trim().is_empty() {
                return Err(anyhow!("Translator id must not be empty"));
            }
            if !ids.insert(translator.id.as_str()) {
                return Err(anyhow!("Duplicate translator id: {}", translator.id));
            }
        }

        if let Some(default) = &self.default_translator {
            if !ids.contains(default.as_str()) {
                return Err(anyhow!("Default translator '{}' is not configured", default));
            }
        }

        Ok(())
    }

    /// The default translator, if it is configured
    pub fn default_translator(&self) -> Option<&Translator> {
        let id = self.default_translator.as_deref()?;
        self.translators.iter().find(|t| t.id == id)
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: default_source_language(),
            target_language: default_target_language(),
            database_path: None,
            export_directory: default_export_directory(),
            escape_patterns: default_escape_patterns(),
            translators: default_translators(),
            default_translator: Some("files".to_string()),
            log_level: LogLevel::default(),
        }
    }
}
