//! Configuration file handling for commonsense-cli

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use commonsense_client::{DatePrecision, DEFAULT_BASE_URL};
use serde::{Deserialize, Serialize};

use crate::output::OutputFormat;

/// Configuration for the CLI tool
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Default server URL
    pub server: Option<String>,
    /// Default account name
    pub username: Option<String>,
    /// `fractional` or `integer`
    pub date_precision: Option<String>,
    /// Where HTTP 500 bodies are written
    pub diagnostics_file: Option<PathBuf>,
    /// Default output format
    pub output: Option<String>,
    /// Disable colored output
    pub no_color: Option<bool>,
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("commonsense-cli");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(
        &self,
        server: Option<&str>,
        username: Option<&str>,
        output: Option<OutputFormat>,
        no_color: bool,
    ) -> Result<MergedConfig> {
        let date_precision = match &self.date_precision {
            Some(p) => p
                .parse::<DatePrecision>()
                .with_context(|| format!("Invalid date_precision in config: {}", p))?,
            None => DatePrecision::default(),
        };

        let output = match (output, &self.output) {
            (Some(format), _) => format,
            (None, Some(name)) => OutputFormat::from_str(name, true)
                .map_err(|e| anyhow!("Invalid output in config: {}", e))?,
            (None, None) => OutputFormat::default(),
        };

        Ok(MergedConfig {
            server: server
                .map(String::from)
                .or_else(|| self.server.clone())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            username: username.map(String::from).or_else(|| self.username.clone()),
            date_precision,
            diagnostics_file: self.diagnostics_file.clone(),
            output,
            no_color: no_color || self.no_color.unwrap_or(false),
        })
    }
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub server: String,
    pub username: Option<String>,
    pub date_precision: DatePrecision,
    pub diagnostics_file: Option<PathBuf>,
    pub output: OutputFormat,
    pub no_color: bool,
}
