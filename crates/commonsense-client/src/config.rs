//! Client configuration with YAML support

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Production API host
pub const DEFAULT_BASE_URL: &str = "http://api.sense-os.nl";

/// File receiving the body of HTTP 500 responses
pub const DEFAULT_DIAGNOSTICS_FILE: &str = "recess_diagnostics.html";

/// CommonSense client configuration
///
/// Can be loaded from YAML or JSON, or constructed programmatically:
///
/// ```rust
/// use commonsense_client::{ClientConfig, DatePrecision};
///
/// let config = ClientConfig::builder("http://localhost:3000")
///     .date_precision(DatePrecision::Integer)
///     .verbose(true)
///     .build();
/// assert_eq!(config.location_prefix(), "http://localhost:3000/sensors/");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Scheme and host of the service, without a trailing path
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Variant-specific behavior of the service
    #[serde(default)]
    pub profile: ServiceProfile,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    /// Where HTTP 500 bodies are dumped; `None` disables the dump
    #[serde(default = "default_diagnostics_file")]
    pub diagnostics_file: Option<PathBuf>,

    /// Log full request and response details
    #[serde(default)]
    pub verbose: bool,
}

/// How the service encodes data point dates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatePrecision {
    /// Seconds with a fractional part
    #[default]
    Fractional,
    /// Whole seconds; uploaded dates are truncated
    Integer,
}

impl std::str::FromStr for DatePrecision {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fractional" | "float" => Ok(Self::Fractional),
            "integer" | "int" => Ok(Self::Integer),
            other => Err(ConfigError::ParseError(format!(
                "unknown date precision: {}",
                other
            ))),
        }
    }
}

/// Service variant settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceProfile {
    #[serde(default)]
    pub date_precision: DatePrecision,

    /// Expected start of the `Location` header of a created sensor.
    /// Defaults to `<base_url>/sensors/`.
    #[serde(default)]
    pub location_prefix: Option<String>,
}

/// Timeout configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// Request timeout in milliseconds (default: 30s)
    #[serde(default = "default_request_timeout")]
    pub request_ms: u64,

    /// Connect timeout in milliseconds (default: 10s)
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            request_ms: default_request_timeout(),
            connect_ms: default_connect_timeout(),
        }
    }
}

impl TimeoutsConfig {
    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_diagnostics_file() -> Option<PathBuf> {
    Some(PathBuf::from(DEFAULT_DIAGNOSTICS_FILE))
}

fn default_request_timeout() -> u64 {
    30_000 // 30 seconds
}

fn default_connect_timeout() -> u64 {
    10_000 // 10 seconds
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfigBuilder::new(DEFAULT_BASE_URL).build()
    }
}

impl ClientConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Serialize configuration to YAML
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }

    /// Create a builder for programmatic configuration
    pub fn builder(base_url: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(base_url)
    }

    /// Resolved prefix that `Location` headers must start with
    pub fn location_prefix(&self) -> String {
        self.profile
            .location_prefix
            .clone()
            .unwrap_or_else(|| format!("{}/sensors/", self.base_url.trim_end_matches('/')))
    }
}

/// Builder for ClientConfig
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new builder with the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            config: ClientConfig {
                base_url: base_url.into(),
                profile: ServiceProfile::default(),
                timeouts: TimeoutsConfig::default(),
                diagnostics_file: default_diagnostics_file(),
                verbose: false,
            },
        }
    }

    pub fn date_precision(mut self, precision: DatePrecision) -> Self {
        self.config.profile.date_precision = precision;
        self
    }

    pub fn location_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.profile.location_prefix = Some(prefix.into());
        self
    }

    /// Set the HTTP 500 dump file
    pub fn diagnostics_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.diagnostics_file = Some(path.into());
        self
    }

    /// Disable the HTTP 500 dump
    pub fn no_diagnostics_file(mut self) -> Self {
        self.config.diagnostics_file = None;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    /// Set request timeout in milliseconds
    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.request_ms = ms;
        self
    }

    /// Set connect timeout in milliseconds
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.connect_ms = ms;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
