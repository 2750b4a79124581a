//! Configuration module for Faultline.
//!
//! Provides typed configuration structs that map to the YAML configuration
//! file, with loading, validation, and defaults. Non-serializable options
//! (custom recovery handlers, the `on_error` callback) are registered
//! programmatically on the SDK facade, not here.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for the Faultline SDK.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Credential and collector endpoint settings.
    pub reporting: ReportingConfig,
    /// Which error classes the capture layer hooks into.
    pub capture: CaptureConfig,
    /// Transport and logical retry tuning.
    pub retry: RetryConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Global context attached to every enriched event.
    pub context: Map<String, Value>,
}

/// Collector credential and endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    /// API key sent as `X-API-Key`. Required; reporting fails fast without it.
    pub api_key: String,
    /// Collector endpoint receiving event POSTs.
    pub api_endpoint: String,
    /// Milliseconds before an in-flight send is cancelled as timed out.
    pub request_timeout_ms: u64,
    /// Milliseconds between items when draining the offline queue.
    pub drain_delay_ms: u64,
}

/// Which error classes to capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Install the panic hook.
    pub capture_panics: bool,
    /// Emit events for watched async task failures.
    pub capture_task_failures: bool,
    /// Emit events from the intercepted HTTP client.
    pub capture_http_errors: bool,
    /// Track form dirty state and emit abandonment events at shutdown.
    pub capture_form_abandonment: bool,
}

/// Retry tuning.
///
/// `retry_delay_ms` is the base for two independent backoff policies:
/// linear for transport retries (reporter), exponential for logical
/// recovery retries (strategy engine).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Whether the strategy engine may act on collector retry recommendations.
    pub auto_retry: bool,
    /// Maximum attempts for both transport and logical retries.
    pub max_retries: u32,
    /// Base delay in milliseconds.
    pub retry_delay_ms: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit SDK logs to the host's console subscriber.
    pub console_logging: bool,
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_endpoint: "/api/report".to_string(),
            request_timeout_ms: 5000,
            drain_delay_ms: 100,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            capture_panics: true,
            capture_task_failures: true,
            capture_http_errors: true,
            capture_form_abandonment: true,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            auto_retry: true,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            console_logging: false,
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/faultline/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("faultline")
            .join("config.yaml")
    }

    /// Convenience constructor for programmatic use: defaults plus an API key.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.reporting.api_key = api_key.into();
        config
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"reporting.api_key"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- reporting ---
        if self.reporting.api_key.trim().is_empty() {
            errors.push(ValidationError {
                field: "reporting.api_key".into(),
                message: "is required".into(),
            });
        }
        if self.reporting.api_endpoint.trim().is_empty() {
            errors.push(ValidationError {
                field: "reporting.api_endpoint".into(),
                message: "must not be empty".into(),
            });
        }
        if self.reporting.request_timeout_ms == 0 {
            errors.push(ValidationError {
                field: "reporting.request_timeout_ms".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- retry ---
        if self.retry.retry_delay_ms == 0 {
            errors.push(ValidationError {
                field: "retry.retry_delay_ms".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!("must be one of {VALID_LOG_LEVELS:?}"),
            });
        }

        errors
    }
}
