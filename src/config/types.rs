//! Configuration types for repo-authz
//!
//! This module defines the configuration structure that can be loaded from
//! TOML files and/or environment variables.

use serde::Deserialize;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Rule files to load
    pub authz: AuthzFilesConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Location of the authorization rule files
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthzFilesConfig {
    /// Rules file (`~` is expanded)
    pub rules_file: Option<String>,

    /// Optional global groups file; when set, the rules file may not
    /// contain a `[groups]` section
    pub groups_file: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format (pretty, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// JSON structured output
    Json,
}

/// Levels accepted by `logging.level`
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
