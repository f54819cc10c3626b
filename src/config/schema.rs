//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the adapter.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::routing::RouterOptions;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Matching options for the top-level router.
    pub router: RouterOptions,

    /// Invocation adapter settings.
    pub adapter: AdapterConfig,

    /// Logging settings.
    pub logging: LoggingConfig,
}

/// How invocations are turned into responses.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Upper bound for one dispatch, in milliseconds.
    pub timeout_ms: u64,

    /// Put unhandled error messages in the response body.
    pub expose_errors: bool,

    /// Body for requests nothing answered; `Cannot <METHOD> <path>` if unset.
    pub not_found_body: Option<String>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            // API Gateway gives up after 29 seconds.
            timeout_ms: 29_000,
            expose_errors: false,
            not_found_body: None,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `lambda_router=debug`.
    pub level: String,

    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Full,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.adapter.timeout_ms, 29_000);
        assert!(!config.adapter.expose_errors);
        assert!(!config.router.case_sensitive);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Full);
    }

    #[test]
    fn test_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [router]
            strict = true

            [logging]
            format = "compact"
            "#,
        )
        .unwrap();
        assert!(config.router.strict);
        assert!(!config.router.merge_params);
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert_eq!(config.adapter.timeout_ms, 29_000);
    }
}
