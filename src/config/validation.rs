//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeout > 0)
//! - Check the log filter directive parses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use tracing_subscriber::EnvFilter;

use crate::config::schema::AppConfig;

/// One failed check, naming the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check every semantic constraint, collecting all failures.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.adapter.timeout_ms == 0 {
        errors.push(ValidationError {
            field: "adapter.timeout_ms",
            message: "must be greater than 0".to_string(),
        });
    }

    let level = config.logging.level.trim();
    if level.is_empty() {
        errors.push(ValidationError {
            field: "logging.level",
            message: "must not be empty".to_string(),
        });
    } else if let Err(e) = EnvFilter::try_new(level) {
        errors.push(ValidationError {
            field: "logging.level",
            message: format!("invalid filter directive: {}", e),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
