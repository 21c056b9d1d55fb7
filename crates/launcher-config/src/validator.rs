//! Structural validation of the `[common]` section.

use crate::level::{level_filter, parse_level};
use crate::schema::CommonConfig;

/// Upper bound for `concurrency`; anything above is a typo, not a tuning choice.
const MAX_CONCURRENCY: usize = 4096;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// All errors joined into one line, for logging.
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the common section.
    pub fn validate(config: &CommonConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_identity(config, &mut result);
        Self::validate_logging(config, &mut result);
        Self::validate_runtime(config, &mut result);

        result
    }

    fn validate_identity(config: &CommonConfig, result: &mut ValidationResult) {
        if config.name.trim().is_empty() {
            result.add_error(ValidationError::new("common.name", "Name cannot be empty"));
        }
    }

    fn validate_logging(config: &CommonConfig, result: &mut ValidationResult) {
        if level_filter(&config.log_level).is_none() {
            result.add_error(ValidationError::new(
                "common.log_level",
                format!("Unknown log level '{}'", config.log_level),
            ));
        }

        for (target, level) in &config.log_levels {
            if target.trim().is_empty() {
                result.add_error(ValidationError::new(
                    "common.log_levels",
                    "Subsystem name cannot be empty",
                ));
            }
            if level_filter(level).is_none() {
                result.add_error(ValidationError::new(
                    format!("common.log_levels.{}", target),
                    format!("Unknown log level '{}'", level),
                ));
            }
        }

        if config.log_rotation().is_none() {
            result.add_error(ValidationError::new(
                "common.log_rotation",
                format!(
                    "Unknown rotation '{}', valid values: minutely, hourly, daily, never",
                    config.log_rotation
                ),
            ));
        }

        if config.secret_keys.iter().any(|k| k.trim().is_empty()) {
            result.add_error(ValidationError::new(
                "common.secret_keys",
                "Secret key names cannot be empty",
            ));
        }
    }

    fn validate_runtime(config: &CommonConfig, result: &mut ValidationResult) {
        if config.concurrency > MAX_CONCURRENCY {
            result.add_error(ValidationError::new(
                "common.concurrency",
                format!("concurrency must be at most {}", MAX_CONCURRENCY),
            ));
        }

        if parse_level(&config.mem_stats_level).is_none() {
            result.add_warning(ValidationWarning::new(
                "common.mem_stats_level",
                format!(
                    "Unknown level '{}', DEBUG will be used",
                    config.mem_stats_level
                ),
            ));
        }

        if config.deep_profiling && config.mem_stats_period().is_none() {
            result.add_warning(ValidationWarning::new(
                "common.deep_profiling",
                "Profiling samples are only reported when mem_stats_period > 0",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
