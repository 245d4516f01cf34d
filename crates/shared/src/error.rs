//! Application-wide error types.

use thiserror::Error;

/// Application error types.
///
/// Domain errors from the core crate convert into one of these so that the
/// surrounding application deals with a single, inspectable error surface.
#[derive(Debug, Error)]
pub enum AppError {
    /// Input shape rejected before any computation happened.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Business rule violation (e.g. an entry that cannot be balanced).
    #[error("Business rule violation: {0}")]
    BusinessRule(String),

    /// Backing store or other collaborator failed.
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::BusinessRule(_) => 422,
            Self::ExternalService(_) => 503,
            Self::Configuration(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::BusinessRule(_) => "BUSINESS_RULE_VIOLATION",
            Self::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}
