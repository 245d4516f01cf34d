//! Report cache error types.

use tally_shared::AppError;
use thiserror::Error;

/// Errors that can occur during report cache operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The backing store failed. Surfaced verbatim, never retried here.
    #[error("report cache unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be decoded.
    #[error("corrupt cache entry: {0}")]
    Corrupt(String),
}

impl CacheError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "CACHE_UNAVAILABLE",
            Self::Corrupt(_) => "CACHE_CORRUPT",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::Unavailable(_) => 503,
            Self::Corrupt(_) => 500,
        }
    }

    /// Returns true if the caller may retry the operation later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Unavailable(_) => Self::ExternalService(err.to_string()),
            CacheError::Corrupt(_) => Self::Internal(err.to_string()),
        }
    }
}
