//! Error types for the auto-balance engine.

use tally_shared::AppError;
use thiserror::Error;

use super::validation::BalanceViolation;

/// The draft does not have the shape auto-balance requires.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    /// Fewer than two lines.
    #[error("insufficient lines: an entry needs at least 2 lines, found {found}")]
    InsufficientLines {
        /// Number of lines in the draft.
        found: usize,
    },

    /// Zero or several empty lines.
    #[error("must have exactly one empty line, found {found}")]
    EmptyLineCount {
        /// Number of empty lines in the draft.
        found: usize,
    },
}

/// Errors returned by [`AutoBalanceEngine`](super::AutoBalanceEngine).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AutoBalanceError {
    /// The draft was rejected before any computation.
    #[error("precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    /// The balanced candidate still has non-zero currencies.
    #[error("entry does not balance after auto-balance in: {}", .currencies.join(", "))]
    PostValidation {
        /// Offending currency codes, in first-seen order.
        currencies: Vec<String>,
        /// Residual per offending currency.
        violations: Vec<BalanceViolation>,
    },
}

impl AutoBalanceError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Precondition(PreconditionError::InsufficientLines { .. }) => "INSUFFICIENT_LINES",
            Self::Precondition(PreconditionError::EmptyLineCount { .. }) => "EMPTY_LINE_COUNT",
            Self::PostValidation { .. } => "UNBALANCED_AFTER_AUTO_BALANCE",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::Precondition(_) => 400,
            Self::PostValidation { .. } => 422,
        }
    }

    /// Auto-balance failures are never retried automatically.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        false
    }
}

impl From<AutoBalanceError> for AppError {
    fn from(err: AutoBalanceError) -> Self {
        match err {
            AutoBalanceError::Precondition(_) => Self::Validation(err.to_string()),
            AutoBalanceError::PostValidation { .. } => Self::BusinessRule(err.to_string()),
        }
    }
}
