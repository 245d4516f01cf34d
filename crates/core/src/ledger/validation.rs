//! Per-currency balance validation.

use rust_decimal::Decimal;
use serde::Serialize;

use super::grouping::{CurrencyGrouper, CurrencyGroups};
use super::types::JournalLine;

/// A currency whose lines do not sum to zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceViolation {
    /// The unbalanced currency.
    pub currency: String,
    /// The signed residual left in that currency.
    pub residual: Decimal,
    /// True if the residual could not be computed exactly.
    pub inexact: bool,
}

/// Reports per-currency balance violations.
///
/// The tolerance only absorbs representation artifacts. With exact decimal
/// sums the default is far below any currency's minor unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceValidator {
    tolerance: Decimal,
}

impl BalanceValidator {
    /// Default tolerance: 1e-12.
    pub const DEFAULT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 12);

    /// Creates a validator with the default tolerance.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tolerance: Self::DEFAULT_TOLERANCE,
        }
    }

    /// Creates a validator with a custom tolerance (sign is ignored).
    #[must_use]
    pub fn with_tolerance(tolerance: Decimal) -> Self {
        Self {
            tolerance: tolerance.abs(),
        }
    }

    /// Returns the configured tolerance.
    #[must_use]
    pub const fn tolerance(&self) -> Decimal {
        self.tolerance
    }

    /// Returns one violation per currency whose sum exceeds the tolerance.
    ///
    /// Groups with an inexact sum are always reported. An empty result means
    /// the entry is fully balanced.
    #[must_use]
    pub fn validate(&self, groups: &CurrencyGroups) -> Vec<BalanceViolation> {
        groups
            .iter()
            .filter(|group| group.inexact || group.sum.abs() > self.tolerance)
            .map(|group| BalanceViolation {
                currency: group.currency.clone(),
                residual: group.sum,
                inexact: group.inexact,
            })
            .collect()
    }

    /// Groups `lines` and validates the result.
    #[must_use]
    pub fn check_entry(&self, lines: &[JournalLine]) -> Vec<BalanceViolation> {
        self.validate(&CurrencyGrouper::group(lines))
    }

    /// Returns true if every currency in `lines` balances.
    #[must_use]
    pub fn is_balanced(&self, lines: &[JournalLine]) -> bool {
        self.check_entry(lines).is_empty()
    }
}

impl Default for BalanceValidator {
    fn default() -> Self {
        Self::new()
    }
}
