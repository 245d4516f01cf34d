//! Ledger-consistency engine.
//!
//! This module implements balancing of multi-currency journal entries:
//! - Journal line types and the empty-line policy
//! - Grouping of lines by currency with exact decimal sums
//! - Per-currency balance validation
//! - Auto-balancing of drafts with a single empty line
//! - Error types for balancing failures

pub mod auto_balance;
pub mod error;
pub mod grouping;
pub mod types;
pub mod validation;

#[cfg(test)]
mod auto_balance_props;

pub use auto_balance::{AutoBalanceEngine, AutoBalanceOutcome};
pub use error::{AutoBalanceError, PreconditionError};
pub use grouping::{CurrencyGroup, CurrencyGrouper, CurrencyGroups};
pub use types::{EmptyLinePolicy, JournalLine};
pub use validation::{BalanceValidator, BalanceViolation};
