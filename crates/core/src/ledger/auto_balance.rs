//! Auto-balancing of journal entry drafts.
//!
//! A draft with exactly one empty line is completed so that every currency
//! sums to zero:
//!
//! 1. The empty line absorbs the imbalance of its own currency.
//! 2. Every other currency that does not sum to zero gets a system-generated
//!    counter-line posted to the empty line's account.
//!
//! No currency conversion takes place. When the empty line is the only line
//! of its currency it is filled with exactly zero, and the other currencies
//! are balanced by their own counter-lines.

use rust_decimal::Decimal;
use tally_shared::LedgerConfig;
use tracing::{debug, warn};

use super::error::{AutoBalanceError, PreconditionError};
use super::grouping::CurrencyGrouper;
use super::types::{EmptyLinePolicy, JournalLine};
use super::validation::BalanceValidator;

/// A successfully balanced entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoBalanceOutcome {
    /// Original lines in order, the empty one filled, counter-lines appended.
    pub lines: Vec<JournalLine>,
    /// Index of the line that was empty.
    pub filled_index: usize,
    /// Amount written into the empty line.
    pub filled_amount: Decimal,
    /// Indices of the synthesized counter-lines in `lines`.
    pub synthesized: Vec<usize>,
    /// Human-readable description of what was done.
    pub summary: String,
}

/// Fills the single empty line of a draft and synthesizes counter-lines.
///
/// The engine is a pure computation over caller-owned data: no I/O, no clock,
/// no shared state. The same input always yields the same output.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoBalanceEngine {
    policy: EmptyLinePolicy,
    validator: BalanceValidator,
}

impl AutoBalanceEngine {
    /// Creates an engine with the default empty-line policy and tolerance.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            policy: EmptyLinePolicy::UnsetOnly,
            validator: BalanceValidator::new(),
        }
    }

    /// Creates an engine from ledger configuration.
    #[must_use]
    pub fn from_config(config: &LedgerConfig) -> Self {
        let policy = if config.treat_zero_as_empty {
            EmptyLinePolicy::UnsetOrZero
        } else {
            EmptyLinePolicy::UnsetOnly
        };
        Self::new()
            .with_policy(policy)
            .with_validator(BalanceValidator::with_tolerance(config.balance_tolerance))
    }

    /// Sets the empty-line policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: EmptyLinePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the validator used for the final check.
    #[must_use]
    pub const fn with_validator(mut self, validator: BalanceValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Returns the empty-line policy.
    #[must_use]
    pub const fn policy(&self) -> EmptyLinePolicy {
        self.policy
    }

    /// Balances a draft.
    ///
    /// The input is only read; on error the caller's lines are untouched.
    ///
    /// # Errors
    ///
    /// - [`PreconditionError::InsufficientLines`] if there are fewer than 2 lines
    /// - [`PreconditionError::EmptyLineCount`] if there is not exactly 1 empty line
    /// - [`AutoBalanceError::PostValidation`] if the candidate does not balance
    pub fn auto_balance(&self, lines: &[JournalLine]) -> Result<AutoBalanceOutcome, AutoBalanceError> {
        let filled_index = self.check_preconditions(lines)?;
        let groups = CurrencyGrouper::group(lines);

        let empty_line = &lines[filled_index];
        let own_currency = empty_line.currency.as_str();
        let filled_amount = groups
            .get(own_currency)
            .map_or(Decimal::ZERO, |group| negate(group.sum));

        let mut candidate = lines.to_vec();
        candidate[filled_index].amount = Some(filled_amount);

        let mut synthesized = Vec::new();
        for group in groups.iter().filter(|g| g.currency != own_currency) {
            if group.sum.is_zero() && !group.inexact {
                continue;
            }
            synthesized.push(candidate.len());
            candidate.push(JournalLine::system_generated(
                empty_line.account_id,
                group.currency.clone(),
                negate(group.sum),
            ));
        }

        let violations = self.validator.check_entry(&candidate);
        if !violations.is_empty() {
            let currencies: Vec<String> = violations.iter().map(|v| v.currency.clone()).collect();
            warn!(?currencies, "auto-balance candidate failed post-validation");
            return Err(AutoBalanceError::PostValidation {
                currencies,
                violations,
            });
        }

        let summary = describe(&candidate, filled_index, filled_amount, &synthesized);
        debug!(
            filled_index,
            %filled_amount,
            synthesized = synthesized.len(),
            "auto-balanced entry"
        );

        Ok(AutoBalanceOutcome {
            lines: candidate,
            filled_index,
            filled_amount,
            synthesized,
            summary,
        })
    }

    /// Balances a draft in place.
    ///
    /// `lines` is replaced only when balancing succeeds.
    ///
    /// # Errors
    ///
    /// Same as [`auto_balance`](Self::auto_balance).
    pub fn auto_balance_in_place(
        &self,
        lines: &mut Vec<JournalLine>,
    ) -> Result<AutoBalanceOutcome, AutoBalanceError> {
        let outcome = self.auto_balance(lines)?;
        lines.clone_from(&outcome.lines);
        Ok(outcome)
    }

    /// Returns the index of the single empty line.
    fn check_preconditions(&self, lines: &[JournalLine]) -> Result<usize, PreconditionError> {
        if lines.len() < 2 {
            return Err(PreconditionError::InsufficientLines { found: lines.len() });
        }

        let mut empty = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.is_empty(self.policy))
            .map(|(index, _)| index);

        match (empty.next(), empty.next()) {
            (Some(index), None) => Ok(index),
            (None, _) => Err(PreconditionError::EmptyLineCount { found: 0 }),
            (Some(_), Some(_)) => Err(PreconditionError::EmptyLineCount {
                found: 2 + empty.count(),
            }),
        }
    }
}

/// Exact negation that never produces a negative zero.
fn negate(value: Decimal) -> Decimal {
    if value.is_zero() { Decimal::ZERO } else { -value }
}

fn describe(
    lines: &[JournalLine],
    filled_index: usize,
    filled_amount: Decimal,
    synthesized: &[usize],
) -> String {
    let currency = &lines[filled_index].currency;
    let mut summary = format!("filled line {filled_index} with {filled_amount} {currency}");
    if !synthesized.is_empty() {
        let added: Vec<String> = synthesized
            .iter()
            .map(|&i| format!("{} {}", lines[i].amount_or_zero(), lines[i].currency))
            .collect();
        summary.push_str(&format!(
            "; added {} balancing line(s): {}",
            synthesized.len(),
            added.join(", ")
        ));
    }
    summary
}
