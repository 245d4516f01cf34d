//! Property-based tests for the auto-balance engine.
//!
//! - Every successful output balances in every currency.
//! - Malformed drafts are rejected and left untouched.

use proptest::prelude::*;
use rust_decimal::Decimal;
use tally_shared::types::AccountId;
use uuid::Uuid;

use super::auto_balance::AutoBalanceEngine;
use super::error::{AutoBalanceError, PreconditionError};
use super::grouping::CurrencyGrouper;
use super::types::{EmptyLinePolicy, JournalLine};

/// Strategy to generate a signed amount from -1,000,000.00 to 1,000,000.00.
fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (-100_000_000i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn currency_strategy() -> impl Strategy<Value = String> {
    prop_oneof![Just("USD"), Just("EUR"), Just("CNY"), Just("IDR"), Just("JPY")]
        .prop_map(String::from)
}

fn filled_line() -> impl Strategy<Value = JournalLine> {
    (currency_strategy(), amount_strategy())
        .prop_map(|(currency, amount)| JournalLine::new(AccountId::from_uuid(Uuid::nil()), currency, amount))
}

/// A draft with one unset line inserted at a random position.
fn draft_strategy() -> impl Strategy<Value = Vec<JournalLine>> {
    (
        prop::collection::vec(filled_line(), 1..12),
        currency_strategy(),
        any::<prop::sample::Index>(),
    )
        .prop_map(|(mut lines, currency, position)| {
            let at = position.index(lines.len() + 1);
            lines.insert(at, JournalLine::unset(AccountId::from_uuid(Uuid::nil()), currency));
            lines
        })
}

/// A line with either no amount or any amount.
fn any_line() -> impl Strategy<Value = JournalLine> {
    (currency_strategy(), proptest::option::of(amount_strategy())).prop_map(|(currency, amount)| {
        JournalLine {
            amount,
            ..JournalLine::unset(AccountId::from_uuid(Uuid::nil()), currency)
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Every currency of a balanced output sums to exactly zero.
    #[test]
    fn prop_output_balances_every_currency(lines in draft_strategy()) {
        let outcome = AutoBalanceEngine::new().auto_balance(&lines).unwrap();

        for group in &CurrencyGrouper::group(&outcome.lines) {
            prop_assert!(!group.inexact);
            prop_assert_eq!(group.sum, Decimal::ZERO, "currency {} not balanced", group.currency);
        }
    }

    /// Original lines keep their order and only the empty line changes.
    #[test]
    fn prop_original_prefix_preserved(lines in draft_strategy()) {
        let outcome = AutoBalanceEngine::new().auto_balance(&lines).unwrap();

        prop_assert!(outcome.lines.len() >= lines.len());
        for (i, (before, after)) in lines.iter().zip(&outcome.lines).enumerate() {
            if i == outcome.filled_index {
                prop_assert_eq!(before.amount, None);
                prop_assert_eq!(after.amount, Some(outcome.filled_amount));
            } else {
                prop_assert_eq!(before, after);
            }
        }
        for generated in &outcome.lines[lines.len()..] {
            prop_assert!(generated.is_system_generated);
        }
    }

    /// At most one counter-line per currency other than the empty line's own.
    #[test]
    fn prop_one_counter_line_per_currency(lines in draft_strategy()) {
        let outcome = AutoBalanceEngine::new().auto_balance(&lines).unwrap();
        let own = &lines[outcome.filled_index].currency;

        let mut seen: Vec<&str> = Vec::new();
        for &i in &outcome.synthesized {
            let currency = outcome.lines[i].currency.as_str();
            prop_assert_ne!(currency, own.as_str());
            prop_assert!(!seen.contains(&currency));
            seen.push(currency);
        }
    }

    /// Drafts with fewer than two lines are rejected unchanged.
    #[test]
    fn prop_short_drafts_rejected(lines in prop::collection::vec(any_line(), 0..2)) {
        let before = lines.clone();
        let result = AutoBalanceEngine::new().auto_balance(&lines);

        prop_assert_eq!(
            result,
            Err(AutoBalanceError::Precondition(PreconditionError::InsufficientLines {
                found: lines.len(),
            }))
        );
        prop_assert_eq!(lines, before);
    }

    /// Drafts without exactly one empty line are rejected unchanged.
    #[test]
    fn prop_wrong_empty_count_rejected(lines in prop::collection::vec(any_line(), 2..12)) {
        let empties = lines
            .iter()
            .filter(|line| line.is_empty(EmptyLinePolicy::UnsetOnly))
            .count();
        prop_assume!(empties != 1);

        let mut working = lines.clone();
        let result = AutoBalanceEngine::new().auto_balance_in_place(&mut working);

        prop_assert_eq!(
            result,
            Err(AutoBalanceError::Precondition(PreconditionError::EmptyLineCount {
                found: empties,
            }))
        );
        prop_assert_eq!(working, lines);
    }
}
