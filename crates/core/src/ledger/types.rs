//! Journal line domain types used by the balancing engine.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tally_shared::types::{AccountId, LedgerEntryId};

/// Decides which lines count as "not entered yet".
///
/// An absent amount is always empty. Whether a numerically zero amount is
/// also empty is a policy choice: the default keeps a legitimate zero line
/// distinct from an unset one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyLinePolicy {
    /// Only `amount == None` marks a line as empty.
    #[default]
    UnsetOnly,
    /// `None` or a zero amount marks a line as empty (legacy behaviour).
    UnsetOrZero,
}

impl EmptyLinePolicy {
    /// Returns true if an amount counts as empty under this policy.
    #[must_use]
    pub fn is_empty(self, amount: Option<Decimal>) -> bool {
        match (self, amount) {
            (_, None) => true,
            (Self::UnsetOnly, Some(_)) => false,
            (Self::UnsetOrZero, Some(value)) => value.is_zero(),
        }
    }
}

/// One signed monetary movement against one account, in one currency.
///
/// Positive amounts are debits, negative amounts are credits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    /// Identifier of the persisted line, absent for unsaved lines.
    #[serde(default)]
    pub id: Option<LedgerEntryId>,
    /// The account this line posts to.
    pub account_id: AccountId,
    /// Signed amount, absent while the line is still being entered.
    #[serde(default)]
    pub amount: Option<Decimal>,
    /// Currency code, used verbatim as the grouping key.
    pub currency: String,
    /// Free-form tags, in entry order.
    #[serde(default)]
    pub tags: Vec<String>,
    /// True for lines added by the balancing engine.
    #[serde(default)]
    pub is_system_generated: bool,
}

impl JournalLine {
    /// Creates an unsaved line with an amount.
    #[must_use]
    pub fn new(account_id: AccountId, currency: impl Into<String>, amount: Decimal) -> Self {
        Self {
            id: None,
            account_id,
            amount: Some(amount),
            currency: currency.into(),
            tags: Vec::new(),
            is_system_generated: false,
        }
    }

    /// Creates an unsaved line whose amount has not been entered.
    #[must_use]
    pub fn unset(account_id: AccountId, currency: impl Into<String>) -> Self {
        Self {
            amount: None,
            ..Self::new(account_id, currency, Decimal::ZERO)
        }
    }

    /// Creates a balancing line on behalf of the engine.
    #[must_use]
    pub fn system_generated(
        account_id: AccountId,
        currency: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            is_system_generated: true,
            ..Self::new(account_id, currency, amount)
        }
    }

    /// Sets the persisted identifier.
    #[must_use]
    pub fn with_id(mut self, id: LedgerEntryId) -> Self {
        self.id = Some(id);
        self
    }

    /// Replaces the tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Returns true if this line counts as empty under `policy`.
    #[must_use]
    pub fn is_empty(&self, policy: EmptyLinePolicy) -> bool {
        policy.is_empty(self.amount)
    }

    /// Returns the amount, treating an unset amount as zero.
    #[must_use]
    pub fn amount_or_zero(&self) -> Decimal {
        self.amount.unwrap_or(Decimal::ZERO)
    }
}
