//! Partitioning of journal lines by currency.

use std::collections::HashMap;

use rust_decimal::Decimal;

use super::types::JournalLine;

/// The lines of one currency and their exact signed sum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyGroup {
    /// Currency code, verbatim from the lines.
    pub currency: String,
    /// Indices into the grouped line sequence, in input order.
    pub indices: Vec<usize>,
    /// Signed sum of the group's amounts (unset amounts count as zero).
    pub sum: Decimal,
    /// True if the exact sum overflows or cannot be represented without
    /// rounding.
    ///
    /// An inexact sum is never trusted as balanced. The flag depends only on
    /// the group's amounts, not on their order.
    pub inexact: bool,
}

impl CurrencyGroup {
    fn new(currency: &str) -> Self {
        Self {
            currency: currency.to_string(),
            indices: Vec::new(),
            sum: Decimal::ZERO,
            inexact: false,
        }
    }

    fn total(&mut self, lines: &[JournalLine]) {
        let mut amounts: Vec<Decimal> = self
            .indices
            .iter()
            .map(|&index| lines[index].amount_or_zero())
            .collect();

        if let Some(sum) = exact_sum(&amounts) {
            self.sum = sum;
            return;
        }

        // Best effort in a fixed order so the reported sum does not depend on line order
        amounts.sort_unstable();
        self.sum = amounts
            .into_iter()
            .fold(Decimal::ZERO, Decimal::saturating_add);
        self.inexact = true;
    }
}

/// Sums `amounts` without rounding.
///
/// Mantissas are aligned to the largest scale and added as `i128`, positives
/// and negatives separately, so the outcome does not depend on input order.
/// Returns `None` if the exact total does not fit a `Decimal`.
fn exact_sum(amounts: &[Decimal]) -> Option<Decimal> {
    let scale = amounts.iter().map(Decimal::scale).max().unwrap_or(0);

    let mut credits: i128 = 0;
    let mut debits: i128 = 0;
    for amount in amounts {
        let factor = 10_i128.checked_pow(scale - amount.scale())?;
        let mantissa = amount.mantissa().checked_mul(factor)?;
        if mantissa < 0 {
            credits = credits.checked_add(mantissa)?;
        } else {
            debits = debits.checked_add(mantissa)?;
        }
    }

    let mut mantissa = debits.checked_add(credits)?;
    let mut scale = scale;
    loop {
        if let Ok(sum) = Decimal::try_from_i128_with_scale(mantissa, scale) {
            return Some(sum);
        }
        // Trailing zeros can be dropped without losing anything
        if scale == 0 || mantissa % 10 != 0 {
            return None;
        }
        mantissa /= 10;
        scale -= 1;
    }
}

/// Currency groups keyed by currency code, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrencyGroups {
    groups: Vec<CurrencyGroup>,
    positions: HashMap<String, usize>,
}

impl CurrencyGroups {
    /// Returns the group for a currency code.
    #[must_use]
    pub fn get(&self, currency: &str) -> Option<&CurrencyGroup> {
        self.positions.get(currency).map(|&pos| &self.groups[pos])
    }

    /// Iterates groups in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &CurrencyGroup> {
        self.groups.iter()
    }

    /// Currency codes in first-seen order.
    pub fn currencies(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|group| group.currency.as_str())
    }

    /// Number of distinct currencies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns true if no lines were grouped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl<'a> IntoIterator for &'a CurrencyGroups {
    type Item = &'a CurrencyGroup;
    type IntoIter = std::slice::Iter<'a, CurrencyGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}

/// Groups journal lines by currency code.
pub struct CurrencyGrouper;

impl CurrencyGrouper {
    /// Partitions `lines` by currency, preserving first-seen order.
    ///
    /// Currency codes are compared verbatim, so `"usd"` and `"USD"` form
    /// separate groups. Sums are exact and independent of line order.
    #[must_use]
    pub fn group(lines: &[JournalLine]) -> CurrencyGroups {
        let mut groups = CurrencyGroups::default();

        for (index, line) in lines.iter().enumerate() {
            let pos = match groups.positions.get(line.currency.as_str()) {
                Some(&pos) => pos,
                None => {
                    groups.groups.push(CurrencyGroup::new(&line.currency));
                    let pos = groups.groups.len() - 1;
                    groups.positions.insert(line.currency.clone(), pos);
                    pos
                }
            };
            groups.groups[pos].indices.push(index);
        }

        for group in &mut groups.groups {
            group.total(lines);
        }

        groups
    }
}
