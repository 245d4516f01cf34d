//! Report cache data types.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tally_shared::types::{CacheEntryId, OrganizationId};

/// Report parameters: parameter name to JSON value.
pub type ReportParams = serde_json::Map<String, Value>;

/// Kinds of derived reports that can be cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    /// Trial balance.
    TrialBalance,
    /// Balance sheet.
    BalanceSheet,
    /// Income statement.
    IncomeStatement,
    /// Cash flow statement.
    CashFlow,
    /// Per-account ledger listing.
    AccountLedger,
    /// Budget vs. actual variance.
    BudgetVariance,
    /// Balances summarized per currency.
    MultiCurrencySummary,
    /// Report broken down by dimension.
    Dimensional,
}

impl ReportType {
    /// Every cacheable report type.
    pub const ALL: [Self; 8] = [
        Self::TrialBalance,
        Self::BalanceSheet,
        Self::IncomeStatement,
        Self::CashFlow,
        Self::AccountLedger,
        Self::BudgetVariance,
        Self::MultiCurrencySummary,
        Self::Dimensional,
    ];

    /// Returns the stable wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TrialBalance => "trial_balance",
            Self::BalanceSheet => "balance_sheet",
            Self::IncomeStatement => "income_statement",
            Self::CashFlow => "cash_flow",
            Self::AccountLedger => "account_ledger",
            Self::BudgetVariance => "budget_variance",
            Self::MultiCurrencySummary => "multi_currency_summary",
            Self::Dimensional => "dimensional",
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown report type: {s}"))
    }
}

/// Serialization format of a cached result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// JSON document.
    #[default]
    Json,
    /// CSV export.
    Csv,
    /// PDF export.
    Pdf,
}

impl ReportFormat {
    /// Returns the stable wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Pdf => "pdf",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "pdf" => Ok(Self::Pdf),
            _ => Err(format!("Unknown report format: {s}")),
        }
    }
}

/// A report produced by the report-generation collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedReport {
    /// The report payload.
    pub result: Value,
    /// Format tag.
    pub format: ReportFormat,
    /// Serialized length, used for statistics.
    pub size_bytes: u64,
}

impl ComputedReport {
    /// Wraps a JSON payload, measuring its serialized size.
    #[must_use]
    pub fn json(result: Value) -> Self {
        let size_bytes = serde_json::to_vec(&result)
            .map_or(0, |bytes| u64::try_from(bytes.len()).unwrap_or(u64::MAX));
        Self {
            result,
            format: ReportFormat::Json,
            size_bytes,
        }
    }
}

/// One memoized report.
///
/// `signature` is derived from `report_type` and `parameters` and is never
/// set independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportCacheEntry {
    /// Entry identifier.
    pub id: CacheEntryId,
    /// Organization that owns the entry.
    pub owner_id: OrganizationId,
    /// Canonical signature of type and parameters.
    pub signature: String,
    /// Report type.
    pub report_type: ReportType,
    /// Parameters the report was computed with.
    pub parameters: ReportParams,
    /// Cached payload.
    pub result: Value,
    /// Payload format.
    pub format: ReportFormat,
    /// Payload size in bytes.
    pub size_bytes: u64,
    /// Creation time, strictly increasing per store.
    pub created_at: DateTime<Utc>,
    /// Expiry time, `None` for entries that never expire.
    pub expires_at: Option<DateTime<Utc>>,
}

impl ReportCacheEntry {
    /// Returns true if the entry has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// Entries a statistics or listing call covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheScope {
    /// Entries owned by one organization.
    Owner(OrganizationId),
    /// Every entry.
    All,
}

impl CacheScope {
    /// Returns true if `entry` falls inside this scope.
    #[must_use]
    pub fn contains(&self, entry: &ReportCacheEntry) -> bool {
        match self {
            Self::Owner(owner) => entry.owner_id == *owner,
            Self::All => true,
        }
    }
}

/// Predicate for bulk deletes. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheFilter {
    /// Restrict to one owner.
    pub owner_id: Option<OrganizationId>,
    /// Restrict to one report type.
    pub report_type: Option<ReportType>,
    /// Restrict to entries with `expires_at <= expired_at`.
    pub expired_at: Option<DateTime<Utc>>,
}

impl CacheFilter {
    /// Every entry of an owner, optionally of a single type.
    #[must_use]
    pub fn owner(owner_id: OrganizationId, report_type: Option<ReportType>) -> Self {
        Self::scoped(CacheScope::Owner(owner_id), report_type)
    }

    /// Every entry inside `scope`, optionally of a single type.
    #[must_use]
    pub fn scoped(scope: CacheScope, report_type: Option<ReportType>) -> Self {
        let owner_id = match scope {
            CacheScope::Owner(owner_id) => Some(owner_id),
            CacheScope::All => None,
        };
        Self {
            owner_id,
            report_type,
            expired_at: None,
        }
    }

    /// Every entry that has expired at `now`.
    #[must_use]
    pub fn expired(now: DateTime<Utc>) -> Self {
        Self {
            expired_at: Some(now),
            ..Self::default()
        }
    }

    /// Returns true if `entry` matches the filter.
    #[must_use]
    pub fn matches(&self, entry: &ReportCacheEntry) -> bool {
        self.owner_id.is_none_or(|owner| entry.owner_id == owner)
            && self.report_type.is_none_or(|t| entry.report_type == t)
            && self.expired_at.is_none_or(|now| entry.is_expired_at(now))
    }
}

/// Aggregate for one report type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeStats {
    /// Number of entries.
    pub count: u64,
    /// Sum of payload sizes.
    pub size_bytes: u64,
}

/// Cache statistics over a scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of entries, expired or not.
    pub total_cached: u64,
    /// Sum of payload sizes.
    pub total_size_bytes: u64,
    /// Breakdown by report type.
    pub by_type: BTreeMap<ReportType, TypeStats>,
}

impl CacheStats {
    /// Aggregates statistics over `entries`.
    #[must_use]
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a ReportCacheEntry>) -> Self {
        let mut stats = Self::default();
        for entry in entries {
            stats.total_cached += 1;
            stats.total_size_bytes += entry.size_bytes;
            let by_type = stats.by_type.entry(entry.report_type).or_default();
            by_type.count += 1;
            by_type.size_bytes += entry.size_bytes;
        }
        stats
    }
}
