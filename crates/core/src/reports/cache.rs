//! Report memoization keyed by canonical request signatures.
//!
//! The store is append-only: `put` never replaces an earlier entry with the
//! same signature, `get` returns the newest live one. Expired entries stop
//! being served immediately and are physically removed by `sweep_expired`.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, TimeDelta, Utc};
use tally_shared::CacheConfig;
use tally_shared::types::{CacheEntryId, OrganizationId};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::backend::ReportCacheBackend;
use super::clock::{Clock, SystemClock};
use super::error::CacheError;
use super::signature::{params_equal, signature_of};
use super::types::{
    CacheFilter, CacheScope, CacheStats, ComputedReport, ReportCacheEntry, ReportParams,
    ReportType,
};

/// Default time-to-live for entries stored through `get_or_compute` (24 hours).
const DEFAULT_TTL_SECS: i64 = 86_400;

/// Result of [`ReportCacheStore::get_or_compute`].
#[derive(Debug, Clone, PartialEq)]
pub struct CachedReport {
    /// The served entry.
    pub entry: ReportCacheEntry,
    /// True if the entry came from the cache rather than a fresh computation.
    pub cached: bool,
}

/// Memoization layer for expensive report computations.
pub struct ReportCacheStore<B> {
    backend: Arc<B>,
    clock: Arc<dyn Clock>,
    default_ttl: TimeDelta,
    last_created_micros: AtomicI64,
}

impl<B: ReportCacheBackend> ReportCacheStore<B> {
    /// Creates a store on the wall clock with a 24 hour default TTL.
    #[must_use]
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            clock: Arc::new(SystemClock),
            default_ttl: TimeDelta::seconds(DEFAULT_TTL_SECS),
            last_created_micros: AtomicI64::new(i64::MIN),
        }
    }

    /// Creates a store using the configured default TTL.
    #[must_use]
    pub fn from_config(backend: Arc<B>, config: &CacheConfig) -> Self {
        let secs = i64::try_from(config.default_ttl_secs).unwrap_or(i64::MAX);
        Self::new(backend).with_default_ttl(TimeDelta::try_seconds(secs).unwrap_or(TimeDelta::MAX))
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the default TTL used by `get_or_compute`.
    #[must_use]
    pub fn with_default_ttl(mut self, ttl: TimeDelta) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Returns the default TTL.
    #[must_use]
    pub fn default_ttl(&self) -> TimeDelta {
        self.default_ttl
    }

    /// Returns the backing store.
    #[must_use]
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Computes the canonical signature of a request.
    #[must_use]
    pub fn signature_of(report_type: ReportType, parameters: &ReportParams) -> String {
        signature_of(report_type, parameters)
    }

    /// Looks up the newest live entry for a request.
    ///
    /// A hit needs the same report type, value-equal parameters and an
    /// expiry that is absent or still in the future.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend fails.
    pub async fn get(
        &self,
        owner_id: OrganizationId,
        report_type: ReportType,
        parameters: &ReportParams,
    ) -> Result<Option<ReportCacheEntry>, CacheError> {
        let signature = signature_of(report_type, parameters);
        let mut candidates = self
            .backend
            .find_matching(owner_id, report_type, &signature)
            .await?;
        candidates.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let now = self.clock.now();
        let hit = candidates.into_iter().find(|entry| {
            entry.report_type == report_type
                && params_equal(&entry.parameters, parameters)
                && !entry.is_expired_at(now)
        });

        match &hit {
            Some(entry) => debug!(%owner_id, %report_type, entry_id = %entry.id, "report cache hit"),
            None => debug!(%owner_id, %report_type, "report cache miss"),
        }
        Ok(hit)
    }

    /// Stores a computed report. `ttl = None` stores it without expiry.
    ///
    /// Always appends a new entry, even if one with the same signature exists.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend fails.
    pub async fn put(
        &self,
        owner_id: OrganizationId,
        report_type: ReportType,
        parameters: ReportParams,
        report: ComputedReport,
        ttl: Option<TimeDelta>,
    ) -> Result<ReportCacheEntry, CacheError> {
        let created_at = self.next_created_at();
        let expires_at = ttl.map(|ttl| {
            created_at
                .checked_add_signed(ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        });

        let entry = ReportCacheEntry {
            id: CacheEntryId::new(),
            owner_id,
            signature: signature_of(report_type, &parameters),
            report_type,
            parameters,
            result: report.result,
            format: report.format,
            size_bytes: report.size_bytes,
            created_at,
            expires_at,
        };

        let stored = self.backend.insert(entry).await?;
        debug!(
            %owner_id,
            %report_type,
            entry_id = %stored.id,
            size_bytes = stored.size_bytes,
            "report cached"
        );
        Ok(stored)
    }

    /// Serves a request from the cache, computing and storing it on a miss.
    ///
    /// Fresh results are stored with the default TTL.
    ///
    /// # Errors
    ///
    /// Returns the computation's error, or a cache error converted into `E`.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        owner_id: OrganizationId,
        report_type: ReportType,
        parameters: ReportParams,
        compute: F,
    ) -> Result<CachedReport, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ComputedReport, E>>,
        E: From<CacheError>,
    {
        if let Some(entry) = self.get(owner_id, report_type, &parameters).await? {
            return Ok(CachedReport {
                entry,
                cached: true,
            });
        }

        let report = compute().await?;
        let entry = self
            .put(owner_id, report_type, parameters, report, Some(self.default_ttl))
            .await?;
        Ok(CachedReport {
            entry,
            cached: false,
        })
    }

    /// Deletes an owner's entries of one report type, or all of them.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend fails.
    pub async fn invalidate(
        &self,
        owner_id: OrganizationId,
        report_type: Option<ReportType>,
    ) -> Result<u64, CacheError> {
        self.invalidate_scope(CacheScope::Owner(owner_id), report_type)
            .await
    }

    /// Deletes the entries of one report type, or all of them, inside `scope`.
    ///
    /// `CacheScope::All` reaches every owner.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend fails.
    pub async fn invalidate_scope(
        &self,
        scope: CacheScope,
        report_type: Option<ReportType>,
    ) -> Result<u64, CacheError> {
        let removed = self
            .backend
            .delete_where(CacheFilter::scoped(scope, report_type))
            .await?;
        info!(
            ?scope,
            report_type = report_type.map_or("all", ReportType::as_str),
            removed,
            "report cache invalidated"
        );
        Ok(removed)
    }

    /// Deletes every entry whose expiry has passed. Entries without expiry
    /// are kept.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend fails.
    pub async fn sweep_expired(&self) -> Result<u64, CacheError> {
        let now = self.clock.now();
        let removed = self.backend.delete_where(CacheFilter::expired(now)).await?;
        debug!(removed, "swept expired report cache entries");
        Ok(removed)
    }

    /// Aggregates entry count and size over a scope.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend fails.
    pub async fn stats(&self, scope: CacheScope) -> Result<CacheStats, CacheError> {
        let entries = self.backend.find_all(scope).await?;
        Ok(CacheStats::from_entries(&entries))
    }

    /// Creation timestamps strictly increase, even if the clock stalls or
    /// steps backwards.
    fn next_created_at(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        let now_micros = now.timestamp_micros();
        let previous = self
            .last_created_micros
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now_micros.max(last.saturating_add(1)))
            })
            .unwrap_or(now_micros);
        let micros = now_micros.max(previous.saturating_add(1));
        DateTime::from_timestamp_micros(micros).unwrap_or(now)
    }
}

impl<B: ReportCacheBackend + 'static> ReportCacheStore<B> {
    /// Runs `sweep_expired` every `interval` until the task is aborted.
    ///
    /// Sweep failures are logged and retried on the next tick.
    #[must_use]
    pub fn spawn_sweeper(self: &Arc<Self>, interval: std::time::Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match store.sweep_expired().await {
                    Ok(0) => {}
                    Ok(removed) => info!(removed, "report cache sweep"),
                    Err(err) => warn!(error = %err, "report cache sweep failed"),
                }
            }
        })
    }
}
