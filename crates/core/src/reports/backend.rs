//! Persistence seam for the report cache.

use std::future::Future;

use tally_shared::types::OrganizationId;

use super::error::CacheError;
use super::types::{CacheFilter, CacheScope, ReportCacheEntry, ReportType};

/// Storage for cached report entries.
///
/// Implemented by the db crate for PostgreSQL and by
/// [`InMemoryReportCache`](super::InMemoryReportCache). Implementations must
/// make `insert` and `delete_where` atomic with respect to each other, so a
/// sweep never observes a partially written entry.
pub trait ReportCacheBackend: Send + Sync {
    /// Entries of an owner with the given type and signature, newest first.
    ///
    /// Expired entries may be included; the caller filters them.
    fn find_matching(
        &self,
        owner_id: OrganizationId,
        report_type: ReportType,
        signature: &str,
    ) -> impl Future<Output = Result<Vec<ReportCacheEntry>, CacheError>> + Send;

    /// Stores a new entry. Never overwrites an existing one.
    fn insert(
        &self,
        entry: ReportCacheEntry,
    ) -> impl Future<Output = Result<ReportCacheEntry, CacheError>> + Send;

    /// Deletes every entry matching `filter`, returning how many were removed.
    fn delete_where(
        &self,
        filter: CacheFilter,
    ) -> impl Future<Output = Result<u64, CacheError>> + Send;

    /// Every entry inside `scope`, expired or not.
    fn find_all(
        &self,
        scope: CacheScope,
    ) -> impl Future<Output = Result<Vec<ReportCacheEntry>, CacheError>> + Send;
}
