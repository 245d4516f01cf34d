//! In-memory report cache backend.
//!
//! Entries are indexed by `(owner, signature)` in creation order and by
//! expiry time, so sweeps only touch expired entries. Each mutation happens
//! under a single write lock.

use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tally_shared::types::{CacheEntryId, OrganizationId};

use super::backend::ReportCacheBackend;
use super::error::CacheError;
use super::types::{CacheFilter, CacheScope, ReportCacheEntry, ReportType};

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<CacheEntryId, ReportCacheEntry>,
    by_signature: HashMap<(OrganizationId, String), Vec<CacheEntryId>>,
    expiry: BTreeSet<(DateTime<Utc>, CacheEntryId)>,
}

impl Inner {
    fn remove(&mut self, id: CacheEntryId) -> bool {
        let Some(entry) = self.entries.remove(&id) else {
            return false;
        };

        let key = (entry.owner_id, entry.signature);
        if let Some(ids) = self.by_signature.get_mut(&key) {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                self.by_signature.remove(&key);
            }
        }
        if let Some(expires_at) = entry.expires_at {
            self.expiry.remove(&(expires_at, id));
        }
        true
    }

    fn expired_ids(&self, now: DateTime<Utc>) -> Vec<CacheEntryId> {
        self.expiry
            .iter()
            .take_while(|(expires_at, _)| *expires_at <= now)
            .map(|(_, id)| *id)
            .collect()
    }
}

/// Report cache backend kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryReportCache {
    inner: RwLock<Inner>,
}

impl InMemoryReportCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn len(&self) -> Result<usize, CacheError> {
        Ok(self.read()?.entries.len())
    }

    /// Returns true if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, CacheError> {
        self.inner
            .read()
            .map_err(|_| CacheError::Unavailable("in-memory cache lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, CacheError> {
        self.inner
            .write()
            .map_err(|_| CacheError::Unavailable("in-memory cache lock poisoned".to_string()))
    }
}

fn newest_first(entries: &mut [ReportCacheEntry]) {
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

impl ReportCacheBackend for InMemoryReportCache {
    async fn find_matching(
        &self,
        owner_id: OrganizationId,
        report_type: ReportType,
        signature: &str,
    ) -> Result<Vec<ReportCacheEntry>, CacheError> {
        let inner = self.read()?;
        let mut found: Vec<ReportCacheEntry> = inner
            .by_signature
            .get(&(owner_id, signature.to_string()))
            .into_iter()
            .flatten()
            .filter_map(|id| inner.entries.get(id))
            .filter(|entry| entry.report_type == report_type)
            .cloned()
            .collect();
        newest_first(&mut found);
        Ok(found)
    }

    async fn insert(&self, entry: ReportCacheEntry) -> Result<ReportCacheEntry, CacheError> {
        let mut inner = self.write()?;
        inner
            .by_signature
            .entry((entry.owner_id, entry.signature.clone()))
            .or_default()
            .push(entry.id);
        if let Some(expires_at) = entry.expires_at {
            inner.expiry.insert((expires_at, entry.id));
        }
        inner.entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn delete_where(&self, filter: CacheFilter) -> Result<u64, CacheError> {
        let mut inner = self.write()?;

        let ids: Vec<CacheEntryId> = match filter.expired_at {
            Some(now) => inner
                .expired_ids(now)
                .into_iter()
                .filter(|id| inner.entries.get(id).is_some_and(|e| filter.matches(e)))
                .collect(),
            None => inner
                .entries
                .values()
                .filter(|entry| filter.matches(entry))
                .map(|entry| entry.id)
                .collect(),
        };

        let removed = ids.into_iter().filter(|id| inner.remove(*id)).count();
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }

    async fn find_all(&self, scope: CacheScope) -> Result<Vec<ReportCacheEntry>, CacheError> {
        let inner = self.read()?;
        let mut found: Vec<ReportCacheEntry> = inner
            .entries
            .values()
            .filter(|entry| scope.contains(entry))
            .cloned()
            .collect();
        newest_first(&mut found);
        Ok(found)
    }
}
