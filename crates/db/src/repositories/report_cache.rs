//! Report cache repository for database operations.
//!
//! Implements [`ReportCacheBackend`] on the `report_cache` table. Every
//! operation is a single statement, so an insert and a sweep never see each
//! other half-done.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde_json::Value;
use tally_core::reports::{
    CacheError, CacheFilter, CacheScope, ReportCacheBackend, ReportCacheEntry, ReportType,
};
use tally_shared::types::{CacheEntryId, OrganizationId};
use tracing::error;

use crate::entities::report_cache;

/// Report cache repository backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct ReportCacheRepository {
    db: DatabaseConnection,
}

impl ReportCacheRepository {
    /// Creates a new report cache repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn unavailable(err: DbErr) -> CacheError {
    error!(error = %err, "report cache query failed");
    CacheError::Unavailable(err.to_string())
}

fn to_entry(model: report_cache::Model) -> Result<ReportCacheEntry, CacheError> {
    let report_type = model
        .report_type
        .parse()
        .map_err(|e: String| CacheError::Corrupt(format!("entry {}: {e}", model.id)))?;
    let format = model
        .format
        .parse()
        .map_err(|e: String| CacheError::Corrupt(format!("entry {}: {e}", model.id)))?;
    let Value::Object(parameters) = model.parameters else {
        return Err(CacheError::Corrupt(format!(
            "entry {}: parameters are not an object",
            model.id
        )));
    };
    let size_bytes = u64::try_from(model.size_bytes)
        .map_err(|_| CacheError::Corrupt(format!("entry {}: negative size", model.id)))?;

    Ok(ReportCacheEntry {
        id: CacheEntryId::from_uuid(model.id),
        owner_id: OrganizationId::from_uuid(model.owner_id),
        signature: model.signature,
        report_type,
        parameters,
        result: model.result,
        format,
        size_bytes,
        created_at: model.created_at.to_utc(),
        expires_at: model.expires_at.map(|t| t.to_utc()),
    })
}

fn to_entries(models: Vec<report_cache::Model>) -> Result<Vec<ReportCacheEntry>, CacheError> {
    models.into_iter().map(to_entry).collect()
}

impl ReportCacheBackend for ReportCacheRepository {
    async fn find_matching(
        &self,
        owner_id: OrganizationId,
        report_type: ReportType,
        signature: &str,
    ) -> Result<Vec<ReportCacheEntry>, CacheError> {
        let models = report_cache::Entity::find()
            .filter(report_cache::Column::OwnerId.eq(owner_id.into_inner()))
            .filter(report_cache::Column::ReportType.eq(report_type.as_str()))
            .filter(report_cache::Column::Signature.eq(signature))
            .order_by_desc(report_cache::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(unavailable)?;

        to_entries(models)
    }

    async fn insert(&self, entry: ReportCacheEntry) -> Result<ReportCacheEntry, CacheError> {
        let size_bytes = i64::try_from(entry.size_bytes)
            .map_err(|_| CacheError::Corrupt(format!("entry {}: size overflows", entry.id)))?;

        let model = report_cache::ActiveModel {
            id: Set(entry.id.into_inner()),
            owner_id: Set(entry.owner_id.into_inner()),
            signature: Set(entry.signature.clone()),
            report_type: Set(entry.report_type.as_str().to_string()),
            parameters: Set(Value::Object(entry.parameters.clone())),
            result: Set(entry.result.clone()),
            format: Set(entry.format.as_str().to_string()),
            size_bytes: Set(size_bytes),
            created_at: Set(entry.created_at.into()),
            expires_at: Set(entry.expires_at.map(Into::into)),
        };
        model.insert(&self.db).await.map_err(unavailable)?;

        Ok(entry)
    }

    async fn delete_where(&self, filter: CacheFilter) -> Result<u64, CacheError> {
        let mut query = report_cache::Entity::delete_many();
        if let Some(owner_id) = filter.owner_id {
            query = query.filter(report_cache::Column::OwnerId.eq(owner_id.into_inner()));
        }
        if let Some(report_type) = filter.report_type {
            query = query.filter(report_cache::Column::ReportType.eq(report_type.as_str()));
        }
        if let Some(now) = filter.expired_at {
            // NULL expiry never compares true, so permanent entries stay
            query = query.filter(report_cache::Column::ExpiresAt.lte(now));
        }

        let result = query.exec(&self.db).await.map_err(unavailable)?;
        Ok(result.rows_affected)
    }

    async fn find_all(&self, scope: CacheScope) -> Result<Vec<ReportCacheEntry>, CacheError> {
        let mut query = report_cache::Entity::find();
        if let CacheScope::Owner(owner_id) = scope {
            query = query.filter(report_cache::Column::OwnerId.eq(owner_id.into_inner()));
        }

        let models = query
            .order_by_desc(report_cache::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(unavailable)?;

        to_entries(models)
    }
}
