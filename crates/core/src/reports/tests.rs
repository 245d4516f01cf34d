//! Tests for the report cache store.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::{Value, json};
use tally_shared::AppError;
use tally_shared::types::OrganizationId;

use super::*;

fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_704_067_200, 0).unwrap()
}

fn params(value: Value) -> ReportParams {
    match value {
        Value::Object(map) => map,
        _ => panic!("params must be an object"),
    }
}

fn store() -> (ReportCacheStore<InMemoryReportCache>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(t0()));
    let store = ReportCacheStore::new(Arc::new(InMemoryReportCache::new()))
        .with_clock(clock.clone());
    (store, clock)
}

/// Backend whose every call fails.
struct FailingBackend;

impl ReportCacheBackend for FailingBackend {
    async fn find_matching(
        &self,
        _owner_id: OrganizationId,
        _report_type: ReportType,
        _signature: &str,
    ) -> Result<Vec<ReportCacheEntry>, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn insert(&self, _entry: ReportCacheEntry) -> Result<ReportCacheEntry, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn delete_where(&self, _filter: CacheFilter) -> Result<u64, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn find_all(&self, _scope: CacheScope) -> Result<Vec<ReportCacheEntry>, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }
}

#[tokio::test]
async fn test_put_then_get_hits() {
    let (store, _clock) = store();
    let owner = OrganizationId::new();
    let p = params(json!({"as_of": "2024-01-31"}));

    let stored = store
        .put(
            owner,
            ReportType::TrialBalance,
            p.clone(),
            ComputedReport::json(json!({"total": "0"})),
            Some(TimeDelta::hours(1)),
        )
        .await
        .unwrap();

    assert_eq!(stored.signature, r#"trial_balance?"as_of"="2024-01-31""#);
    assert_eq!(stored.expires_at, Some(stored.created_at + TimeDelta::hours(1)));

    let hit = store.get(owner, ReportType::TrialBalance, &p).await.unwrap();
    assert_eq!(hit, Some(stored));
}

#[tokio::test]
async fn test_balance_sheet_hit_with_reordered_parameters() {
    let (store, clock) = store();
    let owner = OrganizationId::new();

    let mut stored_params = ReportParams::new();
    stored_params.insert("as_of".into(), json!("2024-01-01"));
    stored_params.insert("currency".into(), json!("USD"));
    let result = json!({"assets": "1500.00", "liabilities": "900.00"});

    store
        .put(
            owner,
            ReportType::BalanceSheet,
            stored_params,
            ComputedReport::json(result.clone()),
            Some(TimeDelta::hours(24)),
        )
        .await
        .unwrap();

    let mut lookup = ReportParams::new();
    lookup.insert("currency".into(), json!("USD"));
    lookup.insert("as_of".into(), json!("2024-01-01"));

    clock.advance(TimeDelta::hours(23));
    let hit = store
        .get(owner, ReportType::BalanceSheet, &lookup)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hit.result, result);
}

#[tokio::test]
async fn test_get_ignores_parameter_order() {
    let (store, _clock) = store();
    let owner = OrganizationId::new();

    let mut forward = ReportParams::new();
    forward.insert("a".into(), json!(1));
    forward.insert("b".into(), json!(2));
    let mut backward = ReportParams::new();
    backward.insert("b".into(), json!(2));
    backward.insert("a".into(), json!(1));

    store
        .put(
            owner,
            ReportType::BalanceSheet,
            forward,
            ComputedReport::json(json!([])),
            None,
        )
        .await
        .unwrap();

    let hit = store
        .get(owner, ReportType::BalanceSheet, &backward)
        .await
        .unwrap();
    assert!(hit.is_some());
}

#[tokio::test]
async fn test_get_misses_other_type_params_and_owner() {
    let (store, _clock) = store();
    let owner = OrganizationId::new();
    let p = params(json!({"as_of": "2024-01-31"}));

    store
        .put(
            owner,
            ReportType::BalanceSheet,
            p.clone(),
            ComputedReport::json(json!({})),
            None,
        )
        .await
        .unwrap();

    assert!(store.get(owner, ReportType::IncomeStatement, &p).await.unwrap().is_none());
    let other_params = params(json!({"as_of": "2024-02-29"}));
    assert!(
        store
            .get(owner, ReportType::BalanceSheet, &other_params)
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        store
            .get(OrganizationId::new(), ReportType::BalanceSheet, &p)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_expired_entry_is_not_served() {
    let (store, clock) = store();
    let owner = OrganizationId::new();
    let p = params(json!({"year": 2024}));

    store
        .put(
            owner,
            ReportType::CashFlow,
            p.clone(),
            ComputedReport::json(json!({})),
            Some(TimeDelta::minutes(10)),
        )
        .await
        .unwrap();

    clock.advance(TimeDelta::minutes(9));
    assert!(store.get(owner, ReportType::CashFlow, &p).await.unwrap().is_some());

    // Expiry is inclusive: served strictly before expires_at only.
    clock.advance(TimeDelta::minutes(1));
    assert!(store.get(owner, ReportType::CashFlow, &p).await.unwrap().is_none());
}

#[tokio::test]
async fn test_zero_ttl_is_immediately_expired() {
    let (store, _clock) = store();
    let owner = OrganizationId::new();
    let p = ReportParams::new();

    store
        .put(
            owner,
            ReportType::TrialBalance,
            p.clone(),
            ComputedReport::json(json!({})),
            Some(TimeDelta::zero()),
        )
        .await
        .unwrap();

    assert!(store.get(owner, ReportType::TrialBalance, &p).await.unwrap().is_none());
}

#[tokio::test]
async fn test_newest_entry_wins() {
    let (store, clock) = store();
    let owner = OrganizationId::new();
    let p = params(json!({"as_of": "2024-01-31"}));

    store
        .put(
            owner,
            ReportType::TrialBalance,
            p.clone(),
            ComputedReport::json(json!({"version": 1})),
            None,
        )
        .await
        .unwrap();
    clock.advance(TimeDelta::seconds(1));
    store
        .put(
            owner,
            ReportType::TrialBalance,
            p.clone(),
            ComputedReport::json(json!({"version": 2})),
            None,
        )
        .await
        .unwrap();

    let hit = store
        .get(owner, ReportType::TrialBalance, &p)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hit.result, json!({"version": 2}));
    assert_eq!(store.backend().len().unwrap(), 2);
}

#[tokio::test]
async fn test_created_at_strictly_increases_on_frozen_clock() {
    let (store, _clock) = store();
    let owner = OrganizationId::new();
    let p = ReportParams::new();

    let first = store
        .put(
            owner,
            ReportType::AccountLedger,
            p.clone(),
            ComputedReport::json(json!({"version": 1})),
            None,
        )
        .await
        .unwrap();
    let second = store
        .put(
            owner,
            ReportType::AccountLedger,
            p.clone(),
            ComputedReport::json(json!({"version": 2})),
            None,
        )
        .await
        .unwrap();

    assert!(second.created_at > first.created_at);
    let hit = store
        .get(owner, ReportType::AccountLedger, &p)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hit.id, second.id);
}

#[tokio::test]
async fn test_newer_expired_entry_falls_back_to_older_live_one() {
    let (store, clock) = store();
    let owner = OrganizationId::new();
    let p = ReportParams::new();

    let older = store
        .put(
            owner,
            ReportType::BudgetVariance,
            p.clone(),
            ComputedReport::json(json!({"version": 1})),
            None,
        )
        .await
        .unwrap();
    store
        .put(
            owner,
            ReportType::BudgetVariance,
            p.clone(),
            ComputedReport::json(json!({"version": 2})),
            Some(TimeDelta::minutes(1)),
        )
        .await
        .unwrap();

    clock.advance(TimeDelta::minutes(2));
    let hit = store
        .get(owner, ReportType::BudgetVariance, &p)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hit.id, older.id);
}

#[tokio::test]
async fn test_invalidate_single_type() {
    let (store, _clock) = store();
    let owner = OrganizationId::new();
    let other = OrganizationId::new();
    let p = ReportParams::new();

    for (org, report_type) in [
        (owner, ReportType::BalanceSheet),
        (owner, ReportType::IncomeStatement),
        (other, ReportType::BalanceSheet),
    ] {
        store
            .put(org, report_type, p.clone(), ComputedReport::json(json!({})), None)
            .await
            .unwrap();
    }

    let removed = store
        .invalidate(owner, Some(ReportType::BalanceSheet))
        .await
        .unwrap();
    assert_eq!(removed, 1);

    assert!(store.get(owner, ReportType::BalanceSheet, &p).await.unwrap().is_none());
    assert!(store.get(owner, ReportType::IncomeStatement, &p).await.unwrap().is_some());
    assert!(store.get(other, ReportType::BalanceSheet, &p).await.unwrap().is_some());
}

#[tokio::test]
async fn test_invalidate_all_types() {
    let (store, _clock) = store();
    let owner = OrganizationId::new();
    let other = OrganizationId::new();
    let p = ReportParams::new();

    for report_type in [ReportType::TrialBalance, ReportType::Dimensional] {
        store
            .put(owner, report_type, p.clone(), ComputedReport::json(json!({})), None)
            .await
            .unwrap();
    }
    store
        .put(other, ReportType::TrialBalance, p.clone(), ComputedReport::json(json!({})), None)
        .await
        .unwrap();

    assert_eq!(store.invalidate(owner, None).await.unwrap(), 2);
    assert_eq!(store.invalidate(owner, None).await.unwrap(), 0);

    let stats = store.stats(CacheScope::All).await.unwrap();
    assert_eq!(stats.total_cached, 1);
}

#[tokio::test]
async fn test_invalidate_type_across_all_owners() {
    let (store, _clock) = store();
    let first = OrganizationId::new();
    let second = OrganizationId::new();
    let p = ReportParams::new();

    for (org, report_type) in [
        (first, ReportType::BalanceSheet),
        (second, ReportType::BalanceSheet),
        (second, ReportType::CashFlow),
    ] {
        store
            .put(org, report_type, p.clone(), ComputedReport::json(json!({})), None)
            .await
            .unwrap();
    }

    let removed = store
        .invalidate_scope(CacheScope::All, Some(ReportType::BalanceSheet))
        .await
        .unwrap();
    assert_eq!(removed, 2);
    assert!(store.get(second, ReportType::CashFlow, &p).await.unwrap().is_some());

    assert_eq!(store.invalidate_scope(CacheScope::All, None).await.unwrap(), 1);
    assert!(store.backend().is_empty().unwrap());
}

#[tokio::test]
async fn test_sweep_removes_expired_and_keeps_permanent() {
    let (store, clock) = store();
    let owner = OrganizationId::new();

    store
        .put(
            owner,
            ReportType::CashFlow,
            params(json!({"n": 1})),
            ComputedReport::json(json!({})),
            Some(TimeDelta::minutes(5)),
        )
        .await
        .unwrap();
    store
        .put(
            owner,
            ReportType::CashFlow,
            params(json!({"n": 2})),
            ComputedReport::json(json!({})),
            Some(TimeDelta::hours(2)),
        )
        .await
        .unwrap();
    store
        .put(
            owner,
            ReportType::CashFlow,
            params(json!({"n": 3})),
            ComputedReport::json(json!({})),
            None,
        )
        .await
        .unwrap();

    assert_eq!(store.sweep_expired().await.unwrap(), 0);

    clock.advance(TimeDelta::hours(1));
    assert_eq!(store.sweep_expired().await.unwrap(), 1);

    clock.advance(TimeDelta::days(365));
    assert_eq!(store.sweep_expired().await.unwrap(), 1);
    assert_eq!(store.backend().len().unwrap(), 1);

    let permanent = store
        .get(owner, ReportType::CashFlow, &params(json!({"n": 3})))
        .await
        .unwrap();
    assert!(permanent.is_some());
}

#[tokio::test]
async fn test_stats_by_scope_and_type() {
    let (store, clock) = store();
    let owner = OrganizationId::new();
    let other = OrganizationId::new();

    let sized = |size_bytes| ComputedReport {
        result: json!({}),
        format: ReportFormat::Json,
        size_bytes,
    };

    store
        .put(owner, ReportType::TrialBalance, params(json!({"n": 1})), sized(100), None)
        .await
        .unwrap();
    store
        .put(
            owner,
            ReportType::TrialBalance,
            params(json!({"n": 2})),
            sized(50),
            Some(TimeDelta::minutes(1)),
        )
        .await
        .unwrap();
    store
        .put(owner, ReportType::BalanceSheet, ReportParams::new(), sized(25), None)
        .await
        .unwrap();
    store
        .put(other, ReportType::BalanceSheet, ReportParams::new(), sized(1000), None)
        .await
        .unwrap();

    // Expired but not yet swept entries still count.
    clock.advance(TimeDelta::minutes(5));

    let stats = store.stats(CacheScope::Owner(owner)).await.unwrap();
    assert_eq!(stats.total_cached, 3);
    assert_eq!(stats.total_size_bytes, 175);
    assert_eq!(
        stats.by_type[&ReportType::TrialBalance],
        TypeStats {
            count: 2,
            size_bytes: 150
        }
    );
    assert_eq!(
        stats.by_type[&ReportType::BalanceSheet],
        TypeStats {
            count: 1,
            size_bytes: 25
        }
    );

    let all = store.stats(CacheScope::All).await.unwrap();
    assert_eq!(all.total_cached, 4);
    assert_eq!(all.total_size_bytes, 1175);
}

#[tokio::test]
async fn test_stats_on_empty_cache() {
    let (store, _clock) = store();
    let stats = store.stats(CacheScope::All).await.unwrap();
    assert_eq!(stats, CacheStats::default());
}

#[tokio::test]
async fn test_get_or_compute_miss_then_hit() {
    let (store, clock) = store();
    let owner = OrganizationId::new();
    let p = params(json!({"period": "2024-Q1"}));

    let first: CachedReport = store
        .get_or_compute(owner, ReportType::IncomeStatement, p.clone(), || async {
            Ok::<_, AppError>(ComputedReport::json(json!({"net_income": "1200.00"})))
        })
        .await
        .unwrap();
    assert!(!first.cached);
    assert_eq!(
        first.entry.expires_at,
        Some(first.entry.created_at + TimeDelta::hours(24))
    );

    clock.advance(TimeDelta::hours(1));
    let second = store
        .get_or_compute(owner, ReportType::IncomeStatement, p.clone(), || async {
            Err::<ComputedReport, AppError>(AppError::Internal("must not recompute".into()))
        })
        .await
        .unwrap();
    assert!(second.cached);
    assert_eq!(second.entry, first.entry);
}

#[tokio::test]
async fn test_get_or_compute_recomputes_after_expiry() {
    let (store, clock) = store();
    let store = store.with_default_ttl(TimeDelta::minutes(30));
    let owner = OrganizationId::new();
    let p = ReportParams::new();

    let first = store
        .get_or_compute(owner, ReportType::MultiCurrencySummary, p.clone(), || async {
            Ok::<_, AppError>(ComputedReport::json(json!({"version": 1})))
        })
        .await
        .unwrap();

    clock.advance(TimeDelta::minutes(30));
    let second = store
        .get_or_compute(owner, ReportType::MultiCurrencySummary, p, || async {
            Ok::<_, AppError>(ComputedReport::json(json!({"version": 2})))
        })
        .await
        .unwrap();

    assert!(!second.cached);
    assert_ne!(second.entry.id, first.entry.id);
    assert_eq!(second.entry.result, json!({"version": 2}));
}

#[tokio::test]
async fn test_get_or_compute_propagates_compute_error() {
    let (store, _clock) = store();
    let owner = OrganizationId::new();

    let result = store
        .get_or_compute(owner, ReportType::Dimensional, ReportParams::new(), || async {
            Err::<ComputedReport, AppError>(AppError::Validation("unknown dimension".into()))
        })
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(store.backend().is_empty().unwrap());
}

#[tokio::test]
async fn test_backend_failure_is_surfaced() {
    let store = ReportCacheStore::new(Arc::new(FailingBackend));
    let owner = OrganizationId::new();
    let p = ReportParams::new();
    let unavailable = CacheError::Unavailable("connection refused".into());

    assert_eq!(
        store.get(owner, ReportType::TrialBalance, &p).await,
        Err(unavailable.clone())
    );
    assert_eq!(
        store
            .put(owner, ReportType::TrialBalance, p.clone(), ComputedReport::json(json!({})), None)
            .await,
        Err(unavailable.clone())
    );
    assert_eq!(store.invalidate(owner, None).await, Err(unavailable.clone()));
    assert_eq!(store.sweep_expired().await, Err(unavailable.clone()));
    assert_eq!(store.stats(CacheScope::All).await, Err(unavailable));

    let result = store
        .get_or_compute(owner, ReportType::TrialBalance, p, || async {
            Ok::<_, AppError>(ComputedReport::json(json!({})))
        })
        .await;
    assert!(matches!(result, Err(AppError::ExternalService(_))));
}

#[tokio::test]
async fn test_from_config_uses_configured_ttl() {
    let config = tally_shared::CacheConfig {
        default_ttl_secs: 600,
        sweep_interval_secs: 60,
    };
    let store = ReportCacheStore::from_config(Arc::new(InMemoryReportCache::new()), &config);
    assert_eq!(store.default_ttl(), TimeDelta::minutes(10));
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_task_removes_expired_entries() {
    let clock = Arc::new(ManualClock::new(t0()));
    let store = Arc::new(
        ReportCacheStore::new(Arc::new(InMemoryReportCache::new())).with_clock(clock.clone()),
    );
    store
        .put(
            OrganizationId::new(),
            ReportType::TrialBalance,
            ReportParams::new(),
            ComputedReport::json(json!({})),
            Some(TimeDelta::seconds(30)),
        )
        .await
        .unwrap();
    clock.advance(TimeDelta::minutes(1));

    let handle = store.spawn_sweeper(std::time::Duration::from_secs(60));
    // The first tick fires immediately.
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    handle.abort();

    assert!(store.backend().is_empty().unwrap());
}
