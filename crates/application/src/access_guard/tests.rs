use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tablegate_core::{AppError, AppResult, CallerIdentity};
use tablegate_domain::{
    AccessStatus, ConditionMap, OperationType, PermissionLevel, PermissionRecord,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::access_ports::{
    CachedVerdict, OperationLogEntry, OperationLogQuery, OperationLogRecord,
    OperationLogRepository, PermissionCache, PermissionCacheKey, PermissionRepository,
};
use crate::operation_log_service::OperationLogService;
use crate::permission_check_service::{PermissionCheckService, StaticPermissionMatrix};

use super::{AccessGuard, AccessGuardConfig, GuardedCall, is_slow_query};

struct FakePermissionRepository {
    granted: Vec<(String, String, OperationType)>,
}

impl FakePermissionRepository {
    fn granting(granted: &[(&str, &str, OperationType)]) -> Self {
        Self {
            granted: granted
                .iter()
                .map(|(service, table, operation)| {
                    ((*service).to_owned(), (*table).to_owned(), *operation)
                })
                .collect(),
        }
    }
}

#[async_trait]
impl PermissionRepository for FakePermissionRepository {
    async fn find_record(
        &self,
        service_name: &str,
        table_name: &str,
        operation_type: OperationType,
    ) -> AppResult<Option<PermissionRecord>> {
        let granted = self.granted.iter().any(|(service, table, operation)| {
            service == service_name && table == table_name && operation.covers(operation_type)
        });

        Ok(granted.then(|| PermissionRecord {
            id: Uuid::new_v4(),
            service_name: service_name.to_owned(),
            table_name: table_name.to_owned(),
            operation_type,
            permission_level: PermissionLevel::Full,
            conditions: ConditionMap::new(),
            is_enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }))
    }
}

#[derive(Default)]
struct FakePermissionCache {
    verdicts: Mutex<HashMap<String, CachedVerdict>>,
}

#[async_trait]
impl PermissionCache for FakePermissionCache {
    async fn get_verdict(&self, key: &PermissionCacheKey) -> AppResult<Option<CachedVerdict>> {
        Ok(self.verdicts.lock().await.get(&key.storage_key()).cloned())
    }

    async fn set_verdict(
        &self,
        key: &PermissionCacheKey,
        verdict: CachedVerdict,
        _ttl_seconds: u32,
    ) -> AppResult<()> {
        self.verdicts
            .lock()
            .await
            .insert(key.storage_key(), verdict);
        Ok(())
    }

    async fn invalidate(&self, key: &PermissionCacheKey) -> AppResult<()> {
        self.verdicts.lock().await.remove(&key.storage_key());
        Ok(())
    }
}

#[derive(Default)]
struct FakeOperationLogRepository {
    entries: Mutex<Vec<OperationLogEntry>>,
    fail_appends: bool,
}

#[async_trait]
impl OperationLogRepository for FakeOperationLogRepository {
    async fn append_entry(&self, entry: OperationLogEntry) -> AppResult<()> {
        if self.fail_appends {
            return Err(AppError::Internal("audit sink unavailable".to_owned()));
        }
        self.entries.lock().await.push(entry);
        Ok(())
    }

    async fn list_entries(&self, _query: OperationLogQuery) -> AppResult<Vec<OperationLogRecord>> {
        Ok(Vec::new())
    }

    async fn purge_entries_before(&self, _cutoff: DateTime<Utc>) -> AppResult<u64> {
        Ok(0)
    }
}

fn guard_with(
    granted: &[(&str, &str, OperationType)],
    config: AccessGuardConfig,
    fail_log_appends: bool,
) -> (AccessGuard, Arc<FakeOperationLogRepository>) {
    let checker = PermissionCheckService::new(
        Arc::new(FakePermissionRepository::granting(granted)),
        Arc::new(FakePermissionCache::default()),
        StaticPermissionMatrix::new(),
    );
    let log_repository = Arc::new(FakeOperationLogRepository {
        entries: Mutex::new(Vec::new()),
        fail_appends: fail_log_appends,
    });
    let logger = OperationLogService::new(log_repository.clone());

    (AccessGuard::new(checker, logger, config), log_repository)
}

#[tokio::test]
async fn authorized_write_logs_success_with_affected_rows() {
    let (guard, log_repository) = guard_with(
        &[("lead-service", "leads", OperationType::Insert)],
        AccessGuardConfig::default(),
        false,
    );

    let result = guard
        .execute_write(
            GuardedCall::new("lead-service", "leads", "insertLead")
                .with_identity(CallerIdentity::user("agent-3")),
            || async { Ok(1_u64) },
        )
        .await;

    assert_eq!(result.ok(), Some(1));
    let entries = log_repository.entries.lock().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, AccessStatus::Success);
    assert_eq!(entries[0].affected_rows, Some(1));
    assert_eq!(entries[0].user_id.as_deref(), Some("agent-3"));
}

#[tokio::test]
async fn denied_call_never_runs_and_logs_denied_entry() {
    let (guard, log_repository) = guard_with(&[], AccessGuardConfig::default(), false);
    let executed = Arc::new(AtomicBool::new(false));
    let executed_probe = executed.clone();

    let result: AppResult<Vec<String>> = guard
        .execute(
            GuardedCall::new("auth-service", "deals", "findDealsByOwner"),
            || async move {
                executed_probe.store(true, Ordering::SeqCst);
                Ok(Vec::new())
            },
        )
        .await;

    assert!(!executed.load(Ordering::SeqCst));
    match result {
        Err(AppError::AccessDenied(denied)) => {
            assert_eq!(denied.service_name, "auth-service");
            assert_eq!(denied.table_name, "deals");
            assert_eq!(denied.operation_type, "SELECT");
            assert_eq!(
                denied.reason,
                "service 'auth-service' has no permission for SELECT on table 'deals'"
            );
        }
        _ => panic!("denied call must surface AppError::AccessDenied"),
    }

    let entries = log_repository.entries.lock().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, AccessStatus::Denied);
    assert_eq!(entries[0].service_name, "auth-service");
    assert_eq!(entries[0].table_name, "deals");
    assert_eq!(entries[0].operation_type, OperationType::Select);
    assert!(entries[0].affected_rows.is_none());
}

#[tokio::test]
async fn wrapped_call_error_passes_through_unchanged() {
    let (guard, log_repository) = guard_with(
        &[("lead-service", "leads", OperationType::All)],
        AccessGuardConfig::default(),
        false,
    );

    let result: AppResult<u64> = guard
        .execute_write(
            GuardedCall::new("lead-service", "leads", "updateLeadOwner"),
            || async { Err(AppError::Conflict("lead already claimed".to_owned())) },
        )
        .await;

    match result {
        Err(AppError::Conflict(message)) => assert_eq!(message, "lead already claimed"),
        _ => panic!("guard must re-raise the original error"),
    }

    let entries = log_repository.entries.lock().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, AccessStatus::Failed);
    assert!(
        entries[0]
            .error_message
            .as_deref()
            .is_some_and(|message| message.contains("lead already claimed"))
    );
}

#[tokio::test]
async fn audit_sink_failure_never_affects_business_outcome() {
    let (guard, log_repository) = guard_with(
        &[("reward-service", "rewards", OperationType::Select)],
        AccessGuardConfig::default(),
        true,
    );

    let result = guard
        .execute_read(
            GuardedCall::new("reward-service", "rewards", "findRewardsByAgent"),
            || async { Ok(vec!["reward-1".to_owned()]) },
        )
        .await;

    assert_eq!(result.ok(), Some(vec!["reward-1".to_owned()]));
    assert!(log_repository.entries.lock().await.is_empty());
}

#[tokio::test]
async fn nested_guarded_call_bypasses_enforcement_once() {
    let (guard, log_repository) = guard_with(
        &[("lead-service", "leads", OperationType::Select)],
        AccessGuardConfig::default(),
        false,
    );

    let inner_guard = guard.clone();
    let result = guard
        .execute(
            GuardedCall::new("lead-service", "leads", "findLeadsByRegion"),
            || async move {
                // Mimics the checker/logger issuing a data call of its own
                // while the outer guard scope is active.
                inner_guard
                    .execute(
                        GuardedCall::new("lead-service", "settlements", "findSettlements"),
                        || async { Ok(7_i32) },
                    )
                    .await
            },
        )
        .await;

    assert_eq!(result.ok(), Some(7));

    // Only the outer call is audited; the nested one ran unguarded.
    let entries = log_repository.entries.lock().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].table_name, "leads");
    assert_eq!(entries[0].status, AccessStatus::Success);
    drop(entries);

    // The scope ended with the outer call, so enforcement is back on.
    let denied: AppResult<i32> = guard
        .execute(
            GuardedCall::new("lead-service", "settlements", "findSettlements"),
            || async { Ok(7_i32) },
        )
        .await;
    assert!(matches!(denied, Err(AppError::AccessDenied(_))));
}

#[tokio::test]
async fn reentrancy_scope_clears_after_failed_calls() {
    let (guard, _log_repository) = guard_with(
        &[("lead-service", "leads", OperationType::Select)],
        AccessGuardConfig::default(),
        false,
    );

    let failed: AppResult<i32> = guard
        .execute(
            GuardedCall::new("lead-service", "leads", "findLeadsByRegion"),
            || async { Err(AppError::Internal("connection reset".to_owned())) },
        )
        .await;
    assert!(failed.is_err());

    let denied: AppResult<i32> = guard
        .execute(
            GuardedCall::new("lead-service", "settlements", "findSettlements"),
            || async { Ok(1_i32) },
        )
        .await;
    assert!(matches!(denied, Err(AppError::AccessDenied(_))));
}

#[tokio::test]
async fn disabled_guard_proceeds_without_enforcement_or_audit() {
    let config = AccessGuardConfig {
        enabled: false,
        ..AccessGuardConfig::default()
    };
    let (guard, log_repository) = guard_with(&[], config, false);

    let result: AppResult<i32> = guard
        .execute(
            GuardedCall::new("auth-service", "deals", "findDeals"),
            || async { Ok(9_i32) },
        )
        .await;

    assert_eq!(result.ok(), Some(9));
    assert!(log_repository.entries.lock().await.is_empty());
}

#[tokio::test]
async fn excluded_services_and_internal_tables_bypass_enforcement() {
    let mut config = AccessGuardConfig::default();
    config.excluded_services.insert("migration-tool".to_owned());
    let (guard, log_repository) = guard_with(&[], config, false);

    let excluded: AppResult<i32> = guard
        .execute(
            GuardedCall::new("migration-tool", "deals", "updateDeals"),
            || async { Ok(3_i32) },
        )
        .await;
    assert_eq!(excluded.ok(), Some(3));

    // The guard's own bookkeeping tables are never gated.
    let internal: AppResult<u64> = guard
        .execute_write(
            GuardedCall::new("auth-service", "data_access_logs", "insertLogEntry"),
            || async { Ok(1_u64) },
        )
        .await;
    assert_eq!(internal.ok(), Some(1));

    assert!(log_repository.entries.lock().await.is_empty());
}

#[tokio::test]
async fn slow_read_still_returns_result_and_logs_success() {
    let config = AccessGuardConfig {
        slow_query_threshold_ms: 0,
        ..AccessGuardConfig::default()
    };
    let (guard, log_repository) = guard_with(
        &[("reward-service", "rewards", OperationType::Select)],
        config,
        false,
    );

    let result = guard
        .execute_read(
            GuardedCall::new("reward-service", "rewards", "findPayableRewards"),
            || async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(42_i64)
            },
        )
        .await;

    assert_eq!(result.ok(), Some(42));
    let entries = log_repository.entries.lock().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, AccessStatus::Success);
}

#[tokio::test]
async fn operation_is_inferred_from_method_name() {
    let (guard, _log_repository) = guard_with(
        &[("promotion-service", "promotions", OperationType::Select)],
        AccessGuardConfig::default(),
        false,
    );

    let inferred: AppResult<i32> = guard
        .execute(
            GuardedCall::new("promotion-service", "promotions", "getActivePromotions"),
            || async { Ok(5_i32) },
        )
        .await;
    assert_eq!(inferred.ok(), Some(5));

    let unknown: AppResult<i32> = guard
        .execute(
            GuardedCall::new("promotion-service", "promotions", "recalculateBudgets"),
            || async { Ok(5_i32) },
        )
        .await;
    assert!(matches!(unknown, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn change_capture_records_both_snapshots() {
    let (guard, log_repository) = guard_with(
        &[("lead-service", "leads", OperationType::Update)],
        AccessGuardConfig::default(),
        false,
    );

    let before = serde_json::json!({ "owner": "agent-1" });
    let after = serde_json::json!({ "owner": "agent-2" });
    let result = guard
        .execute_write_with_change(
            GuardedCall::new("lead-service", "leads", "updateLeadOwner"),
            &before,
            &after,
            || async { Ok(1_u64) },
        )
        .await;

    assert_eq!(result.ok(), Some(1));
    let entries = log_repository.entries.lock().await;
    assert_eq!(entries[0].before_data.as_deref(), Some(r#"{"owner":"agent-1"}"#));
    assert_eq!(entries[0].after_data.as_deref(), Some(r#"{"owner":"agent-2"}"#));
}

#[test]
fn slow_query_requires_exceeding_the_threshold() {
    assert!(is_slow_query(1_500, 1_000));
    assert!(!is_slow_query(1_000, 1_000));
    assert!(!is_slow_query(200, 1_000));
}
