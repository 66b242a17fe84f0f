use chrono::{Duration, Utc};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use tablegate_application::{OperationLogEntry, OperationLogQuery, OperationLogRepository};
use tablegate_core::RequestId;
use tablegate_domain::{AccessStatus, OperationType};

use super::PostgresOperationLogRepository;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for operation log tests: {error}");
    }

    Some(pool)
}

fn entry(service_name: &str, status: AccessStatus) -> OperationLogEntry {
    OperationLogEntry {
        request_id: RequestId::new(),
        service_name: service_name.to_owned(),
        table_name: "leads".to_owned(),
        operation_type: OperationType::Insert,
        user_id: Some("agent-3".to_owned()),
        status,
        affected_rows: (status == AccessStatus::Success).then_some(1),
        execution_time_ms: 12,
        error_message: (status != AccessStatus::Success)
            .then(|| "service had no permission".to_owned()),
        sql_statement: None,
        before_data: None,
        after_data: None,
        ip_address: Some("10.0.0.9".to_owned()),
        user_agent: None,
    }
}

#[tokio::test]
async fn appended_entries_are_listed_with_filters() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresOperationLogRepository::new(pool);
    let service_name = format!("svc-{}", Uuid::new_v4());

    let success = repository
        .append_entry(entry(&service_name, AccessStatus::Success))
        .await;
    assert!(success.is_ok());
    let denied = repository
        .append_entry(entry(&service_name, AccessStatus::Denied))
        .await;
    assert!(denied.is_ok());

    let all_for_service = repository
        .list_entries(OperationLogQuery {
            service_name: Some(service_name.clone()),
            ..OperationLogQuery::default()
        })
        .await;
    assert!(all_for_service.is_ok_and(|records| records.len() == 2));

    let denied_only = repository
        .list_entries(OperationLogQuery {
            service_name: Some(service_name.clone()),
            status: Some(AccessStatus::Denied),
            ..OperationLogQuery::default()
        })
        .await;
    assert!(denied_only.is_ok_and(|records| {
        records.len() == 1
            && records[0].entry.status == AccessStatus::Denied
            && records[0].entry.affected_rows.is_none()
            && records[0].entry.error_message.is_some()
    }));
}

#[tokio::test]
async fn success_entries_keep_affected_rows_and_duration() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresOperationLogRepository::new(pool);
    let service_name = format!("svc-{}", Uuid::new_v4());

    let appended = repository
        .append_entry(entry(&service_name, AccessStatus::Success))
        .await;
    assert!(appended.is_ok());

    let records = repository
        .list_entries(OperationLogQuery {
            service_name: Some(service_name),
            ..OperationLogQuery::default()
        })
        .await;
    assert!(records.is_ok_and(|records| {
        records.len() == 1
            && records[0].entry.affected_rows == Some(1)
            && records[0].entry.execution_time_ms == 12
            && records[0].entry.user_id.as_deref() == Some("agent-3")
    }));
}

#[tokio::test]
async fn purge_removes_entries_older_than_cutoff() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresOperationLogRepository::new(pool);
    let service_name = format!("svc-{}", Uuid::new_v4());

    let appended = repository
        .append_entry(entry(&service_name, AccessStatus::Success))
        .await;
    assert!(appended.is_ok());

    let purged = repository
        .purge_entries_before(Utc::now() + Duration::minutes(1))
        .await;
    assert!(purged.is_ok_and(|count| count >= 1));

    let records = repository
        .list_entries(OperationLogQuery {
            service_name: Some(service_name),
            ..OperationLogQuery::default()
        })
        .await;
    assert!(records.is_ok_and(|records| records.is_empty()));
}
