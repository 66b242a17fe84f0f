use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use tablegate_application::{
    OperationLogEntry, OperationLogQuery, OperationLogRecord, OperationLogRepository,
};
use tablegate_core::{AppError, AppResult, RequestId};
use tablegate_domain::{AccessStatus, OperationType};

#[cfg(test)]
mod tests;

/// PostgreSQL-backed append-only data access log.
#[derive(Clone)]
pub struct PostgresOperationLogRepository {
    pool: PgPool,
}

impl PostgresOperationLogRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct OperationLogRow {
    id: Uuid,
    request_id: Uuid,
    service_name: String,
    table_name: String,
    operation_type: String,
    user_id: Option<String>,
    status: String,
    affected_rows: Option<i64>,
    execution_time_ms: i64,
    error_message: Option<String>,
    sql_statement: Option<String>,
    before_data: Option<String>,
    after_data: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
}

impl OperationLogRow {
    fn into_record(self) -> AppResult<OperationLogRecord> {
        let operation_type =
            OperationType::from_str(self.operation_type.as_str()).map_err(|error| {
                AppError::Internal(format!(
                    "failed to decode operation type for log entry '{}': {error}",
                    self.id
                ))
            })?;
        let status = AccessStatus::from_str(self.status.as_str()).map_err(|error| {
            AppError::Internal(format!(
                "failed to decode status for log entry '{}': {error}",
                self.id
            ))
        })?;

        Ok(OperationLogRecord {
            id: self.id,
            entry: OperationLogEntry {
                request_id: RequestId::from_uuid(self.request_id),
                service_name: self.service_name,
                table_name: self.table_name,
                operation_type,
                user_id: self.user_id,
                status,
                affected_rows: self.affected_rows,
                execution_time_ms: self.execution_time_ms,
                error_message: self.error_message,
                sql_statement: self.sql_statement,
                before_data: self.before_data,
                after_data: self.after_data,
                ip_address: self.ip_address,
                user_agent: self.user_agent,
            },
            created_at: self.created_at,
        })
    }
}

#[async_trait]
impl OperationLogRepository for PostgresOperationLogRepository {
    async fn append_entry(&self, entry: OperationLogEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO data_access_logs (
                request_id,
                service_name,
                table_name,
                operation_type,
                user_id,
                status,
                affected_rows,
                execution_time_ms,
                error_message,
                sql_statement,
                before_data,
                after_data,
                ip_address,
                user_agent
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(entry.request_id.as_uuid())
        .bind(entry.service_name)
        .bind(entry.table_name)
        .bind(entry.operation_type.as_str())
        .bind(entry.user_id)
        .bind(entry.status.as_str())
        .bind(entry.affected_rows)
        .bind(entry.execution_time_ms)
        .bind(entry.error_message)
        .bind(entry.sql_statement)
        .bind(entry.before_data)
        .bind(entry.after_data)
        .bind(entry.ip_address)
        .bind(entry.user_agent)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to append data access log entry: {error}"))
        })?;

        Ok(())
    }

    async fn list_entries(&self, query: OperationLogQuery) -> AppResult<Vec<OperationLogRecord>> {
        let capped_limit = query.limit.clamp(1, 200) as i64;
        let capped_offset = query.offset.min(5_000) as i64;
        let rows = sqlx::query_as::<_, OperationLogRow>(
            r#"
            SELECT
                id,
                request_id,
                service_name,
                table_name,
                operation_type,
                user_id,
                status,
                affected_rows,
                execution_time_ms,
                error_message,
                sql_statement,
                before_data,
                after_data,
                ip_address,
                user_agent,
                created_at
            FROM data_access_logs
            WHERE ($1::TEXT IS NULL OR service_name = $1)
                AND ($2::TEXT IS NULL OR table_name = $2)
                AND ($3::TEXT IS NULL OR operation_type = $3)
                AND ($4::TEXT IS NULL OR user_id = $4)
                AND ($5::TEXT IS NULL OR status = $5)
                AND ($6::TIMESTAMPTZ IS NULL OR created_at >= $6)
                AND ($7::TIMESTAMPTZ IS NULL OR created_at < $7)
            ORDER BY created_at DESC
            LIMIT $8
            OFFSET $9
            "#,
        )
        .bind(query.service_name)
        .bind(query.table_name)
        .bind(query.operation_type.map(|operation| operation.as_str()))
        .bind(query.user_id)
        .bind(query.status.map(|status| status.as_str()))
        .bind(query.created_after)
        .bind(query.created_before)
        .bind(capped_limit)
        .bind(capped_offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list data access log entries: {error}"))
        })?;

        rows.into_iter().map(OperationLogRow::into_record).collect()
    }

    async fn purge_entries_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM data_access_logs
            WHERE created_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to purge data access log entries: {error}"))
        })?;

        Ok(result.rows_affected())
    }
}
