use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use tablegate_application::{
    PermissionAdminRepository, PermissionRecordInput, PermissionRepository,
};
use tablegate_core::{AppError, AppResult};
use tablegate_domain::{
    ConditionMap, OperationType, PermissionLevel, PermissionRecord,
};


/// PostgreSQL-backed permission matrix store.
#[derive(Clone)]
pub struct PostgresPermissionRepository {
    pool: PgPool,
}

impl PostgresPermissionRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PermissionRecordRow {
    id: Uuid,
    service_name: String,
    table_name: String,
    operation_type: String,
    permission_level: String,
    conditions: Option<String>,
    is_enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PermissionRecordRow {
    fn into_record(self) -> AppResult<PermissionRecord> {
        let operation_type = OperationType::from_str(self.operation_type.as_str())
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to decode operation type for permission record '{}': {error}",
                    self.id
                ))
            })?;
        let permission_level = PermissionLevel::from_str(self.permission_level.as_str())
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to decode permission level for permission record '{}': {error}",
                    self.id
                ))
            })?;
        let conditions = match self.conditions.as_deref() {
            Some(encoded) => serde_json::from_str::<ConditionMap>(encoded).map_err(|error| {
                AppError::Internal(format!(
                    "failed to decode conditions for permission record '{}': {error}",
                    self.id
                ))
            })?,
            None => ConditionMap::new(),
        };

        Ok(PermissionRecord {
            id: self.id,
            service_name: self.service_name,
            table_name: self.table_name,
            operation_type,
            permission_level,
            conditions,
            is_enabled: self.is_enabled,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn encode_conditions(conditions: &ConditionMap) -> AppResult<Option<String>> {
    if conditions.is_empty() {
        return Ok(None);
    }

    serde_json::to_string(conditions)
        .map(Some)
        .map_err(|error| AppError::Internal(format!("failed to encode conditions: {error}")))
}

#[async_trait]
impl PermissionRepository for PostgresPermissionRepository {
    async fn find_record(
        &self,
        service_name: &str,
        table_name: &str,
        operation_type: OperationType,
    ) -> AppResult<Option<PermissionRecord>> {
        let row = sqlx::query_as::<_, PermissionRecordRow>(
            r#"
            SELECT
                id,
                service_name,
                table_name,
                operation_type,
                permission_level,
                conditions,
                is_enabled,
                created_at,
                updated_at
            FROM permission_records
            WHERE service_name = $1
                AND table_name = $2
                AND operation_type IN ($3, 'ALL')
                AND is_enabled = TRUE
            ORDER BY CASE WHEN operation_type = $3 THEN 0 ELSE 1 END
            LIMIT 1
            "#,
        )
        .bind(service_name)
        .bind(table_name)
        .bind(operation_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load permission record: {error}")))?;

        row.map(PermissionRecordRow::into_record).transpose()
    }
}

#[async_trait]
impl PermissionAdminRepository for PostgresPermissionRepository {
    async fn upsert_record(&self, input: PermissionRecordInput) -> AppResult<PermissionRecord> {
        let conditions = encode_conditions(&input.conditions)?;
        let row = sqlx::query_as::<_, PermissionRecordRow>(
            r#"
            INSERT INTO permission_records (
                id,
                service_name,
                table_name,
                operation_type,
                permission_level,
                conditions,
                is_enabled
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (service_name, table_name, operation_type) DO UPDATE SET
                permission_level = EXCLUDED.permission_level,
                conditions = EXCLUDED.conditions,
                is_enabled = EXCLUDED.is_enabled,
                updated_at = NOW()
            RETURNING
                id,
                service_name,
                table_name,
                operation_type,
                permission_level,
                conditions,
                is_enabled,
                created_at,
                updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.service_name)
        .bind(input.table_name)
        .bind(input.operation_type.as_str())
        .bind(input.permission_level.as_str())
        .bind(conditions)
        .bind(input.is_enabled)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to upsert permission record: {error}"))
        })?;

        row.into_record()
    }

    async fn set_record_enabled(&self, id: Uuid, is_enabled: bool) -> AppResult<PermissionRecord> {
        let row = sqlx::query_as::<_, PermissionRecordRow>(
            r#"
            UPDATE permission_records
            SET is_enabled = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING
                id,
                service_name,
                table_name,
                operation_type,
                permission_level,
                conditions,
                is_enabled,
                created_at,
                updated_at
            "#,
        )
        .bind(id)
        .bind(is_enabled)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to update permission record: {error}"))
        })?;

        row.ok_or_else(|| AppError::NotFound(format!("permission record '{id}'")))?
            .into_record()
    }

    async fn delete_record(&self, id: Uuid) -> AppResult<PermissionRecord> {
        let row = sqlx::query_as::<_, PermissionRecordRow>(
            r#"
            DELETE FROM permission_records
            WHERE id = $1
            RETURNING
                id,
                service_name,
                table_name,
                operation_type,
                permission_level,
                conditions,
                is_enabled,
                created_at,
                updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to delete permission record: {error}"))
        })?;

        row.ok_or_else(|| AppError::NotFound(format!("permission record '{id}'")))?
            .into_record()
    }

    async fn list_records_for_service(
        &self,
        service_name: &str,
    ) -> AppResult<Vec<PermissionRecord>> {
        let rows = sqlx::query_as::<_, PermissionRecordRow>(
            r#"
            SELECT
                id,
                service_name,
                table_name,
                operation_type,
                permission_level,
                conditions,
                is_enabled,
                created_at,
                updated_at
            FROM permission_records
            WHERE service_name = $1
            ORDER BY table_name, operation_type
            "#,
        )
        .bind(service_name)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list permission records: {error}"))
        })?;

        rows.into_iter()
            .map(PermissionRecordRow::into_record)
            .collect()
    }
}
