use std::sync::Arc;

use tablegate_core::{AppError, AppResult};
use tablegate_domain::{OperationType, PermissionRecord};
use uuid::Uuid;

use crate::access_ports::{
    PermissionAdminRepository, PermissionCache, PermissionCacheKey, PermissionRecordInput,
};

/// Administrative management path for the permission matrix.
///
/// Every successful mutation invalidates the cached verdicts of the
/// affected `(service, table)` pair so enforcement does not have to wait
/// out the verdict TTL.
#[derive(Clone)]
pub struct PermissionAdminService {
    repository: Arc<dyn PermissionAdminRepository>,
    cache: Arc<dyn PermissionCache>,
}

impl PermissionAdminService {
    /// Creates an admin service over store and cache implementations.
    #[must_use]
    pub fn new(
        repository: Arc<dyn PermissionAdminRepository>,
        cache: Arc<dyn PermissionCache>,
    ) -> Self {
        Self { repository, cache }
    }

    /// Creates or replaces the record for one call triple.
    pub async fn upsert_record(
        &self,
        input: PermissionRecordInput,
    ) -> AppResult<PermissionRecord> {
        if input.service_name.trim().is_empty() {
            return Err(AppError::Validation(
                "permission record service name must not be empty".to_owned(),
            ));
        }
        if input.table_name.trim().is_empty() {
            return Err(AppError::Validation(
                "permission record table name must not be empty".to_owned(),
            ));
        }

        let record = self.repository.upsert_record(input).await?;
        self.invalidate_pair(&record.service_name, &record.table_name)
            .await?;
        Ok(record)
    }

    /// Enables or disables one record.
    pub async fn set_record_enabled(
        &self,
        id: Uuid,
        is_enabled: bool,
    ) -> AppResult<PermissionRecord> {
        let record = self.repository.set_record_enabled(id, is_enabled).await?;
        self.invalidate_pair(&record.service_name, &record.table_name)
            .await?;
        Ok(record)
    }

    /// Removes one record.
    pub async fn delete_record(&self, id: Uuid) -> AppResult<PermissionRecord> {
        let record = self.repository.delete_record(id).await?;
        self.invalidate_pair(&record.service_name, &record.table_name)
            .await?;
        Ok(record)
    }

    /// Lists all records configured for one service.
    pub async fn list_records_for_service(
        &self,
        service_name: &str,
    ) -> AppResult<Vec<PermissionRecord>> {
        self.repository.list_records_for_service(service_name).await
    }

    // A change to an ALL record shifts the most-specific match for every
    // verb, so all five keys of the pair are dropped.
    async fn invalidate_pair(&self, service_name: &str, table_name: &str) -> AppResult<()> {
        for operation_type in [
            OperationType::Select,
            OperationType::Insert,
            OperationType::Update,
            OperationType::Delete,
            OperationType::All,
        ] {
            let key = PermissionCacheKey::new(service_name, table_name, operation_type);
            self.cache.invalidate(&key).await?;
        }

        Ok(())
    }
}
