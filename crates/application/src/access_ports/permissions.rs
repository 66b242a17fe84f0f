use async_trait::async_trait;
use tablegate_core::AppResult;
use tablegate_domain::{ConditionMap, OperationType, PermissionLevel, PermissionRecord};
use uuid::Uuid;

/// Repository port for permission matrix lookups on the enforcement path.
#[async_trait]
pub trait PermissionRepository: Send + Sync {
    /// Finds the most specific enabled record for one call triple.
    ///
    /// A record carrying the concrete operation type takes precedence over
    /// an `ALL` record for the same service and table. Disabled records are
    /// never returned.
    async fn find_record(
        &self,
        service_name: &str,
        table_name: &str,
        operation_type: OperationType,
    ) -> AppResult<Option<PermissionRecord>>;
}

/// Input payload for creating or replacing one permission record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRecordInput {
    /// Caller microservice identity the rule applies to.
    pub service_name: String,
    /// Target table the rule applies to.
    pub table_name: String,
    /// Operation class the rule applies to.
    pub operation_type: OperationType,
    /// Granted permission level.
    pub permission_level: PermissionLevel,
    /// Row-level conditions for RESTRICTED records.
    pub conditions: ConditionMap,
    /// Whether the record participates in enforcement.
    pub is_enabled: bool,
}

/// Repository port for the administrative management path.
#[async_trait]
pub trait PermissionAdminRepository: Send + Sync {
    /// Creates or replaces the record for the input's call triple.
    async fn upsert_record(&self, input: PermissionRecordInput) -> AppResult<PermissionRecord>;

    /// Enables or disables one record, returning its updated state.
    async fn set_record_enabled(&self, id: Uuid, is_enabled: bool) -> AppResult<PermissionRecord>;

    /// Removes one record, returning its last state.
    async fn delete_record(&self, id: Uuid) -> AppResult<PermissionRecord>;

    /// Lists all records configured for one service.
    async fn list_records_for_service(
        &self,
        service_name: &str,
    ) -> AppResult<Vec<PermissionRecord>>;
}
