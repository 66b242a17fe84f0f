use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tablegate_core::{AppResult, RequestId};
use tablegate_domain::{AccessStatus, OperationType};
use uuid::Uuid;

/// Append-only audit record for one completed data-layer call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationLogEntry {
    /// Identifier correlating the record with the intercepted call.
    pub request_id: RequestId,
    /// Caller microservice identity.
    pub service_name: String,
    /// Target table.
    pub table_name: String,
    /// Operation class of the call.
    pub operation_type: OperationType,
    /// User on whose behalf the call ran, absent for system calls.
    pub user_id: Option<String>,
    /// Call outcome class.
    pub status: AccessStatus,
    /// Rows affected by a write call, absent for reads and denials.
    pub affected_rows: Option<i64>,
    /// Wall-clock call duration in milliseconds.
    pub execution_time_ms: i64,
    /// Truncated error or denial reason, present for FAILED and DENIED.
    pub error_message: Option<String>,
    /// Sanitized statement as supplied by the caller.
    pub sql_statement: Option<String>,
    /// Serialized row snapshot before an opted-in write.
    pub before_data: Option<String>,
    /// Serialized row snapshot after an opted-in write.
    pub after_data: Option<String>,
    /// Caller source IP address, if the transport supplied one.
    pub ip_address: Option<String>,
    /// Caller user agent, if the transport supplied one.
    pub user_agent: Option<String>,
}

/// Query parameters for audit log listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationLogQuery {
    /// Maximum rows returned.
    pub limit: usize,
    /// Number of rows skipped for offset pagination.
    pub offset: usize,
    /// Optional caller service filter.
    pub service_name: Option<String>,
    /// Optional target table filter.
    pub table_name: Option<String>,
    /// Optional operation class filter.
    pub operation_type: Option<OperationType>,
    /// Optional user filter.
    pub user_id: Option<String>,
    /// Optional outcome filter.
    pub status: Option<AccessStatus>,
    /// Lower creation-time bound, inclusive.
    pub created_after: Option<DateTime<Utc>>,
    /// Upper creation-time bound, exclusive.
    pub created_before: Option<DateTime<Utc>>,
}

impl Default for OperationLogQuery {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
            service_name: None,
            table_name: None,
            operation_type: None,
            user_id: None,
            status: None,
            created_after: None,
            created_before: None,
        }
    }
}

/// Persisted audit record projection for reporting reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationLogRecord {
    /// Stable row identifier.
    pub id: Uuid,
    /// The persisted audit payload.
    pub entry: OperationLogEntry,
    /// Database-assigned creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Port for the append-only audit sink and its reporting reads.
///
/// The online path only appends; retention runs offline through
/// [`OperationLogRepository::purge_entries_before`] keyed on `created_at`.
#[async_trait]
pub trait OperationLogRepository: Send + Sync {
    /// Persists one audit record.
    async fn append_entry(&self, entry: OperationLogEntry) -> AppResult<()>;

    /// Lists persisted records matching the query, newest first.
    async fn list_entries(&self, query: OperationLogQuery) -> AppResult<Vec<OperationLogRecord>>;

    /// Deletes records created before the cutoff, returning the count.
    async fn purge_entries_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64>;
}
