//! Application services and ports for data-access enforcement and audit.

#![forbid(unsafe_code)]

mod access_context;
mod access_guard;
mod access_ports;
mod operation_log_service;
mod permission_admin_service;
mod permission_check_service;

pub use access_context::{AccessContext, METHOD_ARGS_MAX_LEN, serialize_arguments};
pub use access_guard::{AccessGuard, AccessGuardConfig, GuardedCall, SLOW_QUERY_THRESHOLD_MS};
pub use access_ports::{
    CachedVerdict, OperationLogEntry, OperationLogQuery, OperationLogRecord,
    OperationLogRepository, PermissionAdminRepository, PermissionCache, PermissionCacheKey,
    PermissionRecordInput, PermissionRepository,
};
pub use operation_log_service::{ERROR_MESSAGE_MAX_LEN, OperationLogService};
pub use permission_admin_service::PermissionAdminService;
pub use permission_check_service::{
    AccessDecision, PERMISSION_CACHE_TTL_SECONDS, PermissionCheckService, StaticPermissionMatrix,
};
