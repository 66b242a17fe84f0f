//! Ports consumed by the enforcement and audit services.

mod audit;
mod cache;
mod permissions;

pub use audit::{
    OperationLogEntry, OperationLogQuery, OperationLogRecord, OperationLogRepository,
};
pub use cache::{CachedVerdict, PermissionCache, PermissionCacheKey};
pub use permissions::{PermissionAdminRepository, PermissionRecordInput, PermissionRepository};
