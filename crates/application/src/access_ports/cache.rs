use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tablegate_core::AppResult;
use tablegate_domain::{ConditionMap, OperationType};

/// Cache key for one `(service, table, operation)` verdict.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PermissionCacheKey {
    /// Caller microservice identity.
    pub service_name: String,
    /// Target table.
    pub table_name: String,
    /// Requested operation class.
    pub operation_type: OperationType,
}

impl PermissionCacheKey {
    /// Creates a cache key for one call triple.
    #[must_use]
    pub fn new(
        service_name: impl Into<String>,
        table_name: impl Into<String>,
        operation_type: OperationType,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            table_name: table_name.into(),
            operation_type,
        }
    }

    /// Returns the `service:table:operation` storage key.
    #[must_use]
    pub fn storage_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.service_name,
            self.table_name,
            self.operation_type.as_str()
        )
    }
}

/// Compact permission verdict held in the cache.
///
/// RESTRICTED verdicts carry their condition map so a cache hit can still
/// evaluate conditions without touching the store. An absent dynamic and
/// fallback grant is cached as `Denied` to avoid repeated store reads for
/// services with no grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CachedVerdict {
    /// Allow unconditionally.
    Full,
    /// Allow when the attached conditions hold for the call.
    Restricted {
        /// Condition map copied from the matched record.
        conditions: ConditionMap,
    },
    /// Reject unconditionally.
    Denied,
}

/// Read-through cache port in front of the permission store.
///
/// Entries are pure functions of a TTL-bounded fact, so concurrent writes
/// are idempotent verdict overwrites and last-writer-wins is acceptable.
#[async_trait]
pub trait PermissionCache: Send + Sync {
    /// Returns the cached verdict for a key, if present and unexpired.
    async fn get_verdict(&self, key: &PermissionCacheKey) -> AppResult<Option<CachedVerdict>>;

    /// Stores a verdict under a key with the given TTL.
    async fn set_verdict(
        &self,
        key: &PermissionCacheKey,
        verdict: CachedVerdict,
        ttl_seconds: u32,
    ) -> AppResult<()>;

    /// Removes the verdict cached under a key.
    async fn invalidate(&self, key: &PermissionCacheKey) -> AppResult<()>;
}

#[cfg(test)]
mod tests {
    use tablegate_domain::OperationType;

    use super::PermissionCacheKey;

    #[test]
    fn storage_key_joins_triple_with_colons() {
        let key = PermissionCacheKey::new("lead-service", "leads", OperationType::Update);
        assert_eq!(key.storage_key(), "lead-service:leads:UPDATE");
    }
}
