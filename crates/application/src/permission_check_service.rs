use std::sync::Arc;

use tablegate_core::AppResult;
use tablegate_domain::{OperationType, PermissionLevel};

use crate::access_context::AccessContext;
use crate::access_ports::{CachedVerdict, PermissionCache, PermissionCacheKey, PermissionRepository};

mod conditions;
mod fallback;

pub use fallback::StaticPermissionMatrix;

use conditions::evaluate_conditions;

/// Default lifetime of cached permission verdicts.
///
/// Kept short (minutes, not hours) so the stale-allow window after an
/// administrative change is bounded even without explicit invalidation.
pub const PERMISSION_CACHE_TTL_SECONDS: u32 = 300;

/// Outcome of a context-aware permission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// The call may proceed.
    Allowed,
    /// The call must be rejected without executing.
    Denied {
        /// Human-readable denial reason for the audit record.
        reason: String,
    },
}

/// Decision engine for the per-(service, table, operation) permission matrix.
///
/// Lookup order is cache, then store, then the static fallback matrix, then
/// default-deny. Lookup failures of any kind resolve to deny: refusing
/// availability is safer than granting unauthorized access.
#[derive(Clone)]
pub struct PermissionCheckService {
    repository: Arc<dyn PermissionRepository>,
    cache: Arc<dyn PermissionCache>,
    fallback: StaticPermissionMatrix,
    cache_ttl_seconds: u32,
}

impl PermissionCheckService {
    /// Creates a check service over store and cache implementations.
    #[must_use]
    pub fn new(
        repository: Arc<dyn PermissionRepository>,
        cache: Arc<dyn PermissionCache>,
        fallback: StaticPermissionMatrix,
    ) -> Self {
        Self {
            repository,
            cache,
            fallback,
            cache_ttl_seconds: PERMISSION_CACHE_TTL_SECONDS,
        }
    }

    /// Overrides the verdict cache TTL.
    #[must_use]
    pub fn with_cache_ttl_seconds(mut self, cache_ttl_seconds: u32) -> Self {
        self.cache_ttl_seconds = cache_ttl_seconds;
        self
    }

    /// Returns whether the service currently holds the permission.
    ///
    /// RESTRICTED grants count as held here: their conditions are only
    /// evaluable against a concrete call, which this overload does not
    /// carry. Enforcement always goes through [`Self::check_access`].
    pub async fn has_permission(
        &self,
        service_name: &str,
        table_name: &str,
        operation_type: OperationType,
    ) -> bool {
        match self
            .resolve_verdict(service_name, table_name, operation_type)
            .await
        {
            Ok(CachedVerdict::Full | CachedVerdict::Restricted { .. }) => true,
            Ok(CachedVerdict::Denied) => false,
            Err(error) => {
                tracing::warn!(%error, service_name, table_name, "permission lookup failed, denying");
                false
            }
        }
    }

    /// Decides one intercepted call, evaluating RESTRICTED conditions.
    pub async fn check_access(&self, context: &AccessContext) -> AccessDecision {
        let reason = no_permission_reason(
            &context.service_name,
            context.operation_type,
            &context.table_name,
        );

        match self
            .resolve_verdict(
                &context.service_name,
                &context.table_name,
                context.operation_type,
            )
            .await
        {
            Ok(CachedVerdict::Full) => AccessDecision::Allowed,
            Ok(CachedVerdict::Restricted { conditions }) => {
                if evaluate_conditions(&conditions, context) {
                    AccessDecision::Allowed
                } else {
                    AccessDecision::Denied {
                        reason: format!(
                            "service '{}' denied by restricted conditions for {} on table '{}'",
                            context.service_name,
                            context.operation_type.as_str(),
                            context.table_name
                        ),
                    }
                }
            }
            Ok(CachedVerdict::Denied) => AccessDecision::Denied { reason },
            Err(error) => {
                tracing::warn!(%error, "permission lookup failed, denying");
                AccessDecision::Denied { reason }
            }
        }
    }

    /// Drops the cached verdict for one call triple.
    ///
    /// Invoked by the administrative path after permission changes so the
    /// stale-allow window does not have to wait out the TTL.
    pub async fn invalidate(
        &self,
        service_name: &str,
        table_name: &str,
        operation_type: OperationType,
    ) -> AppResult<()> {
        let key = PermissionCacheKey::new(service_name, table_name, operation_type);
        self.cache.invalidate(&key).await
    }

    async fn resolve_verdict(
        &self,
        service_name: &str,
        table_name: &str,
        operation_type: OperationType,
    ) -> AppResult<CachedVerdict> {
        let key = PermissionCacheKey::new(service_name, table_name, operation_type);
        if let Some(verdict) = self.cache.get_verdict(&key).await? {
            return Ok(verdict);
        }

        let verdict = match self
            .repository
            .find_record(service_name, table_name, operation_type)
            .await?
        {
            Some(record) => match record.permission_level {
                PermissionLevel::Full => CachedVerdict::Full,
                PermissionLevel::Restricted => CachedVerdict::Restricted {
                    conditions: record.conditions,
                },
                PermissionLevel::Denied => CachedVerdict::Denied,
            },
            None if self.fallback.allows(service_name, table_name, operation_type) => {
                CachedVerdict::Full
            }
            None => CachedVerdict::Denied,
        };

        // The decision is already made; a failed cache write only costs the
        // next lookup a store read.
        if let Err(error) = self
            .cache
            .set_verdict(&key, verdict.clone(), self.cache_ttl_seconds)
            .await
        {
            tracing::warn!(%error, "failed to cache permission verdict");
        }

        Ok(verdict)
    }
}

pub(crate) fn no_permission_reason(
    service_name: &str,
    operation_type: OperationType,
    table_name: &str,
) -> String {
    format!(
        "service '{service_name}' has no permission for {} on table '{table_name}'",
        operation_type.as_str()
    )
}
