use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use tablegate_application::{CachedVerdict, PermissionCache, PermissionCacheKey};
use tablegate_core::AppResult;

#[derive(Debug, Clone)]
struct VerdictCacheEntry {
    verdict: CachedVerdict,
    expires_at: Instant,
}

/// In-memory cache adapter for permission verdicts.
///
/// Suitable for single-process deployments and tests; multi-instance hosts
/// should prefer the Redis adapter so invalidation reaches every replica.
#[derive(Default)]
pub struct InMemoryPermissionCache {
    entries: RwLock<HashMap<String, VerdictCacheEntry>>,
}

impl InMemoryPermissionCache {
    /// Creates an empty in-memory verdict cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PermissionCache for InMemoryPermissionCache {
    async fn get_verdict(&self, key: &PermissionCacheKey) -> AppResult<Option<CachedVerdict>> {
        let storage_key = key.storage_key();
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(&storage_key) {
                if entry.expires_at > Instant::now() {
                    return Ok(Some(entry.verdict.clone()));
                }
            } else {
                return Ok(None);
            }
        }

        let mut entries = self.entries.write().await;
        if entries
            .get(&storage_key)
            .is_some_and(|entry| entry.expires_at <= Instant::now())
        {
            entries.remove(&storage_key);
        }

        Ok(None)
    }

    async fn set_verdict(
        &self,
        key: &PermissionCacheKey,
        verdict: CachedVerdict,
        ttl_seconds: u32,
    ) -> AppResult<()> {
        if ttl_seconds == 0 {
            return Ok(());
        }

        let now = Instant::now();
        let expires_at = now
            .checked_add(Duration::from_secs(u64::from(ttl_seconds)))
            .unwrap_or(now);

        self.entries
            .write()
            .await
            .insert(key.storage_key(), VerdictCacheEntry { verdict, expires_at });

        Ok(())
    }

    async fn invalidate(&self, key: &PermissionCacheKey) -> AppResult<()> {
        self.entries.write().await.remove(&key.storage_key());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tablegate_application::{CachedVerdict, PermissionCache, PermissionCacheKey};
    use tablegate_domain::OperationType;

    use super::InMemoryPermissionCache;

    fn key() -> PermissionCacheKey {
        PermissionCacheKey::new("lead-service", "leads", OperationType::Select)
    }

    #[tokio::test]
    async fn stored_verdicts_are_returned_until_invalidated() {
        let cache = InMemoryPermissionCache::new();

        let stored = cache.set_verdict(&key(), CachedVerdict::Full, 60).await;
        assert!(stored.is_ok());
        assert_eq!(
            cache.get_verdict(&key()).await.ok().flatten(),
            Some(CachedVerdict::Full)
        );

        let invalidated = cache.invalidate(&key()).await;
        assert!(invalidated.is_ok());
        assert_eq!(cache.get_verdict(&key()).await.ok().flatten(), None);
    }

    #[tokio::test]
    async fn zero_ttl_stores_nothing() {
        let cache = InMemoryPermissionCache::new();

        let stored = cache.set_verdict(&key(), CachedVerdict::Denied, 0).await;
        assert!(stored.is_ok());
        assert_eq!(cache.get_verdict(&key()).await.ok().flatten(), None);
    }

    #[tokio::test]
    async fn unknown_keys_miss() {
        let cache = InMemoryPermissionCache::new();
        assert_eq!(cache.get_verdict(&key()).await.ok().flatten(), None);
    }
}
