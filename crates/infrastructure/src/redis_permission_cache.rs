//! Redis-backed permission verdict cache.

use async_trait::async_trait;
use redis::AsyncCommands;

use tablegate_application::{CachedVerdict, PermissionCache, PermissionCacheKey};
use tablegate_core::{AppError, AppResult};

/// Redis implementation of the permission cache port.
///
/// Verdicts are stored as JSON under `{prefix}:{service}:{table}:{operation}`
/// keys with a per-entry TTL, so expiry needs no sweeper and invalidation is
/// a plain delete.
#[derive(Clone)]
pub struct RedisPermissionCache {
    client: redis::Client,
    key_prefix: String,
}

impl RedisPermissionCache {
    /// Creates a cache adapter with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, key: &PermissionCacheKey) -> String {
        format!("{}:{}", self.key_prefix, key.storage_key())
    }

    fn encode_verdict(verdict: &CachedVerdict) -> AppResult<String> {
        serde_json::to_string(verdict).map_err(|error| {
            AppError::Internal(format!("failed to encode permission verdict: {error}"))
        })
    }

    fn decode_verdict(value: &str) -> AppResult<CachedVerdict> {
        serde_json::from_str(value).map_err(|error| {
            AppError::Internal(format!(
                "invalid permission verdict cache value '{value}': {error}"
            ))
        })
    }
}

#[async_trait]
impl PermissionCache for RedisPermissionCache {
    async fn get_verdict(&self, key: &PermissionCacheKey) -> AppResult<Option<CachedVerdict>> {
        let key = self.key_for(key);
        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))?;

        let encoded: Option<String> = connection.get(key).await.map_err(|error| {
            AppError::Internal(format!("failed to read permission cache entry: {error}"))
        })?;

        encoded.as_deref().map(Self::decode_verdict).transpose()
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

        let key = self.key_for(key);
        let value = Self::encode_verdict(&verdict)?;
        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))?;

        connection
            .set_ex(key, value, u64::from(ttl_seconds))
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to write permission cache entry: {error}"))
            })
    }

    async fn invalidate(&self, key: &PermissionCacheKey) -> AppResult<()> {
        let key = self.key_for(key);
        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))?;

        let _: () = connection.del(key).await.map_err(|error| {
            AppError::Internal(format!("failed to drop permission cache entry: {error}"))
        })?;

        Ok(())
    }
}
