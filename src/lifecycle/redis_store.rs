use super::{
    keys, AssetKind, AssetStatus, GroupBinding, LifecycleStore, StoreError,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use deadpool_redis::{Config as RedisConfig, Pool as RedisPool, Runtime};
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

/// Lifecycle store backed by Redis, sharing keys with the fleet tooling:
///
/// - `fleet:group_map:<chat_id>` hash with `asset_id`, `type`
/// - `fleet:lifecycle:<asset_id>` hash with `status`, `last_activity`, `last_activity_type`
/// - `fleet:wake_buffer:<asset_id>` string with expiry
pub struct RedisLifecycleStore {
    pool: RedisPool,
}

impl RedisLifecycleStore {
    /// Build the pool and verify the server answers `PING`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = RedisConfig::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let mut conn = pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        info!("Connected to Redis for lifecycle routing");
        Ok(Self { pool })
    }
}

#[async_trait]
impl LifecycleStore for RedisLifecycleStore {
    async fn get_group_binding(&self, group_id: i64) -> Result<Option<GroupBinding>, StoreError> {
        let mut conn = self.pool.get().await?;
        let data: HashMap<String, String> = conn.hgetall(keys::group_map(group_id)).await?;
        Ok(binding_from_hash(group_id, &data))
    }

    async fn get_status(&self, asset_id: &str) -> Result<AssetStatus, StoreError> {
        let mut conn = self.pool.get().await?;
        let status: Option<String> = conn.hget(keys::lifecycle(asset_id), "status").await?;
        Ok(status
            .as_deref()
            .map(AssetStatus::parse)
            .unwrap_or(AssetStatus::Unknown))
    }

    async fn set_status(
        &self,
        asset_id: &str,
        status: AssetStatus,
        at: DateTime<Utc>,
        cause: &str,
    ) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        let timestamp = at.to_rfc3339_opts(SecondsFormat::Secs, true);
        conn.hset_multiple::<_, _, _, ()>(
            keys::lifecycle(asset_id),
            &[
                ("status", status.as_str()),
                ("last_activity", timestamp.as_str()),
                ("last_activity_type", cause),
            ],
        )
        .await?;
        Ok(())
    }

    async fn set_buffer(
        &self,
        asset_id: &str,
        payload: &[u8],
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        // SETEX rejects a zero expiry
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(keys::wake_buffer(asset_id), payload, seconds)
            .await?;
        Ok(())
    }
}

/// An empty hash means the group is not mapped. Entries with an unknown
/// `type` are ignored so the event takes the local path.
fn binding_from_hash(group_id: i64, data: &HashMap<String, String>) -> Option<GroupBinding> {
    if data.is_empty() {
        return None;
    }

    let asset_id = data.get("asset_id").filter(|id| !id.is_empty())?;
    let kind_raw = data.get("type").map(String::as_str).unwrap_or_default();
    match AssetKind::parse(kind_raw) {
        Some(kind) => Some(GroupBinding {
            asset_id: asset_id.clone(),
            kind,
        }),
        None => {
            warn!(group_id, kind = %kind_raw, "Ignoring group mapping with unknown asset type");
            None
        }
    }
}
