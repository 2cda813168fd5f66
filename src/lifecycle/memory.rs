use super::{AssetKind, AssetStatus, GroupBinding, LifecycleRecord, LifecycleStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

struct BufferedPayload {
    payload: Vec<u8>,
    expires_at: Instant,
}

/// In-process lifecycle store.
///
/// Same semantics as the Redis store: one buffered payload per asset,
/// overwritten on write and invisible after its TTL. Can be switched
/// offline to exercise the store-unavailable paths.
pub struct MemoryLifecycleStore {
    bindings: DashMap<i64, GroupBinding>,
    records: DashMap<String, LifecycleRecord>,
    buffers: DashMap<String, BufferedPayload>,
    buffer_writes: AtomicU64,
    offline: AtomicBool,
}

impl MemoryLifecycleStore {
    pub fn new() -> Self {
        Self {
            bindings: DashMap::new(),
            records: DashMap::new(),
            buffers: DashMap::new(),
            buffer_writes: AtomicU64::new(0),
            offline: AtomicBool::new(false),
        }
    }

    /// Map a chat group to an asset
    pub fn bind_group(&self, group_id: i64, asset_id: &str, kind: AssetKind) {
        self.bindings.insert(
            group_id,
            GroupBinding {
                asset_id: asset_id.to_string(),
                kind,
            },
        );
    }

    /// Overwrite an asset's status as the agent process or idle checker would
    pub fn mark(&self, asset_id: &str, status: AssetStatus) {
        self.records.insert(
            asset_id.to_string(),
            LifecycleRecord {
                status,
                last_activity: Some(Utc::now()),
                last_activity_type: None,
            },
        );
    }

    pub fn record(&self, asset_id: &str) -> Option<LifecycleRecord> {
        self.records.get(asset_id).map(|r| r.clone())
    }

    /// Pending payload for an asset, if one exists and has not expired.
    /// An expired entry is dropped on read.
    pub fn buffered(&self, asset_id: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        self.buffers.remove_if(asset_id, |_, b| b.expires_at <= now);
        self.buffers.get(asset_id).map(|b| b.payload.clone())
    }

    /// Total successful `set_buffer` calls
    pub fn buffer_writes(&self) -> u64 {
        self.buffer_writes.load(Ordering::SeqCst)
    }

    /// Make every call fail with `StoreError::Unavailable`
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store offline".to_string()));
        }
        Ok(())
    }
}

impl Default for MemoryLifecycleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LifecycleStore for MemoryLifecycleStore {
    async fn get_group_binding(&self, group_id: i64) -> Result<Option<GroupBinding>, StoreError> {
        self.check_online()?;
        Ok(self.bindings.get(&group_id).map(|b| b.clone()))
    }

    async fn get_status(&self, asset_id: &str) -> Result<AssetStatus, StoreError> {
        self.check_online()?;
        Ok(self
            .records
            .get(asset_id)
            .map(|r| r.status)
            .unwrap_or(AssetStatus::Unknown))
    }

    async fn set_status(
        &self,
        asset_id: &str,
        status: AssetStatus,
        at: DateTime<Utc>,
        cause: &str,
    ) -> Result<(), StoreError> {
        self.check_online()?;
        self.records.insert(
            asset_id.to_string(),
            LifecycleRecord {
                status,
                last_activity: Some(at),
                last_activity_type: Some(cause.to_string()),
            },
        );
        Ok(())
    }

    async fn set_buffer(
        &self,
        asset_id: &str,
        payload: &[u8],
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.check_online()?;
        let now = Instant::now();
        self.buffers.retain(|_, b| b.expires_at > now);
        self.buffers.insert(
            asset_id.to_string(),
            BufferedPayload {
                payload: payload.to_vec(),
                expires_at: now + ttl,
            },
        );
        self.buffer_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
