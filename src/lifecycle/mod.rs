//! Cross-process asset lifecycle state.
//!
//! The router and the wake coordinator only see the [`LifecycleStore`]
//! trait. Production deployments use Redis; tests and single-host setups use
//! the in-memory store.

mod memory;
mod redis_store;

pub use memory::MemoryLifecycleStore;
pub use redis_store::RedisLifecycleStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Key layout shared with the fleet tooling
pub mod keys {
    pub const GROUP_MAP: &str = "fleet:group_map:";
    pub const LIFECYCLE: &str = "fleet:lifecycle:";
    pub const WAKE_BUFFER: &str = "fleet:wake_buffer:";

    pub fn group_map(group_id: i64) -> String {
        format!("{}{}", GROUP_MAP, group_id)
    }

    pub fn lifecycle(asset_id: &str) -> String {
        format!("{}{}", LIFECYCLE, asset_id)
    }

    pub fn wake_buffer(asset_id: &str) -> String {
        format!("{}{}", WAKE_BUFFER, asset_id)
    }
}

/// Cause tag written when this service marks an asset active
pub const WAKE_CAUSE: &str = "wake";

/// What is deployed behind a chat group
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// Asset with its own agent container (may be idled)
    Agent,
    /// Asset without an agent, handled by the coordinator
    Tracked,
    /// The fleet coordinator itself
    Coordinator,
}

impl AssetKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "agent" => Some(AssetKind::Agent),
            "tracked" => Some(AssetKind::Tracked),
            "coordinator" => Some(AssetKind::Coordinator),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Agent => "agent",
            AssetKind::Tracked => "tracked",
            AssetKind::Coordinator => "coordinator",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    Active,
    Idle,
    Unknown,
}

impl AssetStatus {
    /// Anything unrecognized is `Unknown`
    pub fn parse(s: &str) -> Self {
        match s {
            "active" => AssetStatus::Active,
            "idle" => AssetStatus::Idle,
            _ => AssetStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::Active => "active",
            AssetStatus::Idle => "idle",
            AssetStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chat group -> asset mapping
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupBinding {
    pub asset_id: String,
    pub kind: AssetKind,
}

/// Lifecycle hash of one asset
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LifecycleRecord {
    pub status: AssetStatus,
    pub last_activity: Option<DateTime<Utc>>,
    pub last_activity_type: Option<String>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("lifecycle store unavailable: {0}")]
    Unavailable(String),
    #[error("lifecycle store error: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<deadpool_redis::PoolError> for StoreError {
    fn from(e: deadpool_redis::PoolError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// Narrow view of the lifecycle key-value store.
///
/// Each call touches a single key; implementations need no transactions.
#[async_trait]
pub trait LifecycleStore: Send + Sync {
    /// Binding for a chat group, `None` if the group is not mapped.
    async fn get_group_binding(&self, group_id: i64) -> Result<Option<GroupBinding>, StoreError>;

    /// Current status of an asset. A missing record is `Unknown`.
    async fn get_status(&self, asset_id: &str) -> Result<AssetStatus, StoreError>;

    async fn set_status(
        &self,
        asset_id: &str,
        status: AssetStatus,
        at: DateTime<Utc>,
        cause: &str,
    ) -> Result<(), StoreError>;

    /// Store the pending payload for an asset, replacing any previous one.
    async fn set_buffer(&self, asset_id: &str, payload: &[u8], ttl: Duration)
        -> Result<(), StoreError>;
}
