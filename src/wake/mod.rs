// Wake/buffer protocol for idle assets

mod compose;


pub use compose::ComposeWaker;

use crate::lifecycle::{AssetStatus, LifecycleStore, WAKE_CAUSE};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Default retention of a buffered payload
pub const DEFAULT_BUFFER_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum WakeError {
    #[error("failed to run wake command: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("wake command for {asset_id} exited with {status}: {output}")]
    CommandFailed {
        asset_id: String,
        status: String,
        output: String,
    },
}

/// Starts a dormant asset's runtime.
///
/// May be slow. Must tolerate being called again for an asset that is
/// already starting.
#[async_trait]
pub trait AssetWaker: Send + Sync {
    async fn wake(&self, asset_id: &str) -> Result<(), WakeError>;
}

/// Acknowledgement handed back to the caller of [`WakeCoordinator::handle_idle`].
#[derive(Debug)]
pub struct WakeTicket {
    pub asset_id: String,
    pub message: String,
    /// Background wake task. `None` when a wake for this asset was already
    /// in flight. Dropping the handle detaches the task.
    pub task: Option<JoinHandle<Result<(), WakeError>>>,
}

/// Buffers the triggering payload and wakes the asset in the background.
pub struct WakeCoordinator {
    store: Arc<dyn LifecycleStore>,
    waker: Arc<dyn AssetWaker>,
    buffer_ttl: Duration,
    in_flight: Arc<DashSet<String>>,
}

impl WakeCoordinator {
    pub fn new(
        store: Arc<dyn LifecycleStore>,
        waker: Arc<dyn AssetWaker>,
        buffer_ttl: Duration,
    ) -> Self {
        Self {
            store,
            waker,
            buffer_ttl,
            in_flight: Arc::new(DashSet::new()),
        }
    }

    /// Handle a message for an idle asset.
    ///
    /// 1. Buffer the raw payload (overwrites any pending one). Failure is
    ///    logged and the wake still proceeds.
    /// 2. Spawn the wake unless one is already in flight for this asset.
    /// 3. On success, mark the asset `active` with cause `wake`.
    ///
    /// Returns as soon as the wake is scheduled.
    pub async fn handle_idle(&self, asset_id: &str, payload: &[u8]) -> WakeTicket {
        info!(asset_id = %asset_id, "Asset is idle, buffering message and waking");

        match self.store.set_buffer(asset_id, payload, self.buffer_ttl).await {
            Ok(()) => info!(
                asset_id = %asset_id,
                ttl_secs = self.buffer_ttl.as_secs(),
                "Message buffered for replay"
            ),
            Err(e) => error!(asset_id = %asset_id, error = %e, "Failed to buffer message"),
        }

        let task = self.spawn_wake(asset_id);

        WakeTicket {
            asset_id: asset_id.to_string(),
            message: format!("Waking {}, message queued for processing", asset_id),
            task,
        }
    }

    /// True while a wake task for `asset_id` is running
    pub fn is_waking(&self, asset_id: &str) -> bool {
        self.in_flight.contains(asset_id)
    }

    fn spawn_wake(&self, asset_id: &str) -> Option<JoinHandle<Result<(), WakeError>>> {
        if !self.in_flight.insert(asset_id.to_string()) {
            info!(asset_id = %asset_id, "Wake already in progress, not starting another");
            return None;
        }

        let guard = InFlightGuard {
            set: Arc::clone(&self.in_flight),
            asset_id: asset_id.to_string(),
        };
        let store = Arc::clone(&self.store);
        let waker = Arc::clone(&self.waker);
        let asset_id = asset_id.to_string();

        Some(tokio::spawn(async move {
            let _guard = guard;

            if let Err(e) = waker.wake(&asset_id).await {
                error!(asset_id = %asset_id, error = %e, "Failed to wake asset");
                return Err(e);
            }

            if let Err(e) = store
                .set_status(&asset_id, AssetStatus::Active, Utc::now(), WAKE_CAUSE)
                .await
            {
                warn!(asset_id = %asset_id, error = %e, "Woke asset but could not record active status");
            }

            info!(asset_id = %asset_id, "Woke asset");
            Ok(())
        }))
    }
}

/// Clears the in-flight marker when the wake task ends, including on panic.
struct InFlightGuard {
    set: Arc<DashSet<String>>,
    asset_id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.remove(&self.asset_id);
    }
}
