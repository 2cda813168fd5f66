use super::{AccessSnapshot, Identity, PermissionMatrix, UserRegistry};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{error, info};

/// Locations of the two access documents
#[derive(Clone, Debug, PartialEq)]
pub struct ConfigPaths {
    pub users: PathBuf,
    pub permissions: PathBuf,
}

impl ConfigPaths {
    pub fn new(users: impl Into<PathBuf>, permissions: impl Into<PathBuf>) -> Self {
        Self {
            users: users.into(),
            permissions: permissions.into(),
        }
    }

    /// True if `path` is one of the two documents
    pub fn contains(&self, path: &Path) -> bool {
        path == self.users || path == self.permissions
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Holds the active [`AccessSnapshot`].
///
/// Readers clone the inner `Arc` and evaluate against it for the rest of the
/// request, so a concurrent swap never changes what an in-flight request
/// sees. A failed load never replaces the active snapshot.
pub struct ConfigStore {
    current: RwLock<Arc<AccessSnapshot>>,
    generation: AtomicU64,
}

impl ConfigStore {
    pub fn new(snapshot: AccessSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
            generation: AtomicU64::new(0),
        }
    }

    /// Parse both documents. Nothing is swapped.
    pub fn load(paths: &ConfigPaths) -> Result<AccessSnapshot, ConfigError> {
        let users: UserRegistry = load_yaml(&paths.users)?;
        let matrix: PermissionMatrix = load_yaml(&paths.permissions)?;
        Ok(AccessSnapshot::new(users, matrix))
    }

    /// Current snapshot. Hold on to the returned `Arc` for the whole evaluation.
    pub fn snapshot(&self) -> Arc<AccessSnapshot> {
        self.current
            .read()
            .expect("AccessSnapshot lock poisoned")
            .clone()
    }

    /// Replace the active snapshot.
    pub fn swap(&self, snapshot: AccessSnapshot) {
        let mut current = self.current.write().expect("AccessSnapshot lock poisoned");
        *current = Arc::new(snapshot);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Load both documents and swap them in. On error the previous snapshot
    /// stays active and the error is logged and returned.
    pub fn reload(&self, paths: &ConfigPaths) -> Result<(), ConfigError> {
        match Self::load(paths) {
            Ok(snapshot) => {
                let users = snapshot.user_count();
                let roles = snapshot.role_count();
                self.swap(snapshot);
                info!(users, roles, "Access config reloaded");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Access config reload failed, keeping previous config");
                Err(e)
            }
        }
    }

    /// Resolve a platform user id against the current snapshot.
    pub fn resolve(&self, telegram_id: i64) -> Option<Identity> {
        self.snapshot().resolve(telegram_id)
    }

    /// Number of successful swaps since creation
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(AccessSnapshot::default())
    }
}

fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
