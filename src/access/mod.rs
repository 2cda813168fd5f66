// User registry, permission matrix and the hot-swappable store holding them

mod evaluator;
mod store;

#[cfg(test)]
mod tests;

pub use evaluator::{PermissionEvaluator, RoleMatrixEvaluator};
pub use store::{ConfigError, ConfigPaths, ConfigStore};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Wildcard entry in `allowed_intents`
pub const ANY_INTENT: &str = "*";
/// Wildcard entry in `allowed_channels`
pub const ANY_CHANNEL: &str = "all";
/// Wildcard entry in a user's `asset_ids`
pub const ANY_ASSET: &str = "*";

/// Registered user (users.yaml entry)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    /// Platform user id (stable, unique)
    pub telegram_id: i64,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Assets this user may act on. Empty means all assets.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub asset_ids: Vec<String>,
}

impl Identity {
    /// True if the asset list is empty, names `asset_id`, or contains `*`.
    pub fn has_asset_access(&self, asset_id: &str) -> bool {
        if self.asset_ids.is_empty() {
            return true;
        }
        self.asset_ids
            .iter()
            .any(|id| id == asset_id || id == ANY_ASSET)
    }
}

/// users.yaml document
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRegistry {
    #[serde(default)]
    pub users: Vec<Identity>,
}

/// What a single role may do
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RolePermissions {
    #[serde(default)]
    pub allowed_intents: Vec<String>,
    /// "private", "group", "supergroup" or "all"
    #[serde(default)]
    pub allowed_channels: Vec<String>,
}

impl RolePermissions {
    pub fn allows_channel(&self, channel: &str) -> bool {
        self.allowed_channels
            .iter()
            .any(|c| c == ANY_CHANNEL || c == channel)
    }

    pub fn allows_intent(&self, intent: &str) -> bool {
        self.allowed_intents
            .iter()
            .any(|i| i == ANY_INTENT || i == intent)
    }
}

/// permissions.yaml document
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionMatrix {
    #[serde(default)]
    pub roles: HashMap<String, RolePermissions>,
}

/// User registry and permission matrix, always loaded and swapped together.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AccessSnapshot {
    pub users: UserRegistry,
    pub matrix: PermissionMatrix,
}

impl AccessSnapshot {
    pub fn new(users: UserRegistry, matrix: PermissionMatrix) -> Self {
        Self { users, matrix }
    }

    /// Look up a registered user by platform id.
    ///
    /// Returns an owned copy so callers are unaffected by later reloads.
    pub fn resolve(&self, telegram_id: i64) -> Option<Identity> {
        self.users
            .users
            .iter()
            .find(|u| u.telegram_id == telegram_id)
            .cloned()
    }

    pub fn user_count(&self) -> usize {
        self.users.users.len()
    }

    pub fn role_count(&self) -> usize {
        self.matrix.roles.len()
    }
}
