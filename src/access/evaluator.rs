use super::{Identity, PermissionMatrix};
use crate::event::ChannelClass;

/// Decides whether an identity may perform `intent` in a channel class.
///
/// The router calls this only on the local authorized path; it takes the
/// matrix of the snapshot the request already holds.
pub trait PermissionEvaluator: Send + Sync {
    fn is_allowed(
        &self,
        matrix: &PermissionMatrix,
        identity: &Identity,
        intent: &str,
        channel: ChannelClass,
    ) -> bool;
}

/// OR over the identity's roles. A role counts only if it allows the
/// channel class; unknown role names are skipped. There is no deny rule.
#[derive(Clone, Copy, Debug, Default)]
pub struct RoleMatrixEvaluator;

impl PermissionEvaluator for RoleMatrixEvaluator {
    fn is_allowed(
        &self,
        matrix: &PermissionMatrix,
        identity: &Identity,
        intent: &str,
        channel: ChannelClass,
    ) -> bool {
        identity
            .roles
            .iter()
            .filter_map(|role| matrix.roles.get(role))
            .filter(|perms| perms.allows_channel(channel.as_str()))
            .any(|perms| perms.allows_intent(intent))
    }
}
