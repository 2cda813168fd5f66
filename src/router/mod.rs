//! Lifecycle-aware routing decision.
//!
//! Events from a chat bound to another asset or service are routed on the
//! binding alone: they are inter-service traffic, not end-user commands, and
//! the permission matrix is never consulted for them. Only traffic for this
//! asset, in the active state, goes through identity and permission checks.

use crate::access::{ConfigStore, PermissionEvaluator};
use crate::event::ClassifiedEvent;
use crate::lifecycle::{AssetKind, AssetStatus, GroupBinding, LifecycleStore};
use crate::wake::{WakeCoordinator, WakeTicket};
use std::sync::Arc;
use tracing::{info, warn};


/// Target state derived per request from the group binding and status
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetState {
    /// Local traffic: unbound chat, or this agent while not idle
    SelfActive,
    PeerTracked,
    PeerCoordinator,
    /// Bound agent that is currently idle
    SelfIdle,
}

/// Pure state derivation. `status` is only meaningful for agent bindings.
pub fn target_state(binding: Option<&GroupBinding>, status: AssetStatus) -> TargetState {
    match binding.map(|b| b.kind) {
        Some(AssetKind::Agent) if status == AssetStatus::Idle => TargetState::SelfIdle,
        Some(AssetKind::Tracked) => TargetState::PeerTracked,
        Some(AssetKind::Coordinator) => TargetState::PeerCoordinator,
        _ => TargetState::SelfActive,
    }
}

/// Business-level denial class reported to the caller
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectKind {
    Unauthorized,
    Denied,
}

impl RejectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectKind::Unauthorized => "unauthorized",
            RejectKind::Denied => "denied",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejection {
    pub kind: RejectKind,
    pub message: String,
}

impl Rejection {
    fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            kind: RejectKind::Unauthorized,
            message: message.into(),
        }
    }

    fn denied(message: impl Into<String>) -> Self {
        Self {
            kind: RejectKind::Denied,
            message: message.into(),
        }
    }
}

/// What to do with an inbound event
#[derive(Debug)]
pub enum RouteDecision {
    /// Authorized end-user traffic for this asset
    ForwardToAgent { user: String, intent: String },
    /// Coordinator traffic, relayed to the local agent unchecked
    ForwardCoordinator { asset_id: String },
    /// Tracked asset without an agent, relayed to its remote handler
    ForwardTracked { asset_id: String },
    /// Idle asset: payload buffered and wake scheduled
    Waking(WakeTicket),
    Reject(Rejection),
}

/// Decides the route for each event.
///
/// Holds injected handles only; no state of its own between requests.
pub struct LifecycleRouter {
    asset_id: String,
    config: Arc<ConfigStore>,
    evaluator: Arc<dyn PermissionEvaluator>,
    lifecycle: Option<Arc<dyn LifecycleStore>>,
    wake: Option<Arc<WakeCoordinator>>,
}

impl LifecycleRouter {
    pub fn new(
        asset_id: impl Into<String>,
        config: Arc<ConfigStore>,
        evaluator: Arc<dyn PermissionEvaluator>,
    ) -> Self {
        Self {
            asset_id: asset_id.into(),
            config,
            evaluator,
            lifecycle: None,
            wake: None,
        }
    }

    /// Enable lifecycle routing. Without it every event takes the local
    /// authorized path.
    pub fn with_lifecycle(
        mut self,
        store: Arc<dyn LifecycleStore>,
        wake: Arc<WakeCoordinator>,
    ) -> Self {
        self.lifecycle = Some(store);
        self.wake = Some(wake);
        self
    }

    /// Route one event. `raw` is the untouched webhook body, buffered as-is
    /// on the idle path.
    pub async fn route(&self, event: &ClassifiedEvent, raw: &[u8]) -> RouteDecision {
        if let Some(decision) = self.route_by_binding(event, raw).await {
            return decision;
        }
        self.authorize_local(event)
    }

    /// Steps 1-3: cross-routing short-circuit. `None` means local path.
    async fn route_by_binding(&self, event: &ClassifiedEvent, raw: &[u8]) -> Option<RouteDecision> {
        let group_id = event.group_id?;
        let store = self.lifecycle.as_ref()?;

        let binding = match store.get_group_binding(group_id).await {
            Ok(Some(binding)) => binding,
            Ok(None) => return None,
            Err(e) => {
                warn!(group_id, error = %e, "Group lookup failed, using local routing");
                return None;
            }
        };

        let status = if binding.kind == AssetKind::Agent {
            store.get_status(&binding.asset_id).await.unwrap_or_else(|e| {
                warn!(asset_id = %binding.asset_id, error = %e, "Status lookup failed");
                AssetStatus::Unknown
            })
        } else {
            AssetStatus::Unknown
        };

        match target_state(Some(&binding), status) {
            TargetState::SelfIdle => {
                // Without a coordinator the message cannot be queued; handle it locally
                let wake = self.wake.as_ref()?;
                let ticket = wake.handle_idle(&binding.asset_id, raw).await;
                Some(RouteDecision::Waking(ticket))
            }
            TargetState::PeerTracked => {
                info!(asset_id = %binding.asset_id, "Tracked asset message forwarded to coordinator");
                Some(RouteDecision::ForwardTracked {
                    asset_id: binding.asset_id,
                })
            }
            TargetState::PeerCoordinator => {
                info!(asset_id = %binding.asset_id, "Coordinator message");
                Some(RouteDecision::ForwardCoordinator {
                    asset_id: binding.asset_id,
                })
            }
            TargetState::SelfActive => None,
        }
    }

    /// Step 4: identity, asset access and permission checks.
    fn authorize_local(&self, event: &ClassifiedEvent) -> RouteDecision {
        let Some(sender) = &event.sender else {
            info!(kind = %event.kind, "Rejected update: could not extract user info");
            return RouteDecision::Reject(Rejection::unauthorized("Could not identify user"));
        };

        // One snapshot for the whole evaluation
        let snapshot = self.config.snapshot();

        let Some(user) = snapshot.resolve(sender.id) else {
            info!(
                telegram_id = sender.id,
                name = %sender.display_name(),
                kind = %event.kind,
                "Unauthorized user"
            );
            return RouteDecision::Reject(Rejection::unauthorized("User not registered"));
        };

        if !user.has_asset_access(&self.asset_id) {
            info!(user = %user.name, asset_id = %self.asset_id, "User denied access to asset");
            return RouteDecision::Reject(Rejection::unauthorized("No access to this asset"));
        }

        if !self
            .evaluator
            .is_allowed(&snapshot.matrix, &user, &event.intent, event.channel)
        {
            info!(
                user = %user.name,
                intent = %event.intent,
                channel = %event.channel,
                kind = %event.kind,
                "User denied permission"
            );
            return RouteDecision::Reject(Rejection::denied(format!(
                "Permission denied for {}",
                event.intent
            )));
        }

        info!(
            user = %user.name,
            intent = %event.intent,
            channel = %event.channel,
            asset_id = %self.asset_id,
            kind = %event.kind,
            "Authorized"
        );
        RouteDecision::ForwardToAgent {
            user: user.name,
            intent: event.intent.clone(),
        }
    }
}
