//! Permission Gate.
//!
//! Tracking needs both the fine and the coarse location permission. The gate
//! folds the per-permission answers of the platform into one
//! [`PermissionState`] and issues the prompt when one is needed.
//!
//! The gate never caches: every `start()` and every permission result goes
//! back to the platform for a fresh answer.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

/// A location permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionKind {
    /// Precise (GPS) location.
    Fine,
    /// Approximate (network) location.
    Coarse,
}

impl PermissionKind {
    /// Permissions required before tracking can start.
    pub const REQUIRED: [PermissionKind; 2] = [PermissionKind::Fine, PermissionKind::Coarse];
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fine => write!(f, "fine"),
            Self::Coarse => write!(f, "coarse"),
        }
    }
}

/// Result of a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionState {
    /// Never asked, or the platform cannot tell.
    #[default]
    Unknown,
    /// Permission held.
    Granted,
    /// Permission refused.
    Denied,
}

/// Platform permission store and prompt.
pub trait PermissionCollaborator: Send + Sync {
    /// Current state of a single permission.
    fn check_permission(&self, kind: PermissionKind) -> PermissionState;

    /// Prompt for the given permissions.
    ///
    /// Resolves to true only if all of them were granted.
    fn request_permissions(&self, kinds: &[PermissionKind]) -> BoxFuture<'_, bool>;
}

/// Checks and requests the location permissions.
#[derive(Clone)]
pub struct PermissionGate {
    collaborator: Arc<dyn PermissionCollaborator>,
}

impl PermissionGate {
    /// Create a gate over the platform permission collaborator.
    pub fn new(collaborator: Arc<dyn PermissionCollaborator>) -> Self {
        Self { collaborator }
    }

    /// Combined state of all required permissions.
    ///
    /// Granted only when every permission is granted. Any explicit denial
    /// wins over an unknown answer.
    pub fn check(&self) -> PermissionState {
        let mut combined = PermissionState::Granted;
        for kind in PermissionKind::REQUIRED {
            match self.collaborator.check_permission(kind) {
                PermissionState::Granted => {}
                PermissionState::Denied => {
                    tracing::debug!(permission = %kind, "Location permission denied");
                    return PermissionState::Denied;
                }
                PermissionState::Unknown => combined = PermissionState::Unknown,
            }
        }
        combined
    }

    /// Prompt for all required permissions.
    pub async fn request(&self) -> bool {
        tracing::info!("Requesting location permissions");
        let granted = self
            .collaborator
            .request_permissions(&PermissionKind::REQUIRED)
            .await;
        tracing::info!(granted, "Location permission prompt completed");
        granted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::ScriptedPermissions;

    #[test]
    fn test_all_granted() {
        let permissions = Arc::new(ScriptedPermissions::granted());
        let gate = PermissionGate::new(permissions);
        assert_eq!(gate.check(), PermissionState::Granted);
    }

    #[test]
    fn test_one_unknown_is_unknown() {
        let permissions = Arc::new(ScriptedPermissions::granted());
        permissions.set(PermissionKind::Coarse, PermissionState::Unknown);
        let gate = PermissionGate::new(permissions);
        assert_eq!(gate.check(), PermissionState::Unknown);
    }

    #[test]
    fn test_denial_wins_over_unknown() {
        let permissions = Arc::new(ScriptedPermissions::unknown());
        permissions.set(PermissionKind::Coarse, PermissionState::Denied);
        let gate = PermissionGate::new(permissions);
        assert_eq!(gate.check(), PermissionState::Denied);
    }

    #[tokio::test]
    async fn test_request_grants_and_updates_store() {
        let permissions = Arc::new(ScriptedPermissions::unknown().grant_on_request(true));
        let gate = PermissionGate::new(permissions.clone());

        assert!(gate.request().await);
        assert_eq!(permissions.request_count(), 1);
        assert_eq!(gate.check(), PermissionState::Granted);
    }

    #[tokio::test]
    async fn test_request_declined() {
        let permissions = Arc::new(ScriptedPermissions::unknown().grant_on_request(false));
        let gate = PermissionGate::new(permissions.clone());

        assert!(!gate.request().await);
        assert_eq!(gate.check(), PermissionState::Denied);
    }
}
