//! Interactive collaborators.
//!
//! Wrap the scripted collaborators so the permission prompt and the
//! settings resolution are answered at the terminal. `dialoguer` blocks, so
//! each prompt runs on the blocking pool and the tracker's tasks keep going.

use dialoguer::Confirm;
use futures::future::{BoxFuture, FutureExt};
use geotrack::simulation::{ScriptedPermissions, ScriptedSettings};
use geotrack::tracking::{
    LocationRequest, PermissionCollaborator, PermissionKind, PermissionState, ResolutionToken,
    SettingsCollaborator, SettingsOutcome,
};

/// Ask a yes/no question. Any prompt failure counts as "no".
async fn confirm(prompt: String, default: bool) -> bool {
    let answer = tokio::task::spawn_blocking(move || {
        Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()
    })
    .await;

    match answer {
        Ok(Ok(answer)) => answer,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Prompt failed, treating as declined");
            false
        }
        Err(e) => {
            tracing::warn!(error = %e, "Prompt task failed, treating as declined");
            false
        }
    }
}

/// Permission store answered at the terminal.
pub struct PromptingPermissions {
    store: ScriptedPermissions,
}

impl PromptingPermissions {
    /// Nothing granted until the user says so.
    pub fn new() -> Self {
        Self {
            store: ScriptedPermissions::unknown(),
        }
    }
}

impl Default for PromptingPermissions {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionCollaborator for PromptingPermissions {
    fn check_permission(&self, kind: PermissionKind) -> PermissionState {
        self.store.check_permission(kind)
    }

    fn request_permissions(&self, kinds: &[PermissionKind]) -> BoxFuture<'_, bool> {
        let kinds = kinds.to_vec();
        let listed = kinds
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" and ");

        async move {
            let granted = confirm(format!("Allow {listed} location access?"), true).await;
            let answer = if granted {
                PermissionState::Granted
            } else {
                PermissionState::Denied
            };
            for kind in kinds {
                self.store.set(kind, answer);
            }
            granted
        }
        .boxed()
    }
}

/// Scripted settings checks with the resolution answered at the terminal.
pub struct PromptingSettings {
    checks: ScriptedSettings,
}

impl PromptingSettings {
    /// Delegate checks to `checks`.
    pub fn new(checks: ScriptedSettings) -> Self {
        Self { checks }
    }
}

impl SettingsCollaborator for PromptingSettings {
    fn check_settings(&self, request: LocationRequest) -> BoxFuture<'_, SettingsOutcome> {
        self.checks.check_settings(request)
    }

    fn present_resolution(&self, token: ResolutionToken) -> BoxFuture<'_, bool> {
        async move {
            confirm(
                format!("Location settings need a change ({token}). Turn it on?"),
                true,
            )
            .await
        }
        .boxed()
    }
}
