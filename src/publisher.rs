//! Publisher orchestrator: the reaction to a build-completed event.
//!
//! Wires policy, composition, and delivery together. The notifier is
//! advisory infrastructure, never a build gate: every error on this path is
//! logged and swallowed, and the triggering build's outcome is untouched.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::build::BuildRecord;
use crate::compose::compose;
use crate::config::{NotifierConfig, NotifierSettings, RoomCredentials};
use crate::delivery::bridge::ScriptBridge;
use crate::delivery::DeliveryBackend;
use crate::mentions::HandleDirectory;
use crate::policy::should_notify;

/// Reacts to build completions by publishing chat notifications.
///
/// Owns exactly one long-lived delivery backend; backends are expensive to
/// construct (the scripted bridge boots an interpreter) and must not be
/// recreated per build.
pub struct Publisher {
    settings: NotifierSettings,
    backend: Arc<dyn DeliveryBackend>,
    directory: Arc<dyn HandleDirectory>,
}

impl Publisher {
    /// Create a publisher with an explicit delivery backend.
    pub fn new(
        settings: NotifierSettings,
        backend: Arc<dyn DeliveryBackend>,
        directory: Arc<dyn HandleDirectory>,
    ) -> Self {
        if RoomCredentials::resolve(&NotifierConfig::default(), &settings.global).is_err() {
            warn!(
                "global room credentials are incomplete; \
                 projects without their own overrides will not notify"
            );
        }
        Self {
            settings,
            backend,
            directory,
        }
    }

    /// Create a publisher delivering through the scripted bridge configured
    /// in `settings.bridge`.
    pub fn with_script_bridge(
        settings: NotifierSettings,
        directory: Arc<dyn HandleDirectory>,
    ) -> Self {
        let bridge = Arc::new(ScriptBridge::new(settings.bridge.clone()));
        Self::new(settings, bridge, directory)
    }

    /// React to a completed build.
    ///
    /// Resolves the project's config, consults the notification policy,
    /// composes and delivers the message. Never returns an error and never
    /// panics: delivery is best-effort and the build result must not be
    /// affected by anything that happens here.
    pub async fn build_completed(&self, build: &BuildRecord) {
        let project = self.settings.project(&build.project);
        self.notify(build, &project).await;
    }

    /// React to a completed build with an explicitly supplied project
    /// config, for callers that carry per-project settings themselves.
    pub async fn build_completed_with(&self, build: &BuildRecord, project: &NotifierConfig) {
        self.notify(build, project).await;
    }

    async fn notify(&self, build: &BuildRecord, project: &NotifierConfig) {
        if !should_notify(build, project, &self.settings.global) {
            debug!(
                project = %build.project,
                number = build.number,
                "notification suppressed by policy"
            );
            return;
        }

        let credentials = match RoomCredentials::resolve(project, &self.settings.global) {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!(
                    project = %build.project,
                    number = build.number,
                    error = %e,
                    "cannot notify: room credentials unresolved"
                );
                return;
            }
        };

        let message = compose(
            build,
            project,
            &self.settings.global,
            self.directory.as_ref(),
            credentials,
        )
        .await;

        let payload = message.into_payload();
        if let Err(e) = self.backend.deliver(&payload).await {
            warn!(
                project = %build.project,
                number = build.number,
                error = %e,
                "unable to send build notification"
            );
        } else {
            debug!(
                project = %build.project,
                number = build.number,
                room = %payload.room_name,
                "build notification delivered"
            );
        }
    }
}
