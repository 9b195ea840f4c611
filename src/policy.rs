//! Notification policy: should a finished build be announced at all?
//!
//! The per-project tri-state flag always wins when set; an unset flag defers
//! to the global default with the same semantics. Aborted and never-run
//! builds stay silent under failure-or-recovery filtering no matter what
//! came before them.

use tracing::debug;

use crate::build::{BuildRecord, Outcome};
use crate::config::{GlobalConfig, NotifierConfig};

/// Decide whether the given build should produce a notification.
///
/// Resolution order: the project's `only_on_failure_or_recovery` tri-state
/// when set (`true` → defer to [`is_failure_or_recovery`], `false` → always
/// notify), otherwise the global flag with the same semantics.
pub fn should_notify(build: &BuildRecord, project: &NotifierConfig, global: &GlobalConfig) -> bool {
    let only_on_failure_or_recovery = project
        .only_on_failure_or_recovery
        .unwrap_or(global.only_on_failure_or_recovery);

    let notify = if only_on_failure_or_recovery {
        is_failure_or_recovery(build)
    } else {
        true
    };

    debug!(
        project = %build.project,
        number = build.number,
        outcome = %build.outcome,
        notify,
        "notification policy evaluated"
    );
    notify
}

/// Whether this build is a failure or a recovery.
///
/// A failure includes both failed and unstable builds. A recovery is a
/// successful build whose immediate predecessor was not successful. All
/// other outcomes, notably aborted builds, never qualify.
pub fn is_failure_or_recovery(build: &BuildRecord) -> bool {
    match build.outcome {
        Outcome::Failure | Outcome::Unstable => true,
        Outcome::Success => build
            .previous()
            .is_some_and(|prev| prev.outcome != Outcome::Success),
        Outcome::Aborted | Outcome::NotBuilt => false,
    }
}
