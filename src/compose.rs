//! Composition of the outbound chat message.
//!
//! The message format is deliberately literal and stable:
//! mentions line, outcome line, `<project> #<number> <url>`, blank line,
//! then the build log excerpt. Tests assert on the exact text.

use tracing::debug;

use crate::build::{BuildRecord, Outcome};
use crate::config::{GlobalConfig, NotifierConfig, RoomCredentials};
use crate::delivery::NotificationPayload;
use crate::mentions::{mention_prefix, resolve_mentions, HandleDirectory};

/// A composed outbound message, immutable once built.
#[derive(Debug, Clone)]
pub struct Message {
    text: String,
    credentials: RoomCredentials,
}

impl Message {
    /// The composed message text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The credentials routing this message.
    pub fn credentials(&self) -> &RoomCredentials {
        &self.credentials
    }

    /// Convert into the wire payload handed to the delivery backend.
    pub fn into_payload(self) -> NotificationPayload {
        NotificationPayload {
            email: self.credentials.account_id,
            password: self.credentials.password,
            domain: self.credentials.domain,
            room_name: self.credentials.room,
            message: self.text,
        }
    }
}

/// Compose the status message for a finished build.
///
/// Mentions are resolved only for non-successful builds, and mention
/// resolution can never abort composition: every per-user failure is
/// recovered inside the resolver. The build URL is appended only when
/// `include_url` resolves true (local over global) and is
/// `global.base_url` + the build's URL suffix.
pub async fn compose(
    build: &BuildRecord,
    project: &NotifierConfig,
    global: &GlobalConfig,
    directory: &dyn HandleDirectory,
    credentials: RoomCredentials,
) -> Message {
    let to_blame = if build.outcome == Outcome::Success {
        String::new()
    } else {
        mention_prefix(&resolve_mentions(build, directory).await)
    };

    let url = if project.should_include_url(global) {
        format!("{}{}", global.base_url, build.url_suffix)
    } else {
        String::new()
    };

    let text = format!(
        "{to_blame}\nBUILD {outcome} \n{project} #{number} {url} \n\n{log}",
        outcome = build.outcome,
        project = build.project,
        number = build.number,
        log = build.log_excerpt,
    );
    debug!(
        project = %build.project,
        number = build.number,
        text_len = text.len(),
        "status message composed"
    );

    Message { text, credentials }
}
