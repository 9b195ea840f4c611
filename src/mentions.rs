//! Mapping build participants to chat mentions.
//!
//! The build server owns per-user handle storage; this module only consumes
//! it through [`HandleDirectory`]. Resolution is best-effort by contract: a
//! user with no configured handle, or whose lookup fails, is skipped and
//! never aborts composition.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use crate::build::BuildRecord;

/// A failed per-user handle lookup.
#[derive(Debug, thiserror::Error)]
#[error("handle lookup failed for '{user}': {reason}")]
pub struct HandleLookupError {
    /// The user id whose lookup failed.
    pub user: String,
    /// Backend-specific failure description.
    pub reason: String,
}

/// Source of per-user chat handles.
///
/// Implementations are expected to be cheap to query per build participant;
/// failures are recovered by the resolver, so they need not be rare.
#[async_trait]
pub trait HandleDirectory: Send + Sync {
    /// The chat handle configured for `user_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`HandleLookupError`] when the lookup itself fails. The
    /// resolver treats this the same as an absent handle.
    async fn chat_handle(&self, user_id: &str) -> Result<Option<String>, HandleLookupError>;
}

/// In-memory handle directory.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    handles: HashMap<String, String>,
}

impl StaticDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle for a user.
    pub fn insert(&mut self, user_id: impl Into<String>, handle: impl Into<String>) {
        self.handles.insert(user_id.into(), handle.into());
    }
}

#[async_trait]
impl HandleDirectory for StaticDirectory {
    async fn chat_handle(&self, user_id: &str) -> Result<Option<String>, HandleLookupError> {
        Ok(self.handles.get(user_id).cloned())
    }
}

/// Resolve the mentions for a build, as `"@handle"` strings.
///
/// Culprits win when present; set iteration order is unspecified. With no
/// culprits, change-entry authors are used in change order. Repeated handles
/// are not deduplicated. Participants without a handle, or whose lookup
/// fails, are skipped.
pub async fn resolve_mentions(build: &BuildRecord, directory: &dyn HandleDirectory) -> Vec<String> {
    let participants: Vec<&str> = if build.culprits.is_empty() {
        build.changes.iter().map(|c| c.author.as_str()).collect()
    } else {
        build.culprits.iter().map(String::as_str).collect()
    };

    let mut mentions = Vec::with_capacity(participants.len());
    for user in participants {
        match directory.chat_handle(user).await {
            Ok(Some(handle)) => mentions.push(format!("@{handle}")),
            Ok(None) => debug!(user, "no chat handle configured, skipping mention"),
            Err(e) => debug!(user, error = %e, "handle lookup failed, skipping mention"),
        }
    }
    mentions
}

/// Join mentions into the message prefix: each mention followed by a space.
pub fn mention_prefix(mentions: &[String]) -> String {
    let mut prefix = String::new();
    for mention in mentions {
        prefix.push_str(mention);
        prefix.push(' ');
    }
    prefix
}
