//! Build records as received from the build server.
//!
//! A [`BuildRecord`] is an immutable snapshot of one finished build. The
//! build server owns persistence; this crate only reads these values while
//! reacting to a build-completed event.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// The outcome of a finished build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The build completed without errors.
    Success,
    /// The build failed outright.
    Failure,
    /// The build compiled but quality gates (tests, analysis) degraded.
    Unstable,
    /// The build was cancelled before finishing.
    Aborted,
    /// The build never ran.
    NotBuilt,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Unstable => "UNSTABLE",
            Self::Aborted => "ABORTED",
            Self::NotBuilt => "NOT_BUILT",
        };
        f.write_str(label)
    }
}

/// A recorded source change associated with a build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEntry {
    /// User id of the change author.
    pub author: String,
    /// Free-form change summary.
    pub summary: String,
}

impl ChangeEntry {
    /// Create a change entry.
    pub fn new(author: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            summary: summary.into(),
        }
    }
}

/// Immutable view of one finished build.
///
/// The link to the preceding build, when present, always refers to a build
/// of the same project with a strictly smaller number; [`BuildRecord::with_previous`]
/// enforces this at link time.
#[derive(Debug, Clone)]
pub struct BuildRecord {
    /// Project name.
    pub project: String,
    /// Build ordinal within the project.
    pub number: u32,
    /// Final outcome.
    pub outcome: Outcome,
    /// Path suffix appended to the server base URL to reach this build.
    pub url_suffix: String,
    /// Tail of the build log, free-form text.
    pub log_excerpt: String,
    /// Users implicated in breaking the build. Unordered.
    pub culprits: HashSet<String>,
    /// Source changes that went into this build, in change order.
    pub changes: Vec<ChangeEntry>,
    previous: Option<Arc<BuildRecord>>,
}

impl BuildRecord {
    /// Create a build record with no previous-build link.
    pub fn new(project: impl Into<String>, number: u32, outcome: Outcome) -> Self {
        Self {
            project: project.into(),
            number,
            outcome,
            url_suffix: String::new(),
            log_excerpt: String::new(),
            culprits: HashSet::new(),
            changes: Vec::new(),
            previous: None,
        }
    }

    /// Set the URL suffix for this build.
    #[must_use]
    pub fn with_url_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.url_suffix = suffix.into();
        self
    }

    /// Set the log excerpt for this build.
    #[must_use]
    pub fn with_log(mut self, log: impl Into<String>) -> Self {
        self.log_excerpt = log.into();
        self
    }

    /// Set the culprit user ids for this build.
    #[must_use]
    pub fn with_culprits<I, S>(mut self, culprits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.culprits = culprits.into_iter().map(Into::into).collect();
        self
    }

    /// Set the ordered change entries for this build.
    #[must_use]
    pub fn with_changes(mut self, changes: Vec<ChangeEntry>) -> Self {
        self.changes = changes;
        self
    }

    /// Link the immediately preceding build of the same project.
    ///
    /// Returns an error when the link would violate the record invariant:
    /// the previous build must belong to the same project and carry a
    /// strictly smaller build number.
    pub fn with_previous(mut self, previous: Arc<BuildRecord>) -> Result<Self, InvalidLink> {
        if previous.project != self.project {
            return Err(InvalidLink::ProjectMismatch {
                expected: self.project.clone(),
                found: previous.project.clone(),
            });
        }
        if previous.number >= self.number {
            return Err(InvalidLink::NonDecreasingNumber {
                current: self.number,
                previous: previous.number,
            });
        }
        self.previous = Some(previous);
        Ok(self)
    }

    /// The immediately preceding build of this project, if recorded.
    pub fn previous(&self) -> Option<&BuildRecord> {
        self.previous.as_deref()
    }
}

/// A rejected previous-build link.
#[derive(Debug, thiserror::Error)]
pub enum InvalidLink {
    /// The previous build belongs to a different project.
    #[error("previous build belongs to project '{found}', expected '{expected}'")]
    ProjectMismatch {
        /// Project of the build being linked.
        expected: String,
        /// Project of the offered previous build.
        found: String,
    },

    /// The previous build's number is not strictly smaller.
    #[error("previous build number {previous} is not smaller than {current}")]
    NonDecreasingNumber {
        /// Number of the build being linked.
        current: u32,
        /// Number of the offered previous build.
        previous: u32,
    },
}
