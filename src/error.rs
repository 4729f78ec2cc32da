//! Error types for repo-bots

use thiserror::Error;

/// Errors produced by the bots
#[derive(Debug, Error)]
pub enum Error {
    /// GitHub API call failed
    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    /// Requested resource does not exist (HTTP 404)
    #[error("not found: {0}")]
    NotFound(String),

    /// Missing input, malformed configuration file, or wrong file kind
    #[error("configuration error: {0}")]
    Config(String),

    /// Webhook payload lacks data the operation needs
    #[error("invalid event payload: {0}")]
    InvalidEvent(String),

    /// A git subprocess exited unsuccessfully
    #[error("git command failed: {command}\nstderr: {stderr}")]
    Git {
        /// The command line that was run
        command: String,
        /// Captured standard error
        stderr: String,
    },

    /// Cherry-pick stopped on conflicts that could not be resolved automatically
    #[error("cherry-pick conflict in: {}", paths.join(", "))]
    CherryPickConflict {
        /// Unmerged paths reported by git
        paths: Vec<String>,
    },

    /// A subprocess other than git failed
    #[error("command failed: {command}\n{output}")]
    Subprocess {
        /// The command line that was run
        command: String,
        /// Combined output
        output: String,
    },

    /// One or more command side effects failed; the others still ran
    #[error("{} command effect(s) failed: {}", failures.len(), failures.join("; "))]
    CommandsFailed {
        /// Description of every failed effect
        failures: Vec<String>,
    },

    /// A branch or tag name could not be interpreted
    #[error("invalid ref: {0}")]
    InvalidRef(String),

    /// JSON (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem or process IO failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invariant violation inside the bots
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error means "the thing is not there" (HTTP 404)
    ///
    /// Idempotent removals (labels, reviewers) use this to treat an
    /// already-absent target as success.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<octocrab::Error> for Error {
    fn from(err: octocrab::Error) -> Self {
        match &err {
            octocrab::Error::GitHub { source, .. } if source.status_code.as_u16() == 404 => {
                Self::NotFound(source.message.clone())
            }
            octocrab::Error::GitHub { source, .. } => Self::GitHubApi(source.message.clone()),
            _ => Self::GitHubApi(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.status().is_some_and(|s| s.as_u16() == 404) {
            Self::NotFound(err.to_string())
        } else {
            Self::GitHubApi(err.to_string())
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
