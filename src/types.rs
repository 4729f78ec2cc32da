//! Core types for repo-bots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An issue or pull request as seen through the issues API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Issue {
    /// Issue number
    pub number: u64,
    /// Title
    pub title: String,
    /// Body text
    pub body: Option<String>,
    /// Login of the author
    pub author: String,
    /// Label names
    pub labels: Vec<String>,
    /// Logins of the assignees
    pub assignees: Vec<String>,
    /// Milestone number, if one is set
    pub milestone: Option<u64>,
    /// Whether the issue is open
    pub open: bool,
    /// Whether this issue is a pull request
    pub is_pull_request: bool,
    /// GraphQL node ID (used for project mutations)
    pub node_id: Option<String>,
}

impl Issue {
    /// Whether the issue carries the given label
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l == name)
    }
}

/// A pull request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PullRequest {
    /// PR number
    pub number: u64,
    /// Web URL for the PR
    pub html_url: String,
    /// Base branch name
    pub base_ref: String,
    /// Head branch name
    pub head_ref: String,
    /// Head commit SHA
    pub head_sha: String,
    /// PR title
    pub title: String,
    /// PR body
    pub body: Option<String>,
    /// Label names
    pub labels: Vec<String>,
    /// Milestone number, if one is set
    pub milestone: Option<u64>,
    /// Whether the PR is open
    pub open: bool,
    /// Whether the PR was merged
    pub merged: bool,
    /// SHA of the merge commit (once merged)
    pub merge_commit_sha: Option<String>,
    /// Login of the user who merged the PR
    pub merged_by: Option<String>,
}

/// Parameters for opening a new pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    /// Branch containing the changes
    pub head: String,
    /// Branch to merge into
    pub base: String,
    /// Title
    pub title: String,
    /// Body
    pub body: String,
}

/// A repository milestone
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Milestone {
    /// Milestone number
    pub number: u64,
    /// Title (usually a version string)
    pub title: String,
    /// Whether the milestone is open
    pub open: bool,
    /// Due date
    pub due_on: Option<DateTime<Utc>>,
}

/// State of a commit status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusState {
    /// The check errored
    Error,
    /// The check failed
    Failure,
    /// The check has not concluded
    Pending,
    /// The check passed
    Success,
}

impl std::fmt::Display for StatusState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Failure => write!(f, "failure"),
            Self::Pending => write!(f, "pending"),
            Self::Success => write!(f, "success"),
        }
    }
}

/// A commit status to publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusUpdate {
    /// Commit SHA the status applies to
    pub sha: String,
    /// Status context (shown as the check name)
    pub context: String,
    /// Status state
    pub state: StatusState,
    /// Short description
    pub description: Option<String>,
    /// Link shown next to the status
    pub target_url: Option<String>,
}

/// A commit status as returned by the statuses API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStatus {
    /// Status context
    pub context: String,
    /// Status state
    pub state: StatusState,
    /// Short description
    pub description: Option<String>,
}

/// Reason given when closing an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Closed because the work was done
    #[default]
    Completed,
    /// Closed without action
    NotPlanned,
}

/// Repository coordinates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoConfig {
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub repo: String,
}

impl std::fmt::Display for RepoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}
