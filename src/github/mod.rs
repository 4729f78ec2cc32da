//! GitHub capability used by every bot
//!
//! The bots only talk to GitHub through [`GitHubApi`], so tests can run the
//! same rule logic against an in-memory mock.

mod projects;
mod service;

pub use projects::ProjectRef;
pub use service::{GitHubService, page_delay};

use crate::error::Result;
use crate::types::{
    CloseReason, CommitStatus, Issue, Milestone, NewPullRequest, PullRequest, RepoConfig,
    StatusUpdate,
};
use async_trait::async_trait;

/// Repository-scoped GitHub operations
///
/// Every mutation is expected to be idempotent from the caller's point of
/// view: removing an absent label or reviewer succeeds.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    /// Repository this service is bound to
    fn repo(&self) -> &RepoConfig;

    /// Run an issue search query and return all pages of results
    async fn query(&self, query: &str) -> Result<Vec<Issue>>;

    /// Fetch an issue (or pull request) by number
    async fn get_issue(&self, number: u64) -> Result<Issue>;

    /// Post a comment on an issue or pull request
    async fn post_comment(&self, number: u64, body: &str) -> Result<()>;

    /// Add a label
    async fn add_label(&self, number: u64, label: &str) -> Result<()>;

    /// Remove a label; succeeds if the label is not present
    async fn remove_label(&self, number: u64, label: &str) -> Result<()>;

    /// Assign a user
    async fn add_assignee(&self, number: u64, login: &str) -> Result<()>;

    /// Unassign a user
    async fn remove_assignee(&self, number: u64, login: &str) -> Result<()>;

    /// Close an issue
    async fn close_issue(&self, number: u64, reason: CloseReason) -> Result<()>;

    /// Fetch a pull request by number
    async fn get_pull_request(&self, number: u64) -> Result<PullRequest>;

    /// List the paths changed by a pull request
    async fn list_pull_request_filenames(&self, number: u64) -> Result<Vec<String>>;

    /// Open a pull request
    async fn create_pull_request(&self, pr: &NewPullRequest) -> Result<PullRequest>;

    /// Set the milestone of an issue or pull request
    async fn set_milestone(&self, number: u64, milestone: u64) -> Result<()>;

    /// List reviewers currently requested on a pull request
    async fn list_requested_reviewers(&self, number: u64) -> Result<Vec<String>>;

    /// Request review from users
    async fn request_reviewers(&self, number: u64, logins: &[String]) -> Result<()>;

    /// Withdraw review requests
    async fn remove_requested_reviewers(&self, number: u64, logins: &[String]) -> Result<()>;

    /// Publish a commit status
    async fn create_status(&self, status: &StatusUpdate) -> Result<()>;

    /// List statuses for a ref, newest first
    async fn list_statuses_by_ref(&self, git_ref: &str) -> Result<Vec<CommitStatus>>;

    /// Whether a user belongs to an organization
    async fn is_user_member_of_organization(&self, org: &str, login: &str) -> Result<bool>;

    /// Whether a user can push to the repository
    async fn has_write_access(&self, login: &str) -> Result<bool>;

    /// Fetch a milestone by number
    async fn get_milestone(&self, number: u64) -> Result<Milestone>;

    /// List open milestones
    async fn list_open_milestones(&self) -> Result<Vec<Milestone>>;

    /// Read a repository file as text (default branch)
    async fn read_config(&self, path: &str) -> Result<String>;

    /// Add an issue or pull request to a project
    async fn add_issue_to_project(&self, number: u64, project: &ProjectRef) -> Result<()>;

    /// Remove an issue or pull request from a project
    async fn remove_issue_from_project(&self, number: u64, project: &ProjectRef) -> Result<()>;
}
