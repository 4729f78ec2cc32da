//! GitHub webhook event types
//!
//! Typed view over the event that triggered a workflow run: the event name
//! (`GITHUB_EVENT_NAME`) and the JSON payload (`GITHUB_EVENT_PATH`). Only the
//! fields the bots read are modelled; everything else is ignored.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the webhook event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventName {
    /// Issue opened, labeled, milestoned, ...
    Issues,
    /// Comment on an issue or pull request conversation
    IssueComment,
    /// Pull request activity (runs with the head repository's permissions)
    PullRequest,
    /// Pull request activity (runs in the base repository's context)
    PullRequestTarget,
    /// Commit status changed
    Status,
    /// Manually triggered workflow
    WorkflowDispatch,
    /// Scheduled workflow
    Schedule,
    /// Branch or tag push
    Push,
    /// Any event the bots do not know
    Other(String),
}

impl EventName {
    /// Parse an event name as found in `GITHUB_EVENT_NAME`
    pub fn parse(name: &str) -> Self {
        match name {
            "issues" => Self::Issues,
            "issue_comment" => Self::IssueComment,
            "pull_request" => Self::PullRequest,
            "pull_request_target" => Self::PullRequestTarget,
            "status" => Self::Status,
            "workflow_dispatch" => Self::WorkflowDispatch,
            "schedule" => Self::Schedule,
            "push" => Self::Push,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether the event carries a `pull_request` object
    pub const fn is_pull_request(&self) -> bool {
        matches!(self, Self::PullRequest | Self::PullRequestTarget)
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Issues => "issues",
            Self::IssueComment => "issue_comment",
            Self::PullRequest => "pull_request",
            Self::PullRequestTarget => "pull_request_target",
            Self::Status => "status",
            Self::WorkflowDispatch => "workflow_dispatch",
            Self::Schedule => "schedule",
            Self::Push => "push",
            Self::Other(name) => name,
        };
        write!(f, "{name}")
    }
}

/// The `action` field of a webhook payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// Issue or PR opened
    Opened,
    /// Issue or PR reopened
    Reopened,
    /// Issue or PR closed (merged or not)
    Closed,
    /// Title, body or base changed
    Edited,
    /// Label added
    Labeled,
    /// Label removed
    Unlabeled,
    /// Milestone set
    Milestoned,
    /// Milestone cleared
    Demilestoned,
    /// New commits pushed to the PR head
    Synchronize,
    /// Draft marked ready for review
    ReadyForReview,
    /// PR converted to draft
    ConvertedToDraft,
    /// User assigned
    Assigned,
    /// User unassigned
    Unassigned,
    /// Comment created
    Created,
    /// Comment deleted
    Deleted,
    /// Any action the bots do not know
    #[serde(other)]
    Other,
}

/// A GitHub user reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    /// Login name
    pub login: String,
}

/// A label reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRef {
    /// Label name
    pub name: String,
}

/// A milestone reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneRef {
    /// Milestone number
    pub number: u64,
    /// Milestone title
    #[serde(default)]
    pub title: String,
}

/// A branch reference on a pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRef {
    /// Branch name
    #[serde(rename = "ref")]
    pub ref_name: String,
    /// Commit SHA
    pub sha: String,
}

/// Pull request object in a payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestPayload {
    /// PR number
    pub number: u64,
    /// `open` or `closed`
    pub state: String,
    /// Title
    #[serde(default)]
    pub title: String,
    /// Body
    pub body: Option<String>,
    /// Labels at the time of the event
    #[serde(default)]
    pub labels: Vec<LabelRef>,
    /// Milestone, if set
    pub milestone: Option<MilestoneRef>,
    /// Head branch
    pub head: BranchRef,
    /// Base branch
    pub base: BranchRef,
    /// Whether the PR was merged
    #[serde(default)]
    pub merged: bool,
    /// Merge commit SHA
    pub merge_commit_sha: Option<String>,
    /// User who merged the PR
    pub merged_by: Option<UserRef>,
    /// Author
    pub user: Option<UserRef>,
}

impl PullRequestPayload {
    /// Whether the PR is open
    pub fn is_open(&self) -> bool {
        self.state == "open"
    }

    /// Label names
    pub fn label_names(&self) -> Vec<String> {
        self.labels.iter().map(|l| l.name.clone()).collect()
    }
}

/// Issue object in a payload (also used for PR conversations)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuePayload {
    /// Issue number
    pub number: u64,
    /// `open` or `closed`
    pub state: String,
    /// Labels at the time of the event
    #[serde(default)]
    pub labels: Vec<LabelRef>,
    /// Milestone, if set
    pub milestone: Option<MilestoneRef>,
    /// Present when the issue is a pull request
    pub pull_request: Option<serde_json::Value>,
    /// Author
    pub user: Option<UserRef>,
}

impl IssuePayload {
    /// Whether the issue is open
    pub fn is_open(&self) -> bool {
        self.state == "open"
    }

    /// Whether the issue is a pull request
    pub const fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

/// Comment object in a payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentPayload {
    /// Comment body
    #[serde(default)]
    pub body: String,
    /// Comment author
    pub user: UserRef,
}

/// Webhook payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPayload {
    /// Action that triggered the event
    pub action: Option<EventAction>,
    /// Pull request, for PR events
    pub pull_request: Option<PullRequestPayload>,
    /// Issue, for issue and comment events
    pub issue: Option<IssuePayload>,
    /// Label that was added or removed
    pub label: Option<LabelRef>,
    /// Comment, for comment events
    pub comment: Option<CommentPayload>,
    /// User that triggered the event
    pub sender: Option<UserRef>,
    /// Commit SHA, for status events
    pub sha: Option<String>,
    /// Status context, for status events
    pub context: Option<String>,
    /// Status state, for status events
    pub state: Option<String>,
}

/// A received webhook event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    /// Event name
    pub name: EventName,
    /// Event payload
    pub payload: EventPayload,
}

impl WebhookEvent {
    /// Build an event from its name and payload
    pub const fn new(name: EventName, payload: EventPayload) -> Self {
        Self { name, payload }
    }

    /// Load an event from a payload file, as written by the Actions runner
    pub fn from_file(name: &str, path: &Path) -> Result<Self> {
        if path.is_dir() {
            return Err(Error::Config(format!(
                "event path {} is a directory",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(name, &content)
    }

    /// Parse an event from a JSON payload string
    pub fn from_json(name: &str, json: &str) -> Result<Self> {
        let payload: EventPayload = serde_json::from_str(json)?;
        Ok(Self::new(EventName::parse(name), payload))
    }

    /// The payload action, if any
    pub const fn action(&self) -> Option<EventAction> {
        self.payload.action
    }

    /// The pull request object, or an error naming what was expected
    pub fn pull_request(&self) -> Result<&PullRequestPayload> {
        self.payload
            .pull_request
            .as_ref()
            .ok_or_else(|| Error::InvalidEvent(format!("{} event has no pull_request", self.name)))
    }

    /// The issue object, or an error naming what was expected
    pub fn issue(&self) -> Result<&IssuePayload> {
        self.payload
            .issue
            .as_ref()
            .ok_or_else(|| Error::InvalidEvent(format!("{} event has no issue", self.name)))
    }

    /// Number of the issue or pull request the event concerns
    pub fn issue_number(&self) -> Option<u64> {
        self.payload
            .issue
            .as_ref()
            .map(|i| i.number)
            .or_else(|| self.payload.pull_request.as_ref().map(|p| p.number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LABELED_PR: &str = r#"{
        "action": "labeled",
        "label": { "name": "backport v10.2.x" },
        "pull_request": {
            "number": 42,
            "state": "open",
            "title": "Alerting: Fix silences",
            "body": "Fixes things",
            "labels": [{ "name": "backport v10.2.x" }, { "name": "type/bug" }],
            "milestone": { "number": 7, "title": "10.3.x" },
            "head": { "ref": "fix-silences", "sha": "abc123" },
            "base": { "ref": "main", "sha": "def456" },
            "merged": false,
            "user": { "login": "octocat" }
        },
        "sender": { "login": "octocat" },
        "repository": { "full_name": "acme/widgets" }
    }"#;

    #[test]
    fn test_parse_pull_request_event() {
        let event = WebhookEvent::from_json("pull_request_target", LABELED_PR).unwrap();
        assert_eq!(event.name, EventName::PullRequestTarget);
        assert_eq!(event.action(), Some(EventAction::Labeled));

        let pr = event.pull_request().unwrap();
        assert!(pr.is_open());
        assert_eq!(pr.head.sha, "abc123");
        assert_eq!(pr.label_names(), vec!["backport v10.2.x", "type/bug"]);
        assert_eq!(pr.milestone.as_ref().map(|m| m.number), Some(7));
        assert_eq!(event.issue_number(), Some(42));
    }

    #[test]
    fn test_unknown_action_maps_to_other() {
        let event = WebhookEvent::from_json("issues", r#"{"action": "transferred"}"#).unwrap();
        assert_eq!(event.action(), Some(EventAction::Other));
        assert!(event.issue().is_err());
    }

    #[test]
    fn test_event_name_roundtrip() {
        for name in ["issues", "pull_request_target", "workflow_dispatch", "check_run"] {
            assert_eq!(EventName::parse(name).to_string(), name);
        }
        assert_eq!(
            EventName::parse("check_run"),
            EventName::Other("check_run".to_string())
        );
    }
}
