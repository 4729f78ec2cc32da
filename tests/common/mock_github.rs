//! Mock GitHub API for testing
//!
//! Not every helper is used by every test binary.

#![allow(dead_code)]

use async_trait::async_trait;
use repo_bots::error::{Error, Result};
use repo_bots::github::{GitHubApi, ProjectRef};
use repo_bots::types::{
    CloseReason, CommitStatus, Issue, Milestone, NewPullRequest, PullRequest, RepoConfig,
    StatusUpdate,
};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// A recorded mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Comment { number: u64, body: String },
    AddLabel { number: u64, label: String },
    RemoveLabel { number: u64, label: String },
    AddAssignee { number: u64, login: String },
    RemoveAssignee { number: u64, login: String },
    Close { number: u64, reason: CloseReason },
    CreatePullRequest(NewPullRequest),
    SetMilestone { number: u64, milestone: u64 },
    RequestReviewers { number: u64, logins: Vec<String> },
    RemoveReviewers { number: u64, logins: Vec<String> },
    Status(StatusUpdate),
    AddToProject { number: u64, project: String },
    RemoveFromProject { number: u64, project: String },
}

/// In-memory `GitHubApi`
///
/// Reads come from canned responses, mutations are recorded in call order
/// and any method can be made to fail by name.
pub struct MockGitHub {
    repo: RepoConfig,
    next_pr_number: AtomicU64,
    issues: Mutex<HashMap<u64, Issue>>,
    pull_requests: Mutex<HashMap<u64, PullRequest>>,
    filenames: Mutex<HashMap<u64, Vec<String>>>,
    statuses: Mutex<HashMap<String, Vec<CommitStatus>>>,
    configs: Mutex<HashMap<String, String>>,
    milestones: Mutex<Vec<Milestone>>,
    requested_reviewers: Mutex<HashMap<u64, Vec<String>>>,
    writers: Mutex<HashSet<String>>,
    members: Mutex<HashSet<(String, String)>>,
    // Call tracking
    calls: Mutex<Vec<Call>>,
    reads: Mutex<Vec<String>>,
    // Error injection, keyed by method name
    failures: Mutex<HashMap<String, String>>,
}

impl Default for MockGitHub {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGitHub {
    /// Mock bound to `acme/widgets`
    pub fn new() -> Self {
        Self {
            repo: RepoConfig {
                owner: "acme".to_string(),
                repo: "widgets".to_string(),
            },
            next_pr_number: AtomicU64::new(100),
            issues: Mutex::new(HashMap::new()),
            pull_requests: Mutex::new(HashMap::new()),
            filenames: Mutex::new(HashMap::new()),
            statuses: Mutex::new(HashMap::new()),
            configs: Mutex::new(HashMap::new()),
            milestones: Mutex::new(Vec::new()),
            requested_reviewers: Mutex::new(HashMap::new()),
            writers: Mutex::new(HashSet::new()),
            members: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            reads: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    // === Canned responses ===

    pub fn add_issue(&self, issue: Issue) {
        self.issues.lock().unwrap().insert(issue.number, issue);
    }

    pub fn add_pull_request(&self, pr: PullRequest) {
        self.pull_requests.lock().unwrap().insert(pr.number, pr);
    }

    pub fn set_filenames(&self, number: u64, files: &[&str]) {
        self.filenames
            .lock()
            .unwrap()
            .insert(number, files.iter().map(ToString::to_string).collect());
    }

    /// Statuses for `git_ref`, newest first
    pub fn set_statuses(&self, git_ref: &str, statuses: Vec<CommitStatus>) {
        self.statuses
            .lock()
            .unwrap()
            .insert(git_ref.to_string(), statuses);
    }

    pub fn set_config(&self, path: &str, content: &str) {
        self.configs
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_string());
    }

    pub fn add_milestone(&self, milestone: Milestone) {
        self.milestones.lock().unwrap().push(milestone);
    }

    pub fn set_requested_reviewers(&self, number: u64, logins: &[&str]) {
        self.requested_reviewers
            .lock()
            .unwrap()
            .insert(number, logins.iter().map(ToString::to_string).collect());
    }

    pub fn grant_write(&self, login: &str) {
        self.writers.lock().unwrap().insert(login.to_string());
    }

    pub fn add_member(&self, org: &str, login: &str) {
        self.members
            .lock()
            .unwrap()
            .insert((org.to_string(), login.to_string()));
    }

    // === Error injection ===

    /// Make `method` return `Error::GitHubApi(msg)`
    pub fn fail(&self, method: &str, msg: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(method.to_string(), msg.to_string());
    }

    fn check(&self, method: &str) -> Result<()> {
        match self.failures.lock().unwrap().get(method) {
            Some(msg) => Err(Error::GitHubApi(msg.clone())),
            None => Ok(()),
        }
    }

    fn record(&self, method: &str, call: Call) -> Result<()> {
        self.check(method)?;
        self.calls.lock().unwrap().push(call);
        Ok(())
    }

    fn read(&self, method: &str) -> Result<()> {
        self.check(method)?;
        self.reads.lock().unwrap().push(method.to_string());
        Ok(())
    }

    // === Call inspection ===

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Names of the read methods called, in order
    pub fn reads(&self) -> Vec<String> {
        self.reads.lock().unwrap().clone()
    }

    pub fn statuses_created(&self) -> Vec<StatusUpdate> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Status(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn labels_added(&self, number: u64) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::AddLabel { number: n, label } if n == number => Some(label),
                _ => None,
            })
            .collect()
    }

    pub fn comments(&self, number: u64) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Comment { number: n, body } if n == number => Some(body),
                _ => None,
            })
            .collect()
    }

    pub fn assert_called(&self, call: &Call) {
        let calls = self.calls();
        assert!(
            calls.contains(call),
            "expected call {call:?}, got {calls:?}"
        );
    }

    pub fn assert_not_called(&self, call: &Call) {
        let calls = self.calls();
        assert!(
            !calls.contains(call),
            "unexpected call {call:?} in {calls:?}"
        );
    }

    pub fn assert_no_mutations(&self) {
        let calls = self.calls();
        assert!(calls.is_empty(), "expected no mutations, got {calls:?}");
    }
}

#[async_trait]
impl GitHubApi for MockGitHub {
    fn repo(&self) -> &RepoConfig {
        &self.repo
    }

    async fn query(&self, _query: &str) -> Result<Vec<Issue>> {
        self.read("query")?;
        Ok(self.issues.lock().unwrap().values().cloned().collect())
    }

    async fn get_issue(&self, number: u64) -> Result<Issue> {
        self.read("get_issue")?;
        self.issues
            .lock()
            .unwrap()
            .get(&number)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("issue #{number}")))
    }

    async fn post_comment(&self, number: u64, body: &str) -> Result<()> {
        self.record(
            "post_comment",
            Call::Comment {
                number,
                body: body.to_string(),
            },
        )
    }

    async fn add_label(&self, number: u64, label: &str) -> Result<()> {
        self.record(
            "add_label",
            Call::AddLabel {
                number,
                label: label.to_string(),
            },
        )
    }

    async fn remove_label(&self, number: u64, label: &str) -> Result<()> {
        self.record(
            "remove_label",
            Call::RemoveLabel {
                number,
                label: label.to_string(),
            },
        )
    }

    async fn add_assignee(&self, number: u64, login: &str) -> Result<()> {
        self.record(
            "add_assignee",
            Call::AddAssignee {
                number,
                login: login.to_string(),
            },
        )
    }

    async fn remove_assignee(&self, number: u64, login: &str) -> Result<()> {
        self.record(
            "remove_assignee",
            Call::RemoveAssignee {
                number,
                login: login.to_string(),
            },
        )
    }

    async fn close_issue(&self, number: u64, reason: CloseReason) -> Result<()> {
        self.record("close_issue", Call::Close { number, reason })
    }

    async fn get_pull_request(&self, number: u64) -> Result<PullRequest> {
        self.read("get_pull_request")?;
        self.pull_requests
            .lock()
            .unwrap()
            .get(&number)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("pull request #{number}")))
    }

    async fn list_pull_request_filenames(&self, number: u64) -> Result<Vec<String>> {
        self.read("list_pull_request_filenames")?;
        Ok(self
            .filenames
            .lock()
            .unwrap()
            .get(&number)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_pull_request(&self, pr: &NewPullRequest) -> Result<PullRequest> {
        self.record("create_pull_request", Call::CreatePullRequest(pr.clone()))?;
        let number = self.next_pr_number.fetch_add(1, Ordering::SeqCst);
        Ok(PullRequest {
            number,
            html_url: format!("https://github.com/acme/widgets/pull/{number}"),
            base_ref: pr.base.clone(),
            head_ref: pr.head.clone(),
            head_sha: format!("sha{number}"),
            title: pr.title.clone(),
            body: Some(pr.body.clone()),
            labels: vec![],
            milestone: None,
            open: true,
            merged: false,
            merge_commit_sha: None,
            merged_by: None,
        })
    }

    async fn set_milestone(&self, number: u64, milestone: u64) -> Result<()> {
        self.record("set_milestone", Call::SetMilestone { number, milestone })
    }

    async fn list_requested_reviewers(&self, number: u64) -> Result<Vec<String>> {
        self.read("list_requested_reviewers")?;
        Ok(self
            .requested_reviewers
            .lock()
            .unwrap()
            .get(&number)
            .cloned()
            .unwrap_or_default())
    }

    async fn request_reviewers(&self, number: u64, logins: &[String]) -> Result<()> {
        self.record(
            "request_reviewers",
            Call::RequestReviewers {
                number,
                logins: logins.to_vec(),
            },
        )
    }

    async fn remove_requested_reviewers(&self, number: u64, logins: &[String]) -> Result<()> {
        self.record(
            "remove_requested_reviewers",
            Call::RemoveReviewers {
                number,
                logins: logins.to_vec(),
            },
        )
    }

    async fn create_status(&self, status: &StatusUpdate) -> Result<()> {
        self.record("create_status", Call::Status(status.clone()))
    }

    async fn list_statuses_by_ref(&self, git_ref: &str) -> Result<Vec<CommitStatus>> {
        self.read("list_statuses_by_ref")?;
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(git_ref)
            .cloned()
            .unwrap_or_default())
    }

    async fn is_user_member_of_organization(&self, org: &str, login: &str) -> Result<bool> {
        self.read("is_user_member_of_organization")?;
        Ok(self
            .members
            .lock()
            .unwrap()
            .contains(&(org.to_string(), login.to_string())))
    }

    async fn has_write_access(&self, login: &str) -> Result<bool> {
        self.read("has_write_access")?;
        Ok(self.writers.lock().unwrap().contains(login))
    }

    async fn get_milestone(&self, number: u64) -> Result<Milestone> {
        self.read("get_milestone")?;
        self.milestones
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.number == number)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("milestone {number}")))
    }

    async fn list_open_milestones(&self) -> Result<Vec<Milestone>> {
        self.read("list_open_milestones")?;
        Ok(self
            .milestones
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.open)
            .cloned()
            .collect())
    }

    async fn read_config(&self, path: &str) -> Result<String> {
        self.read("read_config")?;
        self.configs
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::NotFound(path.to_string()))
    }

    async fn add_issue_to_project(&self, number: u64, project: &ProjectRef) -> Result<()> {
        self.record(
            "add_issue_to_project",
            Call::AddToProject {
                number,
                project: project.to_string(),
            },
        )
    }

    async fn remove_issue_from_project(&self, number: u64, project: &ProjectRef) -> Result<()> {
        self.record(
            "remove_issue_from_project",
            Call::RemoveFromProject {
                number,
                project: project.to_string(),
            },
        )
    }
}
