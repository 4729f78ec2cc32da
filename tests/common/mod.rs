//! Shared test fixtures

#![allow(dead_code)]

mod mock_github;

pub use mock_github::{Call, MockGitHub};

use async_trait::async_trait;
use repo_bots::backport::{CherryPick, GitRepo};
use repo_bots::error::{Error, Result};
use repo_bots::event::WebhookEvent;
use repo_bots::types::{Issue, PullRequest};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// An open issue authored by `octocat`
pub fn make_issue(number: u64, labels: &[&str]) -> Issue {
    Issue {
        number,
        title: format!("Issue {number}"),
        body: None,
        author: "octocat".to_string(),
        labels: labels.iter().map(ToString::to_string).collect(),
        assignees: vec![],
        milestone: None,
        open: true,
        is_pull_request: false,
        node_id: Some(format!("I_{number}")),
    }
}

/// An open pull request with head sha `head{number}`
pub fn make_pr(number: u64) -> PullRequest {
    PullRequest {
        number,
        html_url: format!("https://github.com/acme/widgets/pull/{number}"),
        base_ref: "main".to_string(),
        head_ref: format!("feature-{number}"),
        head_sha: format!("head{number}"),
        title: format!("PR {number}"),
        body: None,
        labels: vec![],
        milestone: None,
        open: true,
        merged: false,
        merge_commit_sha: None,
        merged_by: None,
    }
}

/// A pull request event payload
pub fn pr_event(
    name: &str,
    action: &str,
    number: u64,
    title: &str,
    body: &str,
    labels: &[&str],
) -> WebhookEvent {
    let labels: Vec<serde_json::Value> = labels
        .iter()
        .map(|l| serde_json::json!({ "name": l }))
        .collect();
    let payload = serde_json::json!({
        "action": action,
        "pull_request": {
            "number": number,
            "state": "open",
            "title": title,
            "body": body,
            "labels": labels,
            "head": { "ref": format!("feature-{number}"), "sha": format!("head{number}") },
            "base": { "ref": "main", "sha": "base" },
            "user": { "login": "octocat" }
        },
        "sender": { "login": "octocat" }
    });
    WebhookEvent::from_json(name, &payload.to_string()).unwrap()
}

/// A comment event on issue `number`
pub fn comment_event(number: u64, user: &str, body: &str) -> WebhookEvent {
    let payload = serde_json::json!({
        "action": "created",
        "issue": { "number": number, "state": "open" },
        "comment": { "body": body, "user": { "login": user } },
        "sender": { "login": user }
    });
    WebhookEvent::from_json("issue_comment", &payload.to_string()).unwrap()
}

/// A merged pull request event for backports
pub fn merged_pr_event(action: &str, labels: &[&str], added: Option<&str>) -> WebhookEvent {
    let labels: Vec<serde_json::Value> = labels
        .iter()
        .map(|l| serde_json::json!({ "name": l }))
        .collect();
    let mut payload = serde_json::json!({
        "action": action,
        "pull_request": {
            "number": 42,
            "state": "closed",
            "title": "Alerting: Fix silences",
            "body": "Fixes silences",
            "labels": labels,
            "head": { "ref": "fix-silences", "sha": "head42" },
            "base": { "ref": "main", "sha": "base" },
            "merged": true,
            "merge_commit_sha": "c0ffee",
            "merged_by": { "login": "merger" },
            "user": { "login": "octocat" }
        }
    });
    if let Some(label) = added {
        payload["label"] = serde_json::json!({ "name": label });
    }
    WebhookEvent::from_json("pull_request_target", &payload.to_string()).unwrap()
}

/// Scripted `GitRepo`
///
/// Records every operation; cherry-picks of a sha listed in `conflicts`
/// stop with those paths. Clones share state, so a test can keep one while
/// the backport runner owns another.
#[derive(Clone)]
pub struct MockGit {
    workdir: PathBuf,
    ops: Arc<Mutex<Vec<String>>>,
    conflicts: Arc<Mutex<HashMap<String, Vec<String>>>>,
    failing: Arc<Mutex<Option<String>>>,
}

impl MockGit {
    pub fn new() -> Self {
        Self {
            workdir: PathBuf::from("/tmp/backport"),
            ops: Arc::default(),
            conflicts: Arc::default(),
            failing: Arc::default(),
        }
    }

    /// Cherry-picking `sha` conflicts in `paths`
    pub fn conflict_on(&self, sha: &str, paths: &[&str]) {
        self.conflicts.lock().unwrap().insert(
            sha.to_string(),
            paths.iter().map(ToString::to_string).collect(),
        );
    }

    /// Operations starting with `prefix` fail
    pub fn fail_on(&self, prefix: &str) {
        *self.failing.lock().unwrap() = Some(prefix.to_string());
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    fn op(&self, op: String) -> Result<()> {
        let failing = self.failing.lock().unwrap().clone();
        if let Some(prefix) = failing
            && op.starts_with(&prefix)
        {
            return Err(Error::Git {
                command: format!("git {op}"),
                stderr: "fatal: scripted failure".to_string(),
            });
        }
        self.ops.lock().unwrap().push(op);
        Ok(())
    }
}

#[async_trait]
impl GitRepo for MockGit {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    async fn clone_from(&self, url: &str) -> Result<()> {
        self.op(format!("clone {url}"))
    }

    async fn fetch(&self, branch: &str) -> Result<()> {
        self.op(format!("fetch {branch}"))
    }

    async fn switch_create(&self, branch: &str, base: &str) -> Result<()> {
        self.op(format!("switch {branch} {base}"))
    }

    async fn cherry_pick(&self, sha: &str) -> Result<CherryPick> {
        self.op(format!("cherry-pick {sha}"))?;
        Ok(match self.conflicts.lock().unwrap().get(sha) {
            Some(paths) => CherryPick::Conflict(paths.clone()),
            None => CherryPick::Applied,
        })
    }

    async fn unmerged_paths(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn add(&self, paths: &[String]) -> Result<()> {
        self.op(format!("add {}", paths.join(" ")))
    }

    async fn cherry_pick_continue(&self) -> Result<()> {
        self.op("cherry-pick --continue".to_string())
    }

    async fn cherry_pick_abort(&self) -> Result<()> {
        self.op("cherry-pick --abort".to_string())
    }

    async fn push(&self, branch: &str) -> Result<()> {
        self.op(format!("push {branch}"))
    }
}
