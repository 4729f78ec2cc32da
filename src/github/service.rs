//! GitHub service implementation

use crate::error::{Error, Result};
use crate::github::projects::{self, ProjectRef};
use crate::github::GitHubApi;
use crate::types::{
    CloseReason, CommitStatus, Issue, Milestone, NewPullRequest, PullRequest, RepoConfig,
    StatusUpdate,
};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

const SEARCH_PAGE_SIZE: usize = 100;

// Raw REST response shapes for routes called through the generic client

#[derive(Deserialize)]
struct RawUser {
    login: String,
}

#[derive(Deserialize)]
struct RawLabel {
    name: String,
}

#[derive(Deserialize)]
struct RawMilestone {
    number: u64,
    title: String,
    state: String,
    due_on: Option<DateTime<Utc>>,
}

impl From<RawMilestone> for Milestone {
    fn from(m: RawMilestone) -> Self {
        Self {
            number: m.number,
            title: m.title,
            open: m.state == "open",
            due_on: m.due_on,
        }
    }
}

#[derive(Deserialize)]
struct RawIssue {
    number: u64,
    title: String,
    body: Option<String>,
    user: RawUser,
    #[serde(default)]
    labels: Vec<RawLabel>,
    #[serde(default)]
    assignees: Vec<RawUser>,
    milestone: Option<RawMilestone>,
    state: String,
    pull_request: Option<serde_json::Value>,
    node_id: Option<String>,
}

impl From<RawIssue> for Issue {
    fn from(issue: RawIssue) -> Self {
        Self {
            number: issue.number,
            title: issue.title,
            body: issue.body,
            author: issue.user.login,
            labels: issue.labels.into_iter().map(|l| l.name).collect(),
            assignees: issue.assignees.into_iter().map(|u| u.login).collect(),
            milestone: issue.milestone.map(|m| m.number),
            open: issue.state == "open",
            is_pull_request: issue.pull_request.is_some(),
            node_id: issue.node_id,
        }
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    items: Vec<RawIssue>,
}

#[derive(Deserialize)]
struct RequestedReviewers {
    #[serde(default)]
    users: Vec<RawUser>,
}

#[derive(Deserialize)]
struct PermissionResponse {
    permission: String,
}

#[derive(Deserialize)]
struct ContentFile {
    content: String,
}

/// Delay to wait before fetching a given page (1-based) of search results
///
/// The search API enforces secondary rate limits, so later pages back off:
/// no delay for the first two pages, 3s up to page 4, 30s afterwards.
pub const fn page_delay(page: u32) -> Duration {
    match page {
        0..=2 => Duration::ZERO,
        3..=4 => Duration::from_secs(3),
        _ => Duration::from_secs(30),
    }
}

/// Helper to convert octocrab PR to our `PullRequest` type
fn pr_from_octocrab(pr: &octocrab::models::pulls::PullRequest) -> PullRequest {
    PullRequest {
        number: pr.number,
        html_url: pr
            .html_url
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default(),
        base_ref: pr.base.ref_field.clone(),
        head_ref: pr.head.ref_field.clone(),
        head_sha: pr.head.sha.clone(),
        title: pr.title.as_deref().unwrap_or_default().to_string(),
        body: pr.body.clone(),
        labels: pr
            .labels
            .as_ref()
            .map(|labels| labels.iter().map(|l| l.name.clone()).collect())
            .unwrap_or_default(),
        milestone: pr
            .milestone
            .as_ref()
            .and_then(|m| u64::try_from(m.number).ok()),
        open: matches!(pr.state, Some(octocrab::models::IssueState::Open)),
        merged: pr.merged_at.is_some(),
        merge_commit_sha: pr.merge_commit_sha.clone(),
        merged_by: pr.merged_by.as_ref().map(|u| u.login.clone()),
    }
}

/// GitHub service using octocrab
pub struct GitHubService {
    client: Octocrab,
    config: RepoConfig,
    /// Token for raw HTTP requests
    token: String,
    /// HTTP client for routes whose answer is carried by the status code
    http_client: Client,
    /// API base URL, without trailing slash
    api_base: String,
    /// Per-process memo of `has_write_access` answers
    write_access: Mutex<HashMap<String, bool>>,
    /// Per-process memo of organization membership answers, keyed `org/login`
    membership: Mutex<HashMap<String, bool>>,
}

impl GitHubService {
    /// Create a new GitHub service
    ///
    /// `api_url` overrides the REST endpoint (GitHub Enterprise, tests).
    pub fn new(token: &str, config: RepoConfig, api_url: Option<&str>) -> Result<Self> {
        let mut builder = Octocrab::builder().personal_token(token.to_string());

        let api_base = api_url
            .unwrap_or("https://api.github.com")
            .trim_end_matches('/')
            .to_string();
        if api_url.is_some() {
            builder = builder
                .base_uri(api_base.as_str())
                .map_err(|e| Error::GitHubApi(e.to_string()))?;
        }

        let client = builder
            .build()
            .map_err(|e| Error::GitHubApi(e.to_string()))?;

        let http_client = Client::builder()
            .user_agent("repo-bots")
            .build()
            .map_err(|e| Error::GitHubApi(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            token: token.to_string(),
            http_client,
            api_base,
            write_access: Mutex::new(HashMap::new()),
            membership: Mutex::new(HashMap::new()),
        })
    }

    fn repo_route(&self, tail: &str) -> String {
        format!("/repos/{}/{}/{tail}", self.config.owner, self.config.repo)
    }

    fn raw_get(&self, url: &str) -> reqwest::RequestBuilder {
        self.http_client
            .get(url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    fn cached(cache: &Mutex<HashMap<String, bool>>, key: &str) -> Option<bool> {
        cache.lock().ok().and_then(|c| c.get(key).copied())
    }

    fn remember(cache: &Mutex<HashMap<String, bool>>, key: String, value: bool) {
        if let Ok(mut c) = cache.lock() {
            c.insert(key, value);
        }
    }

    async fn issue_node_id(&self, number: u64) -> Result<String> {
        self.get_issue(number)
            .await?
            .node_id
            .ok_or_else(|| Error::GitHubApi(format!("issue #{number} has no node id")))
    }
}

#[async_trait]
impl GitHubApi for GitHubService {
    fn repo(&self) -> &RepoConfig {
        &self.config
    }

    async fn query(&self, query: &str) -> Result<Vec<Issue>> {
        let q = format!("repo:{} {query}", self.config);
        debug!(query = %q, "running issue search");
        let mut results = Vec::new();
        let mut page: u32 = 1;

        loop {
            let delay = page_delay(page);
            if !delay.is_zero() {
                debug!(page, delay_secs = delay.as_secs(), "backing off before next page");
                tokio::time::sleep(delay).await;
            }

            let response: SearchResponse = self
                .client
                .get(
                    "/search/issues",
                    Some(&json!({ "q": q, "per_page": SEARCH_PAGE_SIZE, "page": page })),
                )
                .await?;

            let count = response.items.len();
            results.extend(response.items.into_iter().map(Issue::from));
            if count < SEARCH_PAGE_SIZE {
                break;
            }
            page += 1;
        }

        debug!(count = results.len(), "issue search complete");
        Ok(results)
    }

    async fn get_issue(&self, number: u64) -> Result<Issue> {
        debug!(number, "getting issue");
        let issue: RawIssue = self
            .client
            .get(self.repo_route(&format!("issues/{number}")), None::<&()>)
            .await?;
        Ok(issue.into())
    }

    async fn post_comment(&self, number: u64, body: &str) -> Result<()> {
        debug!(number, "creating comment");
        self.client
            .issues(&self.config.owner, &self.config.repo)
            .create_comment(number, body)
            .await?;
        debug!(number, "created comment");
        Ok(())
    }

    async fn add_label(&self, number: u64, label: &str) -> Result<()> {
        debug!(number, label, "adding label");
        self.client
            .issues(&self.config.owner, &self.config.repo)
            .add_labels(number, &[label.to_string()])
            .await?;
        Ok(())
    }

    async fn remove_label(&self, number: u64, label: &str) -> Result<()> {
        debug!(number, label, "removing label");
        let route = self.repo_route(&format!(
            "issues/{number}/labels/{}",
            urlencoding::encode(label)
        ));
        match self
            .client
            .delete::<serde_json::Value, _, _>(route, None::<&()>)
            .await
            .map_err(Error::from)
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!(number, label, "label was not present");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn add_assignee(&self, number: u64, login: &str) -> Result<()> {
        debug!(number, login, "adding assignee");
        self.client
            .issues(&self.config.owner, &self.config.repo)
            .add_assignees(number, &[login])
            .await?;
        Ok(())
    }

    async fn remove_assignee(&self, number: u64, login: &str) -> Result<()> {
        debug!(number, login, "removing assignee");
        let _: serde_json::Value = self
            .client
            .delete(
                self.repo_route(&format!("issues/{number}/assignees")),
                Some(&json!({ "assignees": [login] })),
            )
            .await?;
        Ok(())
    }

    async fn close_issue(&self, number: u64, reason: CloseReason) -> Result<()> {
        debug!(number, ?reason, "closing issue");
        let _: serde_json::Value = self
            .client
            .patch(
                self.repo_route(&format!("issues/{number}")),
                Some(&json!({ "state": "closed", "state_reason": reason })),
            )
            .await?;
        Ok(())
    }

    async fn get_pull_request(&self, number: u64) -> Result<PullRequest> {
        debug!(number, "getting PR");
        let pr = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .get(number)
            .await?;
        Ok(pr_from_octocrab(&pr))
    }

    async fn list_pull_request_filenames(&self, number: u64) -> Result<Vec<String>> {
        debug!(number, "listing PR files");
        let first = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .list_files(number)
            .await?;
        let files = self.client.all_pages(first).await?;
        let names: Vec<String> = files.into_iter().map(|f| f.filename).collect();
        debug!(number, count = names.len(), "listed PR files");
        Ok(names)
    }

    async fn create_pull_request(&self, pr: &NewPullRequest) -> Result<PullRequest> {
        debug!(head = %pr.head, base = %pr.base, "creating PR");
        let created = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .create(&pr.title, &pr.head, &pr.base)
            .body(&pr.body)
            .send()
            .await?;

        let result = pr_from_octocrab(&created);
        info!(pr_number = result.number, "created PR");
        Ok(result)
    }

    async fn set_milestone(&self, number: u64, milestone: u64) -> Result<()> {
        debug!(number, milestone, "setting milestone");
        let _: serde_json::Value = self
            .client
            .patch(
                self.repo_route(&format!("issues/{number}")),
                Some(&json!({ "milestone": milestone })),
            )
            .await?;
        Ok(())
    }

    async fn list_requested_reviewers(&self, number: u64) -> Result<Vec<String>> {
        let reviewers: RequestedReviewers = self
            .client
            .get(
                self.repo_route(&format!("pulls/{number}/requested_reviewers")),
                None::<&()>,
            )
            .await?;
        Ok(reviewers.users.into_iter().map(|u| u.login).collect())
    }

    async fn request_reviewers(&self, number: u64, logins: &[String]) -> Result<()> {
        debug!(number, ?logins, "requesting reviewers");
        let _: serde_json::Value = self
            .client
            .post(
                self.repo_route(&format!("pulls/{number}/requested_reviewers")),
                Some(&json!({ "reviewers": logins })),
            )
            .await?;
        Ok(())
    }

    async fn remove_requested_reviewers(&self, number: u64, logins: &[String]) -> Result<()> {
        debug!(number, ?logins, "removing requested reviewers");
        let _: serde_json::Value = self
            .client
            .delete(
                self.repo_route(&format!("pulls/{number}/requested_reviewers")),
                Some(&json!({ "reviewers": logins })),
            )
            .await?;
        Ok(())
    }

    async fn create_status(&self, status: &StatusUpdate) -> Result<()> {
        debug!(sha = %status.sha, context = %status.context, state = %status.state, "creating status");
        let _: serde_json::Value = self
            .client
            .post(
                self.repo_route(&format!("statuses/{}", status.sha)),
                Some(&json!({
                    "state": status.state,
                    "context": status.context,
                    "description": status.description,
                    "target_url": status.target_url,
                })),
            )
            .await?;
        Ok(())
    }

    async fn list_statuses_by_ref(&self, git_ref: &str) -> Result<Vec<CommitStatus>> {
        let url = format!(
            "{}/repos/{}/{}/commits/{}/statuses",
            self.api_base, self.config.owner, self.config.repo, git_ref
        );

        let response = self
            .raw_get(&url)
            .send()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to fetch statuses: {e}")))?
            .error_for_status()?;

        let statuses: Vec<CommitStatus> = response
            .json()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to parse statuses: {e}")))?;

        debug!(git_ref, count = statuses.len(), "listed statuses");
        Ok(statuses)
    }

    async fn is_user_member_of_organization(&self, org: &str, login: &str) -> Result<bool> {
        let key = format!("{org}/{login}");
        if let Some(member) = Self::cached(&self.membership, &key) {
            return Ok(member);
        }

        let url = format!("{}/orgs/{org}/members/{login}", self.api_base);
        let response = self
            .raw_get(&url)
            .send()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to check membership: {e}")))?;

        // 302 to the public members route is followed by the client
        let member = match response.status().as_u16() {
            204 => true,
            404 => false,
            status => {
                return Err(Error::GitHubApi(format!(
                    "Failed to check membership of {login} in {org}: HTTP {status}"
                )));
            }
        };
        debug!(org, login, member, "checked organization membership");
        Self::remember(&self.membership, key, member);
        Ok(member)
    }

    async fn has_write_access(&self, login: &str) -> Result<bool> {
        if let Some(access) = Self::cached(&self.write_access, login) {
            return Ok(access);
        }

        let permission: PermissionResponse = self
            .client
            .get(
                self.repo_route(&format!("collaborators/{login}/permission")),
                None::<&()>,
            )
            .await?;

        let access = matches!(permission.permission.as_str(), "admin" | "maintain" | "write");
        debug!(login, permission = %permission.permission, access, "checked write access");
        Self::remember(&self.write_access, login.to_string(), access);
        Ok(access)
    }

    async fn get_milestone(&self, number: u64) -> Result<Milestone> {
        let milestone: RawMilestone = self
            .client
            .get(self.repo_route(&format!("milestones/{number}")), None::<&()>)
            .await?;
        Ok(milestone.into())
    }

    async fn list_open_milestones(&self) -> Result<Vec<Milestone>> {
        let milestones: Vec<RawMilestone> = self
            .client
            .get(
                self.repo_route("milestones"),
                Some(&json!({ "state": "open", "per_page": 100 })),
            )
            .await?;
        Ok(milestones.into_iter().map(Milestone::from).collect())
    }

    async fn read_config(&self, path: &str) -> Result<String> {
        debug!(path, "reading repository file");
        let value: serde_json::Value = self
            .client
            .get(self.repo_route(&format!("contents/{path}")), None::<&()>)
            .await?;

        if value.is_array() {
            return Err(Error::Config(format!(
                "{path} is a directory, expected a file"
            )));
        }

        let file: ContentFile = serde_json::from_value(value)?;
        let encoded: String = file.content.split_whitespace().collect();
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| Error::Config(format!("{path} has invalid content encoding: {e}")))?;
        String::from_utf8(bytes).map_err(|e| Error::Config(format!("{path} is not UTF-8: {e}")))
    }

    async fn add_issue_to_project(&self, number: u64, project: &ProjectRef) -> Result<()> {
        let content_id = self.issue_node_id(number).await?;
        projects::add_item(&self.client, project, &content_id).await?;
        info!(number, project = %project, "added to project");
        Ok(())
    }

    async fn remove_issue_from_project(&self, number: u64, project: &ProjectRef) -> Result<()> {
        let content_id = self.issue_node_id(number).await?;
        projects::remove_item(&self.client, project, &content_id).await?;
        info!(number, project = %project, "removed from project");
        Ok(())
    }
}
