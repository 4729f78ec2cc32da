//! Automated backports of merged pull requests
//!
//! A merged PR labeled `backport <base>[ <head>]` is cherry-picked onto each
//! release branch `<base>` and a PR is opened per branch. Bases are handled one
//! at a time since they share a working tree; one failing base does not stop
//! the others, and a failure leaves a comment with manual instructions.

mod git;
mod labels;

pub use git::{CherryPick, CliGit, CommandRegenerator, CommitIdentity, GitRepo, Regenerator};
pub use labels::{
    BACKPORT_FAILED_LABEL, BackportTarget, backport_targets, default_head, get_final_labels,
    milestone_for_base, parse_backport_label,
};

use crate::config::{input, input_list};
use crate::error::{Error, Result};
use crate::event::{EventAction, PullRequestPayload, WebhookEvent};
use crate::github::GitHubApi;
use crate::telemetry::{TelemetrySink, track};
use crate::types::NewPullRequest;
use std::sync::Arc;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Settings for a backport run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackportOptions {
    /// Labels added to every backport PR
    pub labels_to_add: Vec<String>,
    /// Clone this URL into the working tree before starting
    pub clone_url: Option<String>,
}

impl BackportOptions {
    /// Options from the `labels_to_add` and `clone_url` action inputs
    pub fn from_inputs() -> Self {
        Self {
            labels_to_add: input_list("labels_to_add"),
            clone_url: input("clone_url"),
        }
    }
}

/// What happened to one base branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackportOutcome {
    /// A backport PR was opened
    Created {
        /// Target branch
        base: String,
        /// Number of the new PR
        number: u64,
    },
    /// The backport failed and was reported on the original PR
    Failed {
        /// Target branch
        base: String,
        /// Failure text
        error: String,
    },
}

/// Drives backports for one event
pub struct Backport {
    api: Arc<dyn GitHubApi>,
    git: Box<dyn GitRepo>,
    regenerators: Vec<Box<dyn Regenerator>>,
    options: BackportOptions,
    telemetry: TelemetrySink,
}

impl Backport {
    /// Create a runner with the default `.betterer.results` regenerator
    pub fn new(api: Arc<dyn GitHubApi>, git: Box<dyn GitRepo>, options: BackportOptions) -> Self {
        Self {
            api,
            git,
            regenerators: vec![Box::new(CommandRegenerator::betterer())],
            options,
            telemetry: None,
        }
    }

    /// Replace the conflict regenerators
    #[must_use]
    pub fn with_regenerators(mut self, regenerators: Vec<Box<dyn Regenerator>>) -> Self {
        self.regenerators = regenerators;
        self
    }

    /// Attach a telemetry sink
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: TelemetrySink) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Targets an event asks for
    ///
    /// Only merged PRs are backported. `closed` uses every backport label,
    /// `labeled` only the label that was just added.
    pub fn targets(event: &WebhookEvent) -> Result<Vec<BackportTarget>> {
        let pr = event.pull_request()?;
        if !pr.merged {
            debug!(pr = pr.number, "pull request not merged, nothing to backport");
            return Ok(Vec::new());
        }
        let labels = match event.action() {
            Some(EventAction::Closed) => pr.label_names(),
            Some(EventAction::Labeled) => event
                .payload
                .label
                .iter()
                .map(|l| l.name.clone())
                .collect(),
            other => {
                debug!(action = ?other, "action does not trigger backports");
                Vec::new()
            }
        };
        Ok(backport_targets(&labels, pr.number))
    }

    /// Backport the event's PR onto every requested base
    pub async fn run(&self, event: &WebhookEvent) -> Result<Vec<BackportOutcome>> {
        let targets = Self::targets(event)?;
        if targets.is_empty() {
            return Ok(Vec::new());
        }
        let pr = event.pull_request()?;
        let sha = pr
            .merge_commit_sha
            .as_deref()
            .ok_or_else(|| Error::InvalidEvent(format!("PR #{} has no merge commit", pr.number)))?;

        if let Some(url) = &self.options.clone_url {
            info!("cloning repository");
            self.git.clone_from(url).await?;
        }

        let mut outcomes = Vec::with_capacity(targets.len());
        for target in targets {
            let span = info_span!("backport", base = %target.base, head = %target.head);
            let outcome = self.backport_target(pr, sha, &target).instrument(span).await;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    async fn backport_target(
        &self,
        pr: &PullRequestPayload,
        sha: &str,
        target: &BackportTarget,
    ) -> BackportOutcome {
        match self.create_backport(pr, sha, target).await {
            Ok(number) => {
                info!(pr = number, "backport created");
                track(
                    &self.telemetry,
                    "backport",
                    &[("base", target.base.as_str()), ("result", "created")],
                );
                BackportOutcome::Created {
                    base: target.base.clone(),
                    number,
                }
            }
            Err(e) => {
                error!(error = %e, "backport failed");
                track(
                    &self.telemetry,
                    "backport",
                    &[("base", target.base.as_str()), ("result", "failed")],
                );
                self.report_failure(pr.number, sha, target, &e).await;
                BackportOutcome::Failed {
                    base: target.base.clone(),
                    error: e.to_string(),
                }
            }
        }
    }

    async fn create_backport(
        &self,
        pr: &PullRequestPayload,
        sha: &str,
        target: &BackportTarget,
    ) -> Result<u64> {
        self.git.fetch(&target.base).await?;
        self.git.switch_create(&target.head, &target.base).await?;
        self.cherry_pick(sha).await?;
        self.git.push(&target.head).await?;

        debug!("creating pull request");
        let created = self
            .api
            .create_pull_request(&NewPullRequest {
                head: target.head.clone(),
                base: target.base.clone(),
                title: format!("[{}] {}", target.base, pr.title),
                body: format!(
                    "Backport {sha} from #{}\n\n---\n\n{}",
                    pr.number,
                    pr.body.as_deref().unwrap_or_default()
                ),
            })
            .await?;

        if let Err(e) = self.copy_milestone(created.number, &target.base).await {
            warn!(error = %e, "could not set milestone");
        }
        if let Err(e) = self.reassign_reviewers(created.number, pr).await {
            warn!(error = %e, "could not update reviewers");
        }

        let labels = get_final_labels(&pr.label_names(), &self.options.labels_to_add);
        for label in &labels {
            self.api.add_label(created.number, label).await?;
        }
        Ok(created.number)
    }

    async fn cherry_pick(&self, sha: &str) -> Result<()> {
        let paths = match self.git.cherry_pick(sha).await? {
            CherryPick::Applied => return Ok(()),
            CherryPick::Conflict(paths) => paths,
        };

        let regenerator = match paths.as_slice() {
            [path] => self.regenerators.iter().find(|r| r.path() == path),
            _ => None,
        };
        let Some(regenerator) = regenerator else {
            self.abort_cherry_pick().await;
            return Err(Error::CherryPickConflict { paths });
        };

        info!(path = regenerator.path(), "regenerating conflicting file");
        let resolved = async {
            regenerator.regenerate(self.git.workdir()).await?;
            self.git.add(&paths).await?;
            self.git.cherry_pick_continue().await
        }
        .await;

        if let Err(e) = resolved {
            self.abort_cherry_pick().await;
            return Err(e);
        }
        Ok(())
    }

    async fn abort_cherry_pick(&self) {
        if let Err(e) = self.git.cherry_pick_abort().await {
            warn!(error = %e, "could not abort cherry-pick");
        }
    }

    async fn copy_milestone(&self, number: u64, base: &str) -> Result<()> {
        let Some(title) = milestone_for_base(base) else {
            debug!("base branch does not name a version");
            return Ok(());
        };
        let milestones = self.api.list_open_milestones().await?;
        match milestones.iter().find(|m| m.title == title) {
            Some(milestone) => {
                debug!(milestone = milestone.number, %title, "setting milestone");
                self.api.set_milestone(number, milestone.number).await
            }
            None => {
                debug!(%title, "no open milestone for base");
                Ok(())
            }
        }
    }

    async fn reassign_reviewers(&self, number: u64, original: &PullRequestPayload) -> Result<()> {
        let requested = self.api.list_requested_reviewers(number).await?;
        if !requested.is_empty() {
            debug!(?requested, "removing default reviewers");
            self.api.remove_requested_reviewers(number, &requested).await?;
        }
        if let Some(merger) = &original.merged_by {
            debug!(reviewer = %merger.login, "requesting review from merger");
            self.api
                .request_reviewers(number, std::slice::from_ref(&merger.login))
                .await?;
        }
        Ok(())
    }

    async fn report_failure(&self, number: u64, sha: &str, target: &BackportTarget, err: &Error) {
        let body = failure_comment(&target.base, &target.head, sha, &err.to_string());
        if let Err(e) = self.api.post_comment(number, &body).await {
            error!(error = %e, "could not post backport failure comment");
        }
        if let Err(e) = self.api.add_label(number, BACKPORT_FAILED_LABEL).await {
            error!(error = %e, "could not add {BACKPORT_FAILED_LABEL} label");
        }
    }
}

/// Comment explaining a failed backport and how to do it by hand
pub fn failure_comment(base: &str, head: &str, sha: &str, error: &str) -> String {
    format!(
        "The backport to `{base}` failed:

```
{error}
```

To backport manually, run these commands in your terminal:

```bash
# Fetch latest updates from GitHub
git fetch
# Create a new branch
git switch --create {head} origin/{base}
# Cherry-pick the merged commit of this pull request and resolve the conflicts
git cherry-pick -x {sha}
# Push it to GitHub
git push --set-upstream origin {head}
git switch main
# Remove the local backport branch
git branch -D {head}
```

Then, create a pull request where the `base` branch is `{base}` and the `compare`/`head` branch is `{head}`."
    )
}
