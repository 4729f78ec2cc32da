//! Pull request status checks
//!
//! A [`Check`] subscribes handlers for the events it cares about. The
//! [`Dispatcher`] routes each incoming event to the matching handlers and
//! turns every produced [`CheckResult`] into one commit status.
//!
//! Handlers get a read-only [`CheckContext`] and return their result, so
//! multi-phase checks combine values instead of resetting shared state.

mod backport;
mod changelog;
mod config;
mod dependency;
mod dispatch;
mod enterprise;
mod label;
mod milestone;

pub use backport::{BackportCheck, BackportCheckConfig};
pub use changelog::{ChangelogCheck, ChangelogCheckConfig};
pub use config::{CheckConfig, build_dispatcher};
pub use dependency::{CheckDependencyCheck, CheckDependencyConfig};
pub use dispatch::{ActionFilter, DispatchReport, Dispatcher, Subscribe, Subscriber, Subscription};
pub use enterprise::{EnterpriseCheck, EnterpriseCheckConfig};
pub use label::{
    LabelCheck, LabelCheckConfig, LabelOutcome, LabelRule, SkipRule, string_matches_label,
};
pub use milestone::{MilestoneCheck, MilestoneCheckConfig};

use crate::error::Result;
use crate::event::{EventAction, EventName, PullRequestPayload, WebhookEvent};
use crate::github::GitHubApi;
use crate::types::{StatusState, StatusUpdate};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Events that carry a pull request
pub(crate) const PR_EVENTS: &[EventName] = &[EventName::PullRequest, EventName::PullRequestTarget];

/// PR actions that re-evaluate label-driven checks
pub(crate) const LABEL_ACTIONS: &[EventAction] = &[
    EventAction::Opened,
    EventAction::Reopened,
    EventAction::ReadyForReview,
    EventAction::Synchronize,
    EventAction::Labeled,
    EventAction::Unlabeled,
];

/// Outcome of one check evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    /// Status state
    pub state: StatusState,
    /// Commit the status applies to
    pub sha: String,
    /// Status context name
    pub title: String,
    /// Short description
    pub description: Option<String>,
    /// Link shown next to the status
    pub target_url: Option<String>,
}

impl CheckResult {
    fn new(state: StatusState, sha: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            state,
            sha: sha.into(),
            title: title.into(),
            description: None,
            target_url: None,
        }
    }

    /// A passing result
    pub fn success(sha: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(StatusState::Success, sha, title)
    }

    /// A failing result
    pub fn failure(sha: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(StatusState::Failure, sha, title)
    }

    /// An errored result
    pub fn error(sha: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(StatusState::Error, sha, title)
    }

    /// A result that has not concluded yet
    pub fn pending(sha: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(StatusState::Pending, sha, title)
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the target URL
    #[must_use]
    pub fn with_target_url(mut self, url: Option<String>) -> Self {
        self.target_url = url;
        self
    }

    /// Whether the result is a success
    pub fn is_success(&self) -> bool {
        self.state == StatusState::Success
    }

    /// The commit status this result publishes
    pub fn to_status(&self) -> StatusUpdate {
        StatusUpdate {
            sha: self.sha.clone(),
            context: self.title.clone(),
            state: self.state,
            description: self.description.clone(),
            target_url: self.target_url.clone(),
        }
    }
}

/// What a handler sees: the triggering event and the GitHub API
///
/// A fresh context is built for every matched subscription.
#[derive(Clone)]
pub struct CheckContext {
    event: Arc<WebhookEvent>,
    api: Arc<dyn GitHubApi>,
}

impl CheckContext {
    /// Build a context
    pub fn new(event: Arc<WebhookEvent>, api: Arc<dyn GitHubApi>) -> Self {
        Self { event, api }
    }

    /// The triggering event
    pub fn event(&self) -> &WebhookEvent {
        &self.event
    }

    /// The GitHub API
    pub fn api(&self) -> &dyn GitHubApi {
        self.api.as_ref()
    }

    /// The event's pull request, if there is one and it is open
    pub fn open_pull_request(&self) -> Option<&PullRequestPayload> {
        match self.event.payload.pull_request.as_ref() {
            Some(pr) if pr.is_open() => Some(pr),
            Some(pr) => {
                debug!(pr = pr.number, state = %pr.state, "pull request not open, skipping");
                None
            }
            None => {
                debug!(event = %self.event.name, "event has no pull request, skipping");
                None
            }
        }
    }
}

/// A subscribed callback
#[async_trait]
pub trait CheckHandler: Send + Sync {
    /// Evaluate the event; `None` means "nothing to report"
    async fn handle(&self, ctx: CheckContext) -> Result<Option<CheckResult>>;
}

#[async_trait]
impl<F, Fut> CheckHandler for F
where
    F: Fn(CheckContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<CheckResult>>> + Send,
{
    async fn handle(&self, ctx: CheckContext) -> Result<Option<CheckResult>> {
        (self)(ctx).await
    }
}

/// A status-check policy
pub trait Check: Send + Sync {
    /// Register this check's handlers
    fn subscribe(&self, subscriber: &mut dyn Subscribe);
}
