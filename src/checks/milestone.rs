//! Milestone presence check

use crate::checks::{ActionFilter, Check, CheckContext, CheckResult, PR_EVENTS, Subscribe};
use crate::error::{Error, Result};
use crate::event::{EventAction, EventName};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Configuration of a [`MilestoneCheck`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneCheckConfig {
    /// Status context
    #[serde(default)]
    pub title: Option<String>,
    /// Link shown next to the status
    #[serde(default)]
    pub target_url: Option<String>,
}

/// Requires a milestone on every open pull request
#[derive(Debug, Clone, Default)]
pub struct MilestoneCheck {
    config: Arc<MilestoneCheckConfig>,
}

impl MilestoneCheck {
    /// Default status context
    pub const DEFAULT_TITLE: &'static str = "Milestone Check";

    /// Create the check
    pub fn new(config: MilestoneCheckConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    fn result(config: &MilestoneCheckConfig, sha: &str, has_milestone: bool) -> CheckResult {
        let title = config.title.as_deref().unwrap_or(Self::DEFAULT_TITLE);
        let result = if has_milestone {
            CheckResult::success(sha, title).with_description("Milestone set")
        } else {
            CheckResult::failure(sha, title).with_description("Milestone not set")
        };
        result.with_target_url(config.target_url.clone())
    }

    fn on_pull_request(config: &MilestoneCheckConfig, ctx: &CheckContext) -> Option<CheckResult> {
        let pr = ctx.open_pull_request()?;
        Some(Self::result(config, &pr.head.sha, pr.milestone.is_some()))
    }

    async fn on_issue(config: &MilestoneCheckConfig, ctx: &CheckContext) -> Result<Option<CheckResult>> {
        let issue = ctx.event().issue()?;
        if !issue.is_pull_request() || !issue.is_open() {
            debug!(issue = issue.number, "not an open pull request, skipping");
            return Ok(None);
        }

        debug!(pr = issue.number, "fetching pull request for milestone check");
        let pr = ctx.api().get_pull_request(issue.number).await?;
        if !pr.open {
            return Ok(None);
        }

        let has_milestone = match ctx.event().action() {
            Some(EventAction::Demilestoned) => false,
            _ => pr.milestone.is_some() || issue.milestone.is_some(),
        };
        Ok(Some(Self::result(config, &pr.head_sha, has_milestone)))
    }
}

impl Check for MilestoneCheck {
    fn subscribe(&self, subscriber: &mut dyn Subscribe) {
        let config = Arc::clone(&self.config);
        subscriber.on(
            PR_EVENTS,
            ActionFilter::only([
                EventAction::Opened,
                EventAction::Reopened,
                EventAction::ReadyForReview,
                EventAction::Synchronize,
                EventAction::Edited,
            ]),
            Arc::new(move |ctx: CheckContext| {
                let config = Arc::clone(&config);
                async move { Ok::<_, Error>(Self::on_pull_request(&config, &ctx)) }
            }),
        );

        let config = Arc::clone(&self.config);
        subscriber.on(
            &[EventName::Issues],
            ActionFilter::only([EventAction::Milestoned, EventAction::Demilestoned]),
            Arc::new(move |ctx: CheckContext| {
                let config = Arc::clone(&config);
                async move { Self::on_issue(&config, &ctx).await }
            }),
        );
    }
}
