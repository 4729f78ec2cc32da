//! Backport decision check

use crate::backport::parse_backport_label;
use crate::checks::{
    ActionFilter, Check, CheckContext, CheckHandler, CheckResult, LABEL_ACTIONS, PR_EVENTS,
    Subscribe,
};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration of a [`BackportCheck`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackportCheckConfig {
    /// Status context
    #[serde(default)]
    pub title: Option<String>,
    /// Link shown next to the status
    #[serde(default)]
    pub target_url: Option<String>,
    /// Labels that mark a PR as not needing a backport
    #[serde(default)]
    pub skip_labels: Vec<String>,
}

/// Requires a decision on whether a PR is backported
#[derive(Debug, Clone, Default)]
pub struct BackportCheck {
    config: BackportCheckConfig,
}

impl BackportCheck {
    /// Default status context
    pub const DEFAULT_TITLE: &'static str = "Backport Check";

    /// Create the check
    pub const fn new(config: BackportCheckConfig) -> Self {
        Self { config }
    }

    /// Decide on a label set
    ///
    /// A backport label is looked for first; skip labels only count when
    /// there is none.
    pub fn evaluate(&self, sha: &str, labels: &[String]) -> CheckResult {
        let title = self.config.title.as_deref().unwrap_or(Self::DEFAULT_TITLE);

        let result = if labels.iter().any(|l| parse_backport_label(l).is_some()) {
            CheckResult::success(sha, title).with_description("Backport enabled")
        } else if labels.iter().any(|l| self.config.skip_labels.contains(l)) {
            CheckResult::success(sha, title).with_description("Backport skipped")
        } else {
            CheckResult::failure(sha, title).with_description(
                "Backport decision needed: add a backport label or a skip label",
            )
        };
        result.with_target_url(self.config.target_url.clone())
    }
}

#[async_trait]
impl CheckHandler for BackportCheck {
    async fn handle(&self, ctx: CheckContext) -> Result<Option<CheckResult>> {
        let Some(pr) = ctx.open_pull_request() else {
            return Ok(None);
        };
        Ok(Some(self.evaluate(&pr.head.sha, &pr.label_names())))
    }
}

impl Check for BackportCheck {
    fn subscribe(&self, subscriber: &mut dyn Subscribe) {
        subscriber.on(
            PR_EVENTS,
            ActionFilter::only(LABEL_ACTIONS.iter().copied()),
            Arc::new(self.clone()),
        );
    }
}
