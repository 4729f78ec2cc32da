//! Enterprise decision check

use crate::checks::{
    ActionFilter, Check, CheckContext, CheckHandler, CheckResult, LABEL_ACTIONS, PR_EVENTS,
    Subscribe,
};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration of an [`EnterpriseCheck`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnterpriseCheckConfig {
    /// Status context
    #[serde(default)]
    pub title: Option<String>,
    /// Link shown next to the status
    #[serde(default)]
    pub target_url: Option<String>,
}

/// Requires exactly one `enterprise-ok`, `enterprise-ko` or `enterprise-override` label
#[derive(Debug, Clone, Default)]
pub struct EnterpriseCheck {
    config: EnterpriseCheckConfig,
}

impl EnterpriseCheck {
    /// Default status context
    pub const DEFAULT_TITLE: &'static str = "Enterprise Check";

    /// Create the check
    pub const fn new(config: EnterpriseCheckConfig) -> Self {
        Self { config }
    }

    /// Decide on a label set
    pub fn evaluate(&self, sha: &str, labels: &[String]) -> CheckResult {
        let title = self.config.title.as_deref().unwrap_or(Self::DEFAULT_TITLE);
        let decisions: Vec<&str> = labels
            .iter()
            .filter_map(|l| l.strip_prefix("enterprise-"))
            .filter(|d| matches!(*d, "ok" | "ko" | "override"))
            .collect();

        let result = match decisions.as_slice() {
            [] => CheckResult::failure(sha, title)
                .with_description("No enterprise label: add enterprise-ok, enterprise-ko or enterprise-override"),
            ["ok"] => CheckResult::success(sha, title).with_description("Enterprise tests passed"),
            ["override"] => CheckResult::success(sha, title)
                .with_description("Enterprise check overridden"),
            ["ko"] => CheckResult::failure(sha, title).with_description("Enterprise tests failed"),
            _ => CheckResult::failure(sha, title)
                .with_description("Too many enterprise labels, keep only one"),
        };
        result.with_target_url(self.config.target_url.clone())
    }
}

#[async_trait]
impl CheckHandler for EnterpriseCheck {
    async fn handle(&self, ctx: CheckContext) -> Result<Option<CheckResult>> {
        let Some(pr) = ctx.open_pull_request() else {
            return Ok(None);
        };
        Ok(Some(self.evaluate(&pr.head.sha, &pr.label_names())))
    }
}

impl Check for EnterpriseCheck {
    fn subscribe(&self, subscriber: &mut dyn Subscribe) {
        subscriber.on(
            PR_EVENTS,
            ActionFilter::only(LABEL_ACTIONS.iter().copied()),
            Arc::new(self.clone()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StatusState;

    fn state(labels: &[&str]) -> StatusState {
        let labels: Vec<String> = labels.iter().map(ToString::to_string).collect();
        EnterpriseCheck::default().evaluate("sha", &labels).state
    }

    #[test]
    fn test_enterprise_decisions() {
        assert_eq!(state(&["enterprise-ok"]), StatusState::Success);
        assert_eq!(state(&["enterprise-override", "type/bug"]), StatusState::Success);
        assert_eq!(state(&["enterprise-ko"]), StatusState::Failure);
        assert_eq!(state(&[]), StatusState::Failure);
        assert_eq!(state(&["enterprise-ok", "enterprise-ko"]), StatusState::Failure);
        assert_eq!(state(&["enterprise-maybe"]), StatusState::Failure);
    }

    #[test]
    fn test_too_many_labels_message() {
        let labels = vec!["enterprise-ok".to_string(), "enterprise-override".to_string()];
        let result = EnterpriseCheck::default().evaluate("sha", &labels);
        assert_eq!(result.title, "Enterprise Check");
        assert!(result.description.unwrap().starts_with("Too many"));
    }
}
