//! Generic label presence check

use crate::checks::{
    ActionFilter, Check, CheckContext, CheckHandler, CheckResult, LABEL_ACTIONS, PR_EVENTS,
    Subscribe,
};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Glob-style label match
///
/// `*` matches everything and an empty pattern matches nothing. A pattern
/// without `*` must equal the label; otherwise the label must start with the
/// text before the first `*`.
pub fn string_matches_label(pattern: &str, label: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }
    match pattern.find('*') {
        None => pattern == label,
        Some(idx) => label.starts_with(&pattern[..idx]),
    }
}

/// Labels that satisfy the check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRule {
    /// Label patterns
    #[serde(default)]
    pub matches: Vec<String>,
    /// Description when a label matches; `{label}` is replaced by the label
    #[serde(default)]
    pub message: Option<String>,
}

/// Labels that bypass the check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipRule {
    /// Label patterns
    #[serde(default)]
    pub matches: Vec<String>,
    /// Description when the check is skipped
    #[serde(default)]
    pub message: Option<String>,
}

/// Configuration of a [`LabelCheck`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelCheckConfig {
    /// Status context
    #[serde(default)]
    pub title: Option<String>,
    /// Link shown next to the status
    #[serde(default)]
    pub target_url: Option<String>,
    /// Required labels
    #[serde(default)]
    pub exists: LabelRule,
    /// Skip labels
    #[serde(default)]
    pub skip: Option<SkipRule>,
    /// Description when nothing matches
    #[serde(default)]
    pub not_exists_message: Option<String>,
}

/// How a label set fared against a [`LabelCheckConfig`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelOutcome {
    /// This label matched the required patterns
    Matched(String),
    /// This label matched a skip pattern
    Skipped(String),
    /// Neither matched
    Missing,
}

impl LabelCheckConfig {
    /// Classify a label set
    ///
    /// Required patterns win over skip patterns.
    pub fn evaluate(&self, labels: &[String]) -> LabelOutcome {
        let find = |patterns: &[String]| {
            labels
                .iter()
                .find(|label| patterns.iter().any(|p| string_matches_label(p, label)))
                .cloned()
        };

        if let Some(label) = find(&self.exists.matches) {
            return LabelOutcome::Matched(label);
        }
        if let Some(skip) = &self.skip
            && let Some(label) = find(&skip.matches)
        {
            return LabelOutcome::Skipped(label);
        }
        LabelOutcome::Missing
    }

    /// Status description for an outcome
    pub fn describe(&self, outcome: &LabelOutcome) -> String {
        match outcome {
            LabelOutcome::Matched(label) => self
                .exists
                .message
                .as_deref()
                .map_or_else(|| format!("Found label {label}"), |m| m.replace("{label}", label)),
            LabelOutcome::Skipped(_) => self
                .skip
                .as_ref()
                .and_then(|s| s.message.clone())
                .unwrap_or_else(|| "Check skipped".to_string()),
            LabelOutcome::Missing => self.not_exists_message.clone().unwrap_or_else(|| {
                format!("Missing label matching: {}", self.exists.matches.join(", "))
            }),
        }
    }

    /// Result for a label set on a commit
    pub fn result(&self, sha: &str, title: &str, labels: &[String]) -> CheckResult {
        let outcome = self.evaluate(labels);
        let description = self.describe(&outcome);
        let result = match outcome {
            LabelOutcome::Matched(_) | LabelOutcome::Skipped(_) => CheckResult::success(sha, title),
            LabelOutcome::Missing => CheckResult::failure(sha, title),
        };
        result
            .with_description(description)
            .with_target_url(self.target_url.clone())
    }
}

/// Requires a label matching one of the configured patterns
#[derive(Debug, Clone)]
pub struct LabelCheck {
    config: LabelCheckConfig,
}

impl LabelCheck {
    /// Default status context
    pub const DEFAULT_TITLE: &'static str = "Label Check";

    /// Create the check
    pub const fn new(config: LabelCheckConfig) -> Self {
        Self { config }
    }

    fn title(&self) -> &str {
        self.config.title.as_deref().unwrap_or(Self::DEFAULT_TITLE)
    }
}

#[async_trait]
impl CheckHandler for LabelCheck {
    async fn handle(&self, ctx: CheckContext) -> Result<Option<CheckResult>> {
        let Some(pr) = ctx.open_pull_request() else {
            return Ok(None);
        };
        Ok(Some(self.config.result(
            &pr.head.sha,
            self.title(),
            &pr.label_names(),
        )))
    }
}

impl Check for LabelCheck {
    fn subscribe(&self, subscriber: &mut dyn Subscribe) {
        subscriber.on(
            PR_EVENTS,
            ActionFilter::only(LABEL_ACTIONS.iter().copied()),
            Arc::new(self.clone()),
        );
    }
}
