//! Changelog readiness check
//!
//! Combines two label evaluations (changelog decision, then breaking-change
//! decision) with PR title and body validation.

use crate::checks::label::{LabelCheckConfig, LabelOutcome, LabelRule, SkipRule};
use crate::checks::{
    ActionFilter, Check, CheckContext, CheckHandler, CheckResult, LABEL_ACTIONS, PR_EVENTS,
    Subscribe,
};
use crate::error::{Error, Result};
use crate::event::{EventAction, PullRequestPayload};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Title format required for changelog entries: `Area: Summary`
pub const DEFAULT_TITLE_PATTERN: &str = r"^[A-Z][\w\s./-]*: \S.*";

/// Marker a breaking-change PR body must contain
pub const DEFAULT_BREAKING_CHANGE_MARKER: &str = "# Release notice breaking change";

/// Configuration of a [`ChangelogCheck`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangelogCheckConfig {
    /// Status context
    #[serde(default)]
    pub title: Option<String>,
    /// Link shown next to the status
    #[serde(default)]
    pub target_url: Option<String>,
    /// Changelog decision labels
    #[serde(default = "default_changelog_labels")]
    pub changelog: LabelCheckConfig,
    /// Breaking-change decision labels
    #[serde(default = "default_breaking_change_labels")]
    pub breaking_change: LabelCheckConfig,
    /// Regex PR titles must match when the PR goes into the changelog
    #[serde(default)]
    pub title_regex: Option<String>,
    /// Text a breaking-change PR body must contain
    #[serde(default)]
    pub breaking_change_notice_marker: Option<String>,
}

impl Default for ChangelogCheckConfig {
    fn default() -> Self {
        Self {
            title: None,
            target_url: None,
            changelog: default_changelog_labels(),
            breaking_change: default_breaking_change_labels(),
            title_regex: None,
            breaking_change_notice_marker: None,
        }
    }
}

fn default_changelog_labels() -> LabelCheckConfig {
    LabelCheckConfig {
        exists: LabelRule {
            matches: vec!["add to changelog".to_string()],
            message: Some("Changelog enabled".to_string()),
        },
        skip: Some(SkipRule {
            matches: vec!["no-changelog".to_string()],
            message: Some("Changelog skipped".to_string()),
        }),
        not_exists_message: Some(
            "Changelog decision needed: add `add to changelog` or `no-changelog`".to_string(),
        ),
        ..Default::default()
    }
}

fn default_breaking_change_labels() -> LabelCheckConfig {
    LabelCheckConfig {
        exists: LabelRule {
            matches: vec!["breaking change".to_string()],
            message: None,
        },
        skip: Some(SkipRule {
            matches: vec!["no-breaking-change".to_string(), "*".to_string()],
            message: None,
        }),
        ..Default::default()
    }
}

/// Validates that a PR is ready to be listed in the changelog
#[derive(Debug, Clone)]
pub struct ChangelogCheck {
    config: ChangelogCheckConfig,
    title_regex: Regex,
}

impl ChangelogCheck {
    /// Default status context
    pub const DEFAULT_TITLE: &'static str = "Changelog Check";

    /// Create the check; fails if the configured title regex is invalid
    pub fn new(config: ChangelogCheckConfig) -> Result<Self> {
        let pattern = config.title_regex.as_deref().unwrap_or(DEFAULT_TITLE_PATTERN);
        let title_regex = Regex::new(pattern)
            .map_err(|e| Error::Config(format!("invalid changelog title regex {pattern}: {e}")))?;
        Ok(Self {
            config,
            title_regex,
        })
    }

    fn marker(&self) -> &str {
        self.config
            .breaking_change_notice_marker
            .as_deref()
            .unwrap_or(DEFAULT_BREAKING_CHANGE_MARKER)
    }

    /// Evaluate a pull request
    pub fn evaluate(&self, pr: &PullRequestPayload) -> CheckResult {
        let title = self.config.title.as_deref().unwrap_or(Self::DEFAULT_TITLE);
        let sha = pr.head.sha.as_str();
        let labels = pr.label_names();

        let failure = |description: String| {
            CheckResult::failure(sha, title)
                .with_description(description)
                .with_target_url(self.config.target_url.clone())
        };

        let changelog = self.config.changelog.evaluate(&labels);
        match &changelog {
            LabelOutcome::Missing => return failure(self.config.changelog.describe(&changelog)),
            LabelOutcome::Skipped(_) => {
                return CheckResult::success(sha, title)
                    .with_description(self.config.changelog.describe(&changelog))
                    .with_target_url(self.config.target_url.clone());
            }
            LabelOutcome::Matched(_) => {}
        }

        if !self.title_regex.is_match(&pr.title) {
            return failure(format!(
                "PR title must match {} to be listed in the changelog",
                self.title_regex.as_str()
            ));
        }

        let breaking = self.config.breaking_change.evaluate(&labels);
        match &breaking {
            LabelOutcome::Missing => return failure(self.config.breaking_change.describe(&breaking)),
            LabelOutcome::Matched(_) => {
                let body = pr.body.as_deref().unwrap_or_default();
                if !body.contains(self.marker()) {
                    return failure(format!(
                        "Breaking change notice missing: add a `{}` section to the PR body",
                        self.marker()
                    ));
                }
            }
            LabelOutcome::Skipped(_) => {}
        }

        CheckResult::success(sha, title)
            .with_description(self.config.changelog.describe(&changelog))
            .with_target_url(self.config.target_url.clone())
    }
}

#[async_trait]
impl CheckHandler for ChangelogCheck {
    async fn handle(&self, ctx: CheckContext) -> Result<Option<CheckResult>> {
        Ok(ctx.open_pull_request().map(|pr| self.evaluate(pr)))
    }
}

impl Check for ChangelogCheck {
    fn subscribe(&self, subscriber: &mut dyn Subscribe) {
        subscriber.on(
            PR_EVENTS,
            ActionFilter::only(
                LABEL_ACTIONS
                    .iter()
                    .copied()
                    .chain(std::iter::once(EventAction::Edited)),
            ),
            Arc::new(self.clone()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{BranchRef, LabelRef};
    use crate::types::StatusState;

    fn pr(title: &str, labels: &[&str], body: Option<&str>) -> PullRequestPayload {
        PullRequestPayload {
            number: 1,
            state: "open".to_string(),
            title: title.to_string(),
            body: body.map(ToString::to_string),
            labels: labels
                .iter()
                .map(|l| LabelRef {
                    name: (*l).to_string(),
                })
                .collect(),
            milestone: None,
            head: BranchRef {
                ref_name: "feature".to_string(),
                sha: "abc".to_string(),
            },
            base: BranchRef {
                ref_name: "main".to_string(),
                sha: "def".to_string(),
            },
            merged: false,
            merge_commit_sha: None,
            merged_by: None,
            user: None,
        }
    }

    fn check() -> ChangelogCheck {
        ChangelogCheck::new(ChangelogCheckConfig::default()).unwrap()
    }

    #[test]
    fn test_missing_decision_fails() {
        let result = check().evaluate(&pr("Alerting: Fix", &[], None));
        assert_eq!(result.state, StatusState::Failure);
        assert_eq!(result.title, "Changelog Check");
    }

    #[test]
    fn test_no_changelog_skips_title_rules() {
        let result = check().evaluate(&pr("fix stuff", &["no-changelog"], None));
        assert_eq!(result.state, StatusState::Success);
        assert_eq!(result.description.as_deref(), Some("Changelog skipped"));
    }

    #[test]
    fn test_title_format_enforced() {
        let bad = check().evaluate(&pr("fix stuff", &["add to changelog"], None));
        assert_eq!(bad.state, StatusState::Failure);

        let good = check().evaluate(&pr("Alerting: Fix silences", &["add to changelog"], None));
        assert_eq!(good.state, StatusState::Success);
        assert_eq!(good.description.as_deref(), Some("Changelog enabled"));
    }

    #[test]
    fn test_breaking_change_requires_notice() {
        let labels = ["add to changelog", "breaking change"];
        let missing = check().evaluate(&pr("Auth: Drop basic auth", &labels, Some("Removes it")));
        assert_eq!(missing.state, StatusState::Failure);
        assert!(missing.description.unwrap().contains("notice missing"));

        let body = "Removes it\n\n# Release notice breaking change\n\nUse tokens.";
        let ok = check().evaluate(&pr("Auth: Drop basic auth", &labels, Some(body)));
        assert_eq!(ok.state, StatusState::Success);
    }

    #[test]
    fn test_invalid_title_regex_rejected() {
        let config = ChangelogCheckConfig {
            title_regex: Some("(".to_string()),
            ..Default::default()
        };
        assert!(matches!(ChangelogCheck::new(config), Err(Error::Config(_))));
    }
}
