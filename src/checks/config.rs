//! Check configuration loaded from the repository

use crate::checks::{
    BackportCheck, BackportCheckConfig, ChangelogCheck, ChangelogCheckConfig, Check,
    CheckDependencyCheck, CheckDependencyConfig, Dispatcher, EnterpriseCheck,
    EnterpriseCheckConfig, LabelCheck, LabelCheckConfig, MilestoneCheck, MilestoneCheckConfig,
};
use crate::error::{Error, Result};
use crate::github::GitHubApi;
use crate::telemetry::TelemetrySink;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// One configured check, tagged by `type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CheckConfig {
    /// [`MilestoneCheck`]
    Milestone(MilestoneCheckConfig),
    /// [`BackportCheck`]
    Backport(BackportCheckConfig),
    /// [`EnterpriseCheck`]
    Enterprise(EnterpriseCheckConfig),
    /// [`LabelCheck`]
    Label(LabelCheckConfig),
    /// [`ChangelogCheck`]
    Changelog(ChangelogCheckConfig),
    /// [`CheckDependencyCheck`]
    CheckDependency(CheckDependencyConfig),
}

impl CheckConfig {
    /// Instantiate the configured check
    pub fn build(&self) -> Result<Box<dyn Check>> {
        Ok(match self {
            Self::Milestone(c) => Box::new(MilestoneCheck::new(c.clone())),
            Self::Backport(c) => Box::new(BackportCheck::new(c.clone())),
            Self::Enterprise(c) => Box::new(EnterpriseCheck::new(c.clone())),
            Self::Label(c) => Box::new(LabelCheck::new(c.clone())),
            Self::Changelog(c) => Box::new(ChangelogCheck::new(c.clone())?),
            Self::CheckDependency(c) => {
                Box::new(CheckDependencyCheck::new(c.context.clone(), c.check.build()?))
            }
        })
    }

    /// Parse a JSON array of check configs
    pub fn parse_list(json: &str) -> Result<Vec<Self>> {
        serde_json::from_str(json).map_err(|e| Error::Config(format!("invalid check config: {e}")))
    }
}

/// Build a dispatcher with every configured check subscribed in order
pub fn build_dispatcher(
    configs: &[CheckConfig],
    api: Arc<dyn GitHubApi>,
    telemetry: TelemetrySink,
) -> Result<Dispatcher> {
    let mut dispatcher = Dispatcher::new(api).with_telemetry(telemetry);
    for config in configs {
        debug!(?config, "subscribing check");
        config.build()?.subscribe(&mut dispatcher);
    }
    Ok(dispatcher)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_check_list() {
        let configs = CheckConfig::parse_list(
            r#"[
                { "type": "milestone" },
                { "type": "backport", "title": "Backport", "skipLabels": ["no-backport"] },
                { "type": "enterprise", "targetUrl": "https://example.com" },
                { "type": "changelog", "titleRegex": "^.+$" },
                {
                    "type": "check-dependency",
                    "context": "Changelog Check",
                    "check": { "type": "label", "exists": { "matches": ["type/*"] } }
                }
            ]"#,
        )
        .unwrap();

        assert_eq!(configs.len(), 5);
        assert_eq!(configs[0], CheckConfig::Milestone(MilestoneCheckConfig::default()));
        match &configs[1] {
            CheckConfig::Backport(c) => assert_eq!(c.skip_labels, vec!["no-backport"]),
            other => panic!("expected backport config, got {other:?}"),
        }
        match &configs[4] {
            CheckConfig::CheckDependency(c) => {
                assert_eq!(c.context, "Changelog Check");
                assert!(matches!(*c.check, CheckConfig::Label(_)));
            }
            other => panic!("expected check-dependency config, got {other:?}"),
        }
        for config in &configs {
            assert!(config.build().is_ok());
        }
    }

    #[test]
    fn test_unknown_type_is_config_error() {
        let err = CheckConfig::parse_list(r#"[{ "type": "nope" }]"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
