//! Top-level wrapper for a bot run
//!
//! Failures are reported on a designated issue so they are visible outside the
//! workflow logs. A run triggered by that issue itself is refused, otherwise
//! every report would trigger another run.

use crate::error::Result;
use crate::event::WebhookEvent;
use crate::github::GitHubApi;
use std::fmt::Write as _;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Runs a bot and reports its failure
#[derive(Clone, Default)]
pub struct ActionRunner {
    reporter: Option<(Arc<dyn GitHubApi>, u64)>,
    event: Option<Arc<WebhookEvent>>,
    run_url: Option<String>,
}

impl std::fmt::Debug for ActionRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRunner")
            .field("error_issue", &self.error_issue())
            .field("event", &self.event.as_ref().map(|e| e.name.to_string()))
            .field("run_url", &self.run_url)
            .finish()
    }
}

impl ActionRunner {
    /// Runner that only logs
    pub fn new() -> Self {
        Self::default()
    }

    /// Post failure reports to `issue`
    #[must_use]
    pub fn with_error_issue(mut self, api: Arc<dyn GitHubApi>, issue: u64) -> Self {
        self.reporter = Some((api, issue));
        self
    }

    /// Event that triggered the run
    #[must_use]
    pub fn with_event(mut self, event: Arc<WebhookEvent>) -> Self {
        self.event = Some(event);
        self
    }

    /// Link to the workflow run, included in reports
    #[must_use]
    pub fn with_run_url(mut self, url: impl Into<String>) -> Self {
        self.run_url = Some(url.into());
        self
    }

    /// Issue receiving failure reports
    pub fn error_issue(&self) -> Option<u64> {
        self.reporter.as_ref().map(|(_, issue)| *issue)
    }

    fn triggered_by_error_issue(&self) -> bool {
        match (self.error_issue(), &self.event) {
            (Some(issue), Some(event)) => event.issue_number() == Some(issue),
            _ => false,
        }
    }

    /// Run `fut` as the bot `name`
    ///
    /// The error is returned unchanged after it has been reported.
    pub async fn run<F>(&self, name: &str, fut: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        if self.triggered_by_error_issue() {
            warn!(action = name, "event concerns the error logging issue, not running");
            return Ok(());
        }

        info!(action = name, "starting");
        let started = Instant::now();
        let result = fut.await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(()) => {
                info!(action = name, elapsed_ms, "finished");
                Ok(())
            }
            Err(err) => {
                error!(action = name, elapsed_ms, error = %err, "failed");
                if let Some((api, issue)) = &self.reporter {
                    let report = self.render_report(name, &err.to_string());
                    if let Err(post_err) = api.post_comment(*issue, &report).await {
                        error!(issue, error = %post_err, "could not post error report");
                    }
                }
                Err(err)
            }
        }
    }

    /// Markdown body of a failure report
    pub fn render_report(&self, name: &str, error: &str) -> String {
        let mut report = format!("## {name} failed\n\n");
        if let Some((api, _)) = &self.reporter {
            let _ = writeln!(report, "**Repository:** {}", api.repo());
        }
        if let Some(event) = &self.event {
            let _ = write!(report, "**Event:** {}", event.name);
            if let Some(action) = event.action() {
                let _ = write!(report, " ({action:?})");
            }
            if let Some(number) = event.issue_number() {
                let _ = write!(report, " on #{number}");
            }
            report.push('\n');
        }
        if let Some(url) = &self.run_url {
            let _ = writeln!(report, "**Run:** {url}");
        }
        let _ = write!(report, "\n```\n{}\n```\n", error.trim_end());
        report
    }
}

/// Workflow run URL from `GITHUB_SERVER_URL`, `GITHUB_REPOSITORY` and `GITHUB_RUN_ID`
pub fn run_url_from_env() -> Option<String> {
    let server = std::env::var("GITHUB_SERVER_URL").ok()?;
    let repository = std::env::var("GITHUB_REPOSITORY").ok()?;
    let run_id = std::env::var("GITHUB_RUN_ID").ok()?;
    Some(format!("{server}/{repository}/actions/runs/{run_id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::event::{EventAction, EventName, EventPayload, IssuePayload};

    fn issue_event(number: u64) -> Arc<WebhookEvent> {
        Arc::new(WebhookEvent::new(
            EventName::Issues,
            EventPayload {
                action: Some(EventAction::Labeled),
                issue: Some(IssuePayload {
                    number,
                    state: "open".to_string(),
                    labels: vec![],
                    milestone: None,
                    pull_request: None,
                    user: None,
                }),
                ..EventPayload::default()
            },
        ))
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let runner = ActionRunner::new();
        assert!(runner.run("commands", async { Ok(()) }).await.is_ok());
    }

    #[tokio::test]
    async fn test_error_is_returned_without_reporter() {
        let runner = ActionRunner::new().with_event(issue_event(3));
        let err = runner
            .run("commands", async { Err(Error::Internal("boom".to_string())) })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[test]
    fn test_report_contents() {
        let runner = ActionRunner::new()
            .with_event(issue_event(12))
            .with_run_url("https://github.com/acme/widgets/actions/runs/9");
        let report = runner.render_report("backport", "git command failed: git push\n");

        assert!(report.starts_with("## backport failed\n\n"));
        assert!(report.contains("**Event:** issues (Labeled) on #12\n"));
        assert!(report.contains("**Run:** https://github.com/acme/widgets/actions/runs/9\n"));
        assert!(report.ends_with("```\ngit command failed: git push\n```\n"));
    }
}
