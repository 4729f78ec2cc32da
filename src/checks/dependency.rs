//! Gate a check on another commit status

use crate::checks::{
    ActionFilter, Check, CheckConfig, CheckContext, CheckHandler, CheckResult, Subscribe,
};
use crate::error::Result;
use crate::event::EventName;
use crate::types::StatusState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Configuration of a [`CheckDependencyCheck`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckDependencyConfig {
    /// Status context that must be successful
    pub context: String,
    /// The gated check
    pub check: Box<CheckConfig>,
}

/// Runs the wrapped check only while a named status is successful
pub struct CheckDependencyCheck {
    context: String,
    inner: Box<dyn Check>,
}

impl CheckDependencyCheck {
    /// Gate `inner` on the status `context`
    pub fn new(context: impl Into<String>, inner: Box<dyn Check>) -> Self {
        Self {
            context: context.into(),
            inner,
        }
    }
}

impl Check for CheckDependencyCheck {
    fn subscribe(&self, subscriber: &mut dyn Subscribe) {
        let mut gate = Gate {
            context: self.context.clone(),
            subscriber,
        };
        self.inner.subscribe(&mut gate);
    }
}

struct Gate<'a> {
    context: String,
    subscriber: &'a mut dyn Subscribe,
}

impl Subscribe for Gate<'_> {
    fn on(&mut self, events: &[EventName], actions: ActionFilter, handler: Arc<dyn CheckHandler>) {
        self.subscriber.on(
            events,
            actions,
            Arc::new(GatedHandler {
                context: self.context.clone(),
                inner: handler,
            }),
        );
    }
}

struct GatedHandler {
    context: String,
    inner: Arc<dyn CheckHandler>,
}

impl GatedHandler {
    /// Head sha of the pull request behind the event
    ///
    /// Issue events on a pull request carry no head, so the pull request is
    /// fetched.
    async fn head_sha(&self, ctx: &CheckContext) -> Result<Option<String>> {
        let event = ctx.event();
        if let Some(pr) = &event.payload.pull_request {
            return Ok(Some(pr.head.sha.clone()));
        }
        match &event.payload.issue {
            Some(issue) if issue.is_pull_request() => {
                debug!(pr = issue.number, "fetching pull request for dependency status");
                Ok(Some(ctx.api().get_pull_request(issue.number).await?.head_sha))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl CheckHandler for GatedHandler {
    async fn handle(&self, ctx: CheckContext) -> Result<Option<CheckResult>> {
        let Some(sha) = self.head_sha(&ctx).await? else {
            debug!(context = %self.context, "no pull request to look up dependency status for");
            return Ok(None);
        };

        debug!(%sha, context = %self.context, "fetching dependency status");
        let statuses = ctx.api().list_statuses_by_ref(&sha).await?;
        let latest = statuses.iter().find(|s| s.context == self.context);

        match latest {
            Some(status) if status.state == StatusState::Success => self.inner.handle(ctx).await,
            Some(status) => {
                info!(context = %self.context, state = %status.state, "dependency not successful, skipping check");
                Ok(None)
            }
            None => {
                info!(context = %self.context, "dependency status not reported, skipping check");
                Ok(None)
            }
        }
    }
}
