//! Event subscription and dispatch

use crate::checks::{CheckContext, CheckHandler, CheckResult};
use crate::error::{Error, Result};
use crate::event::{EventAction, EventName, WebhookEvent};
use crate::github::GitHubApi;
use crate::telemetry::{TelemetrySink, track};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Run one handler, turning a panic into an error
async fn run_handler(handler: &dyn CheckHandler, ctx: CheckContext) -> Result<Option<CheckResult>> {
    AssertUnwindSafe(handler.handle(ctx))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            Err(Error::Internal(format!(
                "check panicked: {}",
                panic_message(&*panic)
            )))
        })
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Which payload actions a subscription accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionFilter {
    /// Every action, including events without one
    Any,
    /// Only the listed actions
    Only(Vec<EventAction>),
}

impl ActionFilter {
    /// Accept only the given actions; an empty list accepts every action
    pub fn only(actions: impl IntoIterator<Item = EventAction>) -> Self {
        let actions: Vec<EventAction> = actions.into_iter().collect();
        if actions.is_empty() {
            Self::Any
        } else {
            Self::Only(actions)
        }
    }

    /// Whether the filter accepts an action
    pub fn matches(&self, action: Option<EventAction>) -> bool {
        match self {
            Self::Any => true,
            Self::Only(actions) => action.is_some_and(|a| actions.contains(&a)),
        }
    }
}

/// A registered handler with its event filter
#[derive(Clone)]
pub struct Subscription {
    /// Events the handler is interested in
    pub events: Vec<EventName>,
    /// Actions the handler is interested in
    pub actions: ActionFilter,
    handler: Arc<dyn CheckHandler>,
}

impl Subscription {
    /// Whether this subscription wants the given event/action pair
    pub fn matches(&self, event: &EventName, action: Option<EventAction>) -> bool {
        self.events.contains(event) && self.actions.matches(action)
    }

    /// The subscribed handler
    pub fn handler(&self) -> &dyn CheckHandler {
        self.handler.as_ref()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("events", &self.events)
            .field("actions", &self.actions)
            .finish_non_exhaustive()
    }
}

/// Capability to register handlers
pub trait Subscribe {
    /// Register `handler` for `events` filtered by `actions`
    ///
    /// Registration is additive: registering the same pair twice runs the
    /// handler twice.
    fn on(&mut self, events: &[EventName], actions: ActionFilter, handler: Arc<dyn CheckHandler>);
}

/// Ordered registry of subscriptions
#[derive(Debug, Clone, Default)]
pub struct Subscriber {
    subscriptions: Vec<Subscription>,
}

impl Subscriber {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// All subscriptions matching an event/action pair, in registration order
    pub fn subscriptions_by_event_action(
        &self,
        event: &EventName,
        action: Option<EventAction>,
    ) -> Vec<&Subscription> {
        self.subscriptions
            .iter()
            .filter(|s| s.matches(event, action))
            .collect()
    }

    /// Number of registered subscriptions
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

impl Subscribe for Subscriber {
    fn on(&mut self, events: &[EventName], actions: ActionFilter, handler: Arc<dyn CheckHandler>) {
        self.subscriptions.push(Subscription {
            events: events.to_vec(),
            actions,
            handler,
        });
    }
}

/// Summary of one dispatch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handlers invoked
    pub invoked: usize,
    /// Statuses published
    pub statuses: usize,
    /// Handlers or status calls that failed
    pub failures: usize,
}

/// Routes events to subscribed checks and publishes their results
pub struct Dispatcher {
    subscriber: Subscriber,
    api: Arc<dyn GitHubApi>,
    telemetry: TelemetrySink,
}

impl Dispatcher {
    /// Create a dispatcher publishing through `api`
    pub fn new(api: Arc<dyn GitHubApi>) -> Self {
        Self {
            subscriber: Subscriber::new(),
            api,
            telemetry: None,
        }
    }

    /// Attach a telemetry sink
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: TelemetrySink) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// The underlying registry
    pub const fn subscriber(&self) -> &Subscriber {
        &self.subscriber
    }

    /// Run every matching handler in registration order
    ///
    /// Each handler gets its own context. A handler error or a failed status
    /// call is logged and counted; it never stops later handlers.
    pub async fn dispatch(&self, event: Arc<WebhookEvent>) -> DispatchReport {
        let action = event.action();
        let matches = self
            .subscriber
            .subscriptions_by_event_action(&event.name, action);
        info!(event = %event.name, ?action, count = matches.len(), "dispatching");

        let mut report = DispatchReport::default();
        for subscription in matches {
            report.invoked += 1;
            let ctx = CheckContext::new(Arc::clone(&event), Arc::clone(&self.api));

            let result = match run_handler(subscription.handler(), ctx).await {
                Ok(Some(result)) => result,
                Ok(None) => {
                    debug!("check produced no result");
                    continue;
                }
                Err(e) => {
                    error!(error = %e, "check failed");
                    report.failures += 1;
                    continue;
                }
            };

            let status = result.to_status();
            match self.api.create_status(&status).await {
                Ok(()) => {
                    info!(context = %status.context, state = %status.state, sha = %status.sha, "status published");
                    let state = status.state.to_string();
                    track(
                        &self.telemetry,
                        "check",
                        &[("context", status.context.as_str()), ("state", state.as_str())],
                    );
                    report.statuses += 1;
                }
                Err(e) => {
                    error!(context = %status.context, error = %e, "failed to publish status");
                    report.failures += 1;
                }
            }
        }
        report
    }
}

impl Subscribe for Dispatcher {
    fn on(&mut self, events: &[EventName], actions: ActionFilter, handler: Arc<dyn CheckHandler>) {
        self.subscriber.on(events, actions, handler);
    }
}
