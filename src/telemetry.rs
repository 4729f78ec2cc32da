//! Usage telemetry
//!
//! Components take an optional [`Telemetry`] sink at construction instead of
//! reaching for a process-wide handle.

use std::collections::BTreeMap;
use std::sync::Arc;

/// Receives named usage events
pub trait Telemetry: Send + Sync {
    /// Record an event with string properties
    fn track_event(&self, name: &str, properties: &BTreeMap<String, String>);
}

/// Optional shared telemetry sink
pub type TelemetrySink = Option<Arc<dyn Telemetry>>;

/// Emits telemetry events as tracing records under the `telemetry` target
#[derive(Debug, Clone, Default)]
pub struct TracingTelemetry {
    /// Name of the action emitting events
    pub action: String,
}

impl TracingTelemetry {
    /// Create a sink tagged with the action name
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
        }
    }
}

impl Telemetry for TracingTelemetry {
    fn track_event(&self, name: &str, properties: &BTreeMap<String, String>) {
        tracing::info!(
            target: "telemetry",
            action = %self.action,
            event = name,
            properties = ?properties,
            "telemetry event"
        );
    }
}

/// Record an event if a sink is configured
pub fn track(sink: &TelemetrySink, name: &str, properties: &[(&str, &str)]) {
    if let Some(sink) = sink {
        let properties = properties
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        sink.track_event(name, &properties);
    }
}
