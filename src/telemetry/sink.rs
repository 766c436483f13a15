//! Destinations for analytics events.

use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

use super::bag::{MeasurementBag, PropertyBag};

/// A named event with its merged properties and measurements.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryEvent {
    pub name: String,
    pub properties: PropertyBag,
    pub measurements: MeasurementBag,
}

/// An unexpected failure reported to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionEvent {
    /// Top-level error message
    pub message: String,
    /// Messages of the underlying causes, outermost first
    pub causes: Vec<String>,
    pub properties: PropertyBag,
}

/// The analytics backend, treated as opaque.
///
/// A sink is owned by the telemetry queue's consumer and only ever called
/// from there, one call at a time.
pub trait TelemetrySink: Send {
    fn track_event(&mut self, event: &TelemetryEvent) -> anyhow::Result<()>;

    fn track_exception(&mut self, exception: &ExceptionEvent) -> anyhow::Result<()>;

    /// Push buffered data to the backend.
    fn flush(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Writes analytics events to the `tracing` subscriber.
#[derive(Debug, Clone)]
pub struct TracingSink {
    session_id: String,
}

impl TracingSink {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }
}

impl TelemetrySink for TracingSink {
    fn track_event(&mut self, event: &TelemetryEvent) -> anyhow::Result<()> {
        info!(
            target: "upgrade_assistant::analytics",
            session = %self.session_id,
            event = %event.name,
            properties = %serde_json::to_string(&*event.properties)?,
            measurements = %serde_json::to_string(&*event.measurements)?,
            "event"
        );
        Ok(())
    }

    fn track_exception(&mut self, exception: &ExceptionEvent) -> anyhow::Result<()> {
        info!(
            target: "upgrade_assistant::analytics",
            session = %self.session_id,
            message = %exception.message,
            causes = ?exception.causes,
            properties = %serde_json::to_string(&*exception.properties)?,
            "exception"
        );
        Ok(())
    }
}

/// Everything a [`RecordingSink`] has received.
#[derive(Debug, Clone, Default)]
pub struct Recorded {
    pub events: Vec<TelemetryEvent>,
    pub exceptions: Vec<ExceptionEvent>,
    pub flushes: usize,
}

/// Keeps events in memory; handy for inspecting what would be sent.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    recorded: Arc<Mutex<Recorded>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    pub fn snapshot(&self) -> Recorded {
        self.recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Names of the recorded events, in order.
    pub fn event_names(&self) -> Vec<String> {
        self.snapshot().events.into_iter().map(|e| e.name).collect()
    }
}

impl TelemetrySink for RecordingSink {
    fn track_event(&mut self, event: &TelemetryEvent) -> anyhow::Result<()> {
        self.recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .push(event.clone());
        Ok(())
    }

    fn track_exception(&mut self, exception: &ExceptionEvent) -> anyhow::Result<()> {
        self.recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .exceptions
            .push(exception.clone());
        Ok(())
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        self.recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flushes += 1;
        Ok(())
    }
}
