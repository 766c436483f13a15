//! Convenience helpers on top of [`Telemetry`].

use std::time::Instant;

use super::bag::{MeasurementBag, PropertyBag};
use super::client::Telemetry;

/// Measurement added by [`TimedEvent`], in milliseconds.
pub const DURATION: &str = "duration";

/// Emits its event with a `duration` measurement when dropped.
#[must_use = "the event is emitted when the guard is dropped"]
pub struct TimedEvent<'a> {
    telemetry: &'a Telemetry,
    name: String,
    properties: Option<PropertyBag>,
    measurements: Option<MeasurementBag>,
    started: Instant,
}

impl Drop for TimedEvent<'_> {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let mut measurements = MeasurementBag::new().with(DURATION, elapsed_ms);
        measurements.add_all_opt(self.measurements.as_ref());

        self.telemetry
            .track_event(&self.name, self.properties.take(), Some(measurements));
    }
}

/// Time the scope of the returned guard.
pub fn time_event<'a>(
    telemetry: &'a Telemetry,
    name: &str,
    properties: Option<PropertyBag>,
    measurements: Option<MeasurementBag>,
) -> TimedEvent<'a> {
    TimedEvent {
        telemetry,
        name: name.to_string(),
        properties,
        measurements,
        started: Instant::now(),
    }
}
